use anyhow::Result;
use clap::Parser;
use snmp_poller::agent::{InterfaceMib, SnmpAgent};
use snmp_poller::oids::DEFAULT_IF_INDEX;
use tracing_subscriber::EnvFilter;

/// Local SNMPv2c agent serving one interface's counters, for trying the poller.
#[derive(Debug, Parser)]
#[command(name = "agent")]
struct Args {
    /// Address to listen on. Port 161 needs privileges, so default higher.
    #[arg(long, default_value = "127.0.0.1:16100")]
    bind: String,

    /// Accepted community string
    #[arg(long, default_value = "public")]
    community: String,

    /// Interface index to serve
    #[arg(long = "if-index", default_value_t = DEFAULT_IF_INDEX)]
    if_index: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("snmp_poller=info".parse()?))
        .init();

    let args = Args::parse();
    tracing::info!(bind = %args.bind, if_index = args.if_index, "Starting SNMP v2c agent");

    let agent = SnmpAgent::new(&args.bind, vec![args.community])?;
    InterfaceMib::register(&agent, args.if_index)?;

    // runs until the process is killed or the socket fails
    match agent.run_in_thread().join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("agent thread panicked"),
    }
}
