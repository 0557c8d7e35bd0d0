use anyhow::Result;
use clap::Parser;
use snmp_poller::{Config, PollLog, Poller, Settings, UdpSession};
use tracing_subscriber::EnvFilter;

fn run(config: &Config) -> snmp_poller::error::Result<u64> {
    let log = PollLog::create(&config.output_dir, chrono::Local::now())?;
    let mut poller = Poller::initialize(config, UdpSession::connect)?;

    tracing::info!(
        target_host = %config.target,
        port = config.port,
        poll_period_secs = config.poll_interval.as_secs(),
        oids = poller.oids().len(),
        "starting poll loop"
    );

    poller.run(config.poll_interval, &log, &mut std::io::stdout(), None)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("snmp_poller=info".parse()?))
        .init();

    let settings = Settings::parse();

    let outcome = settings.resolve().and_then(|config| run(&config));
    if let Err(e) = outcome {
        tracing::error!(error = %e, "poller stopped");
        return Err(e.into());
    }

    Ok(())
}
