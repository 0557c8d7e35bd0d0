use crate::error::{PollError, Result};
use crate::oids::DEFAULT_IF_INDEX;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_TARGET: &str = "XJOB_SNMP_TARGET";
pub const ENV_PORT: &str = "XJOB_SNMP_PORT";
pub const ENV_COMMUNITY: &str = "XJOB_SNMP_COMMUNITY";
pub const ENV_POLL_PERIOD: &str = "XJOB_POLLPERIOD";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_OIDS: usize = 60;

/// Raw settings as given on the command line or in the environment.
///
/// Every value stays a string until [`Settings::resolve`] so that a missing
/// value and a malformed one are reported the same way regardless of where
/// they came from.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "poller", about = "Poll interface counters from one SNMPv2c agent")]
pub struct Settings {
    /// Agent host name or address
    #[arg(long, env = ENV_TARGET)]
    pub target: Option<String>,

    /// Agent UDP port
    #[arg(long, env = ENV_PORT)]
    pub port: Option<String>,

    /// SNMPv2c community string
    #[arg(long, env = ENV_COMMUNITY, hide_env_values = true)]
    pub community: Option<String>,

    /// Seconds between polls
    #[arg(long = "poll-period", env = ENV_POLL_PERIOD)]
    pub poll_period: Option<String>,

    /// Interface index appended to every counter OID
    #[arg(long = "if-index", env = "XJOB_SNMP_IFINDEX")]
    pub if_index: Option<u32>,

    /// Request timeout in seconds
    #[arg(long, env = "XJOB_SNMP_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Directory the poll log is created in
    #[arg(long = "output-dir", env = "XJOB_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Validated, immutable configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub target: String,
    pub port: u16,
    pub community: String,
    pub poll_interval: Duration,
    pub if_index: u32,
    pub timeout: Duration,
    pub max_oids: usize,
    pub output_dir: PathBuf,
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PollError::ConfigMissing { name }),
    }
}

fn invalid(name: &'static str, value: &str, reason: impl ToString) -> PollError {
    PollError::ConfigInvalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl Settings {
    pub fn resolve(&self) -> Result<Config> {
        let target = required(&self.target, ENV_TARGET)?;
        let port = required(&self.port, ENV_PORT)?;
        let community = required(&self.community, ENV_COMMUNITY)?;
        let poll_period = required(&self.poll_period, ENV_POLL_PERIOD)?;

        let port: u16 = port.parse().map_err(|e| invalid(ENV_PORT, port, e))?;
        if port == 0 {
            return Err(invalid(ENV_PORT, "0", "port must be non-zero"));
        }

        let secs: u16 = poll_period
            .parse()
            .map_err(|e| invalid(ENV_POLL_PERIOD, poll_period, e))?;
        if secs == 0 {
            return Err(invalid(ENV_POLL_PERIOD, poll_period, "poll period must be at least 1 second"));
        }

        let timeout = match self.timeout {
            Some(0) => return Err(invalid("XJOB_SNMP_TIMEOUT", "0", "timeout must be non-zero")),
            Some(t) => Duration::from_secs(t),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Config {
            target: target.to_string(),
            port,
            community: community.to_string(),
            poll_interval: Duration::from_secs(secs.into()),
            if_index: self.if_index.unwrap_or(DEFAULT_IF_INDEX),
            timeout,
            max_oids: DEFAULT_MAX_OIDS,
            output_dir: self.output_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}
