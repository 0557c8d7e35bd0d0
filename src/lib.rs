pub mod agent;
pub mod asn1;
pub mod client;
pub mod config;
pub mod error;
pub mod oid;
pub mod oids;
pub mod poller;
pub mod record;
pub mod snmp;

pub use client::{SnmpSession, UdpSession};
pub use config::{Config, Settings};
pub use error::PollError;
pub use oid::Oid;
pub use poller::Poller;
pub use record::{PollLog, PollRecord};
