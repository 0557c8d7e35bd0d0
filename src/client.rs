use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use bytes::Bytes;

use crate::config::Config;
use crate::oid::Oid;
use crate::snmp::{self, ErrorStatus, PduType, SnmpMessage};

/// The operations the poller needs from an SNMP session.
pub trait SnmpSession {
    fn community(&self) -> &str;

    /// Sends one GetRequest for `oids` and waits for the matching Response.
    fn get(&mut self, oids: &[Oid]) -> Result<SnmpMessage>;

    /// Wire form of `message`, used for size accounting.
    fn marshal(&self, message: &SnmpMessage) -> Result<Bytes> {
        Ok(snmp::encode_message(message))
    }
}

/// An SNMPv2c session over one connected UDP socket.
pub struct UdpSession {
    socket: UdpSocket,
    target: SocketAddr,
    community: String,
    timeout: Duration,
    max_oids: usize,
    request_id: i32,
}

impl UdpSession {
    pub fn connect(config: &Config) -> Result<Self> {
        let target = (config.target.as_str(), config.port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}:{}", config.target, config.port))?
            .next()
            .ok_or_else(|| anyhow!("{} resolved to no addresses", config.target))?;

        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).context("Failed to bind UDP socket")?;
        socket
            .connect(target)
            .with_context(|| format!("Failed to connect UDP socket to {}", target))?;
        socket
            .set_read_timeout(Some(config.timeout))
            .context("Failed to set socket timeout")?;

        tracing::debug!(%target, local = ?socket.local_addr().ok(), "session opened");

        Ok(Self {
            socket,
            target,
            community: config.community.clone(),
            timeout: config.timeout,
            max_oids: config.max_oids,
            request_id: 1,
        })
    }

    fn next_request_id(&mut self) -> i32 {
        let id = self.request_id;
        self.request_id = if id == i32::MAX { 1 } else { id + 1 };
        id
    }

    fn receive_response(&self, request_id: i32, sent: Instant) -> Result<SnmpMessage> {
        let mut buf = vec![0u8; 65_535];

        loop {
            let remaining = self.timeout.saturating_sub(sent.elapsed());
            if remaining.is_zero() {
                bail!("request timeout after {:?}", self.timeout);
            }
            self.socket
                .set_read_timeout(Some(remaining))
                .context("Failed to set socket timeout")?;

            let len = match self.socket.recv(&mut buf) {
                Ok(len) => len,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    bail!("request timeout after {:?}", self.timeout);
                }
                Err(e) => return Err(e).context("Failed to receive SNMP response"),
            };

            let message = match snmp::decode_snmp_message(&buf[..len]) {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!(error = %e, len, "discarding undecodable datagram");
                    continue;
                }
            };

            if message.pdu.pdu_type != PduType::Response || message.pdu.request_id != request_id {
                tracing::debug!(
                    pdu_type = ?message.pdu.pdu_type,
                    request_id = message.pdu.request_id,
                    expected = request_id,
                    "discarding unexpected message"
                );
                continue;
            }

            tracing::info!(
                "Query latency in seconds: {}",
                sent.elapsed().as_secs_f64()
            );
            return Ok(message);
        }
    }
}

impl SnmpSession for UdpSession {
    fn community(&self) -> &str {
        &self.community
    }

    fn get(&mut self, oids: &[Oid]) -> Result<SnmpMessage> {
        if oids.len() > self.max_oids {
            bail!(
                "oid count ({}) is greater than max oids ({})",
                oids.len(),
                self.max_oids
            );
        }

        let request_id = self.next_request_id();
        let request = snmp::build_get_request(&self.community, request_id, oids);
        let buf = snmp::encode_message(&request);

        let sent = Instant::now();
        self.socket
            .send(&buf)
            .with_context(|| format!("Failed to send SNMP request to {}", self.target))?;
        tracing::trace!(request_id, len = buf.len(), "request sent");

        let response = self.receive_response(request_id, sent)?;

        if response.pdu.error_status != 0 {
            bail!(
                "agent returned error-status {} at index {}",
                ErrorStatus::from(response.pdu.error_status),
                response.pdu.error_index
            );
        }

        Ok(response)
    }
}
