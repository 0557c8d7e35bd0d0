use crate::oid::Oid;
use crate::oids::{INTERFACE_COLUMNS, interface_counter_oids};
use crate::snmp::{self, ErrorStatus, PduType, SnmpMessage, SnmpValue, Varbind};
use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

type MibDB = BTreeMap<Oid, SnmpValue>;

/// A minimal SNMPv2c agent that answers GetRequests from a static MIB.
pub struct SnmpAgent {
    socket: UdpSocket,
    communities: Vec<String>,
    mib: Arc<RwLock<MibDB>>,
}

impl SnmpAgent {
    pub fn new(addr: &str, communities: Vec<String>) -> Result<Self> {
        let socket = UdpSocket::bind(addr).context("Failed to bind UDP socket")?;
        socket
            .set_read_timeout(Some(Duration::from_secs(5)))
            .context("Failed to set socket timeout")?;

        Ok(Self {
            socket,
            communities,
            mib: Arc::new(RwLock::new(BTreeMap::new())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .context("Failed to get local address")
    }

    pub fn register_oid(&self, oid: Oid, value: SnmpValue) -> Result<()> {
        self.mib
            .write()
            .map_err(|_| anyhow!("MIB lock poisoned"))?
            .insert(oid, value);
        Ok(())
    }

    // Process an SNMP message
    fn process_message(&self, data: &[u8], src_addr: SocketAddr) -> Result<()> {
        let message = match snmp::decode_snmp_message(data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(%src_addr, error = %e, "Error decoding message");
                return Ok(());
            }
        };

        let community_str = String::from_utf8_lossy(&message.community);
        if !self.communities.iter().any(|c| c == community_str.as_ref()) {
            tracing::warn!(%src_addr, community = %community_str, "Invalid community string");
            return Ok(());
        }

        let response = match message.pdu.pdu_type {
            PduType::GetRequest => self.handle_get_request(&message)?,
            PduType::GetNextRequest | PduType::SetRequest | PduType::GetBulkRequest => {
                tracing::warn!(%src_addr, pdu_type = ?message.pdu.pdu_type, "Unsupported request type");
                snmp::build_response_message(
                    &message,
                    message.pdu.varbinds.clone(),
                    5, // genErr
                    0,
                )
            }
            // only requests are ever answered
            other => {
                tracing::warn!(%src_addr, pdu_type = ?other, "Dropping non-request PDU");
                return Ok(());
            }
        };

        if response.pdu.error_status != 0 {
            tracing::debug!(status = %ErrorStatus::from(response.pdu.error_status), "answering with error");
        }

        self.socket
            .send_to(&snmp::encode_message(&response), src_addr)
            .context("Failed to send SNMP response")?;

        Ok(())
    }

    // Handle a GetRequest
    fn handle_get_request(&self, request: &SnmpMessage) -> Result<SnmpMessage> {
        let mib = self.mib.read().map_err(|_| anyhow!("MIB lock poisoned"))?;

        let response_varbinds = request
            .pdu
            .varbinds
            .iter()
            .map(|varbind| Varbind {
                oid: varbind.oid.clone(),
                value: mib
                    .get(&varbind.oid)
                    .cloned()
                    .unwrap_or(SnmpValue::NoSuchObject),
            })
            .collect();

        Ok(snmp::build_response_message(request, response_varbinds, 0, 0))
    }

    // Run the SNMP agent
    pub fn run(&self) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "SNMP agent running");

        let mut buf = [0u8; 4096];

        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((size, src_addr)) => {
                    if let Err(e) = self.process_message(&buf[..size], src_addr) {
                        tracing::warn!(error = %e, "Error processing message");
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    // Timeout, continue
                    continue;
                }
                Err(e) => {
                    return Err(e).context("Error receiving data");
                }
            }
        }
    }

    // Run the agent in a separate thread
    pub fn run_in_thread(self) -> thread::JoinHandle<Result<()>> {
        thread::spawn(move || self.run())
    }
}

/// Deterministic values for one interface, covering every polled column.
pub struct InterfaceMib;

impl InterfaceMib {
    pub fn sample(if_index: u32) -> Vec<(Oid, SnmpValue)> {
        INTERFACE_COLUMNS
            .iter()
            .zip(interface_counter_oids(if_index))
            .enumerate()
            .map(|(i, ((name, _), oid))| {
                let value = match *name {
                    "ifName" => SnmpValue::OctetString(format!("eth{}", if_index).into_bytes()),
                    n if n.starts_with("ifHC") => {
                        SnmpValue::Counter64(1_000_000 * (i as u64 + 1) + if_index as u64)
                    }
                    _ => SnmpValue::Counter32(i as u32),
                };
                (oid, value)
            })
            .collect()
    }

    pub fn register(agent: &SnmpAgent, if_index: u32) -> Result<()> {
        for (oid, value) in Self::sample(if_index) {
            agent.register_oid(oid, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_with_sample() -> SnmpAgent {
        let agent = SnmpAgent::new("127.0.0.1:0", vec!["public".to_string()]).unwrap();
        InterfaceMib::register(&agent, 2).unwrap();
        agent
    }

    fn message_of(pdu_type: PduType) -> SnmpMessage {
        let oid: Oid = "1.3.6.1.2.1.1.5.0".parse().unwrap();
        let mut message = snmp::build_get_request("public", 21, &[oid]);
        message.pdu.pdu_type = pdu_type;
        message
    }

    /// Feeds `message` to the agent and returns whatever it sends back.
    fn reply_to(agent: &SnmpAgent, message: &SnmpMessage) -> Option<SnmpMessage> {
        let manager = UdpSocket::bind("127.0.0.1:0").unwrap();
        manager
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let data = snmp::encode_message(message);
        agent
            .process_message(&data, manager.local_addr().unwrap())
            .unwrap();

        let mut buf = [0u8; 1500];
        match manager.recv(&mut buf) {
            Ok(len) => Some(snmp::decode_snmp_message(&buf[..len]).unwrap()),
            Err(_) => None,
        }
    }

    #[test]
    fn unsupported_requests_get_gen_err() {
        let agent = agent_with_sample();
        for pdu_type in [
            PduType::GetNextRequest,
            PduType::SetRequest,
            PduType::GetBulkRequest,
        ] {
            let reply = reply_to(&agent, &message_of(pdu_type)).expect("no reply");
            assert_eq!(reply.pdu.pdu_type, PduType::Response);
            assert_eq!(reply.pdu.request_id, 21);
            assert_eq!(reply.pdu.error_status, 5);
        }
    }

    #[test]
    fn non_request_pdus_are_dropped() {
        let agent = agent_with_sample();
        for pdu_type in [
            PduType::Response,
            PduType::Report,
            PduType::SnmpV2Trap,
            PduType::InformRequest,
        ] {
            assert_eq!(reply_to(&agent, &message_of(pdu_type)), None, "{:?}", pdu_type);
        }
    }

    #[test]
    fn get_request_is_answered() {
        let agent = agent_with_sample();
        let reply = reply_to(&agent, &message_of(PduType::GetRequest)).expect("no reply");
        assert_eq!(reply.pdu.error_status, 0);
        assert_eq!(reply.pdu.varbinds[0].value, SnmpValue::NoSuchObject);
    }

    #[test]
    fn sample_covers_every_column() {
        let sample = InterfaceMib::sample(2);
        assert_eq!(sample.len(), INTERFACE_COLUMNS.len());
        assert_eq!(sample[0].1, SnmpValue::OctetString(b"eth2".to_vec()));
        assert!(matches!(sample[6].1, SnmpValue::Counter64(_)));
        assert!(matches!(sample[1].1, SnmpValue::Counter32(_)));
    }

    #[test]
    fn unknown_oid_gets_no_such_object() {
        let agent = agent_with_sample();
        let known = InterfaceMib::sample(2)[0].0.clone();
        let unknown: Oid = "1.3.6.1.2.1.1.5.0".parse().unwrap();
        let request = snmp::build_get_request("public", 9, &[known, unknown.clone()]);

        let response = agent.handle_get_request(&request).unwrap();
        assert_eq!(response.pdu.pdu_type, PduType::Response);
        assert_eq!(response.pdu.request_id, 9);
        assert_eq!(response.pdu.error_status, 0);
        assert_eq!(
            response.pdu.varbinds[0].value,
            SnmpValue::OctetString(b"eth2".to_vec())
        );
        assert_eq!(
            response.pdu.varbinds[1],
            Varbind {
                oid: unknown,
                value: SnmpValue::NoSuchObject
            }
        );
    }
}
