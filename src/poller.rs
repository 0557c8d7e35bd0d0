use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use crate::client::SnmpSession;
use crate::config::{Config, ENV_POLL_PERIOD};
use crate::error::{PollError, Result};
use crate::oid::Oid;
use crate::oids::interface_counter_oids;
use crate::record::{PollLog, PollRecord};
use crate::snmp;

/// Polls a fixed OID list from one agent through an open session.
pub struct Poller<S> {
    session: S,
    oids: Vec<Oid>,
}

impl<S: SnmpSession> Poller<S> {
    /// Opens the session with `connect`. The configuration has already been
    /// validated, so this is the first point that touches the network.
    pub fn initialize<F>(config: &Config, connect: F) -> Result<Self>
    where
        F: FnOnce(&Config) -> anyhow::Result<S>,
    {
        let session = connect(config).map_err(|detail| PollError::ConnectFailed {
            target: format!("{}:{}", config.target, config.port),
            detail,
        })?;
        Ok(Self::new(session, interface_counter_oids(config.if_index)))
    }

    pub fn new(session: S, oids: Vec<Oid>) -> Self {
        Self { session, oids }
    }

    pub fn oids(&self) -> &[Oid] {
        &self.oids
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Size of a GetRequest for the polled OIDs, built locally with request
    /// id 0 and NULL values.
    fn request_size(&self) -> Result<usize> {
        let sized_request = snmp::build_get_request(self.session.community(), 0, &self.oids);
        let bytes = self
            .session
            .marshal(&sized_request)
            .map_err(PollError::RequestFailed)?;
        Ok(bytes.len())
    }

    /// One poll: get, print each variable to `out`, and account sizes.
    pub fn tick<W: Write>(&mut self, out: &mut W) -> Result<PollRecord> {
        let response = self
            .session
            .get(&self.oids)
            .map_err(PollError::RequestFailed)?;

        for (i, varbind) in response.pdu.varbinds.iter().enumerate() {
            let rendered = varbind.value.render();
            writeln!(
                out,
                "{}: oid: {} {}: {}",
                i, varbind.oid, rendered.kind, rendered.text
            )
            .map_err(PollError::Output)?;
        }
        out.flush().map_err(PollError::Output)?;

        let request_bytes = self.request_size()?;
        let response_bytes = self
            .session
            .marshal(&response)
            .map_err(PollError::RequestFailed)?
            .len();

        Ok(PollRecord::new(request_bytes, response_bytes))
    }

    /// Ticks every `interval`, appending each record to `log`, until `limit`
    /// ticks have completed or one fails. Returns the number of ticks.
    pub fn run<W: Write>(
        &mut self,
        interval: Duration,
        log: &PollLog,
        out: &mut W,
        limit: Option<u64>,
    ) -> Result<u64> {
        let mut schedule =
            Schedule::new(Instant::now(), interval).ok_or_else(|| PollError::ConfigInvalid {
                name: ENV_POLL_PERIOD,
                value: format!("{:?}", interval),
                reason: "poll interval too large".to_string(),
            })?;
        let mut completed = 0;

        while limit.is_none_or(|limit| completed < limit) {
            let deadline = schedule.next_deadline(Instant::now());
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }

            let record = self.tick(out)?;
            log.append(&record)?;
            completed += 1;
            tracing::debug!(
                tick = completed,
                request_bytes = record.request_bytes,
                response_bytes = record.response_bytes,
                "tick recorded"
            );
        }

        Ok(completed)
    }
}

/// Fixed-rate deadlines that never queue up: a deadline that passed while
/// the previous tick was still running is dropped.
#[derive(Debug)]
struct Schedule {
    next: Instant,
    interval: Duration,
}

impl Schedule {
    /// `None` when the first deadline is not representable.
    fn new(start: Instant, interval: Duration) -> Option<Self> {
        let next = start.checked_add(interval)?;
        // keeps every later deadline representable too
        next.checked_add(interval)?;
        Some(Self { next, interval })
    }

    fn next_deadline(&mut self, now: Instant) -> Instant {
        let mut deadline = self.next;
        if now > deadline && !self.interval.is_zero() {
            let behind = now - deadline;
            let interval_nanos = self.interval.as_nanos();
            let missed = behind.as_nanos() / interval_nanos;
            if missed > 0 {
                tracing::warn!(
                    missed = u64::try_from(missed).unwrap_or(u64::MAX),
                    "skipping ticks missed while polling"
                );
                // latest deadline not after `now`; the remainder is below one interval
                let into_period = behind.as_nanos() % interval_nanos;
                deadline = now - Duration::from_nanos(into_period as u64);
            }
        }
        self.next = deadline.checked_add(self.interval).unwrap_or(deadline);
        deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::{SnmpMessage, SnmpValue, Varbind, build_response_message};
    use anyhow::anyhow;
    use bytes::Bytes;
    use std::cell::Cell;
    use std::path::PathBuf;
    use std::rc::Rc;
    use tempfile::tempdir;

    /// Replies with a fixed set of values and reports fixed wire sizes.
    struct ScriptedSession {
        values: Vec<SnmpValue>,
        request_len: usize,
        response_len: usize,
        requests: Vec<Vec<Oid>>,
        fail: bool,
    }

    impl ScriptedSession {
        fn new(values: Vec<SnmpValue>) -> Self {
            Self {
                values,
                request_len: 32,
                response_len: 40,
                requests: Vec::new(),
                fail: false,
            }
        }
    }

    impl SnmpSession for ScriptedSession {
        fn community(&self) -> &str {
            "public"
        }

        fn get(&mut self, oids: &[Oid]) -> anyhow::Result<SnmpMessage> {
            self.requests.push(oids.to_vec());
            if self.fail {
                return Err(anyhow!("request timeout"));
            }
            let request = snmp::build_get_request("public", 1, oids);
            let varbinds = oids
                .iter()
                .zip(&self.values)
                .map(|(oid, value)| Varbind {
                    oid: oid.clone(),
                    value: value.clone(),
                })
                .collect();
            Ok(build_response_message(&request, varbinds, 0, 0))
        }

        fn marshal(&self, message: &SnmpMessage) -> anyhow::Result<Bytes> {
            let len = match message.pdu.pdu_type {
                snmp::PduType::GetRequest => self.request_len,
                _ => self.response_len,
            };
            Ok(Bytes::from(vec![0u8; len]))
        }
    }

    fn three_oids() -> Vec<Oid> {
        interface_counter_oids(59).into_iter().take(3).collect()
    }

    fn three_values() -> Vec<SnmpValue> {
        vec![
            SnmpValue::Counter64(123456789012),
            SnmpValue::Integer(7),
            SnmpValue::OctetString(b"ge-0/0/1".to_vec()),
        ]
    }

    fn example_config() -> Config {
        Config {
            target: "192.0.2.1".into(),
            port: 161,
            community: "public".into(),
            poll_interval: Duration::from_secs(5),
            if_index: 59,
            timeout: Duration::from_secs(2),
            max_oids: 60,
            output_dir: PathBuf::from("."),
        }
    }

    #[test]
    fn prints_one_line_per_variable_in_order() {
        let oids = three_oids();
        let mut poller = Poller::new(ScriptedSession::new(three_values()), oids.clone());
        let mut out = Vec::new();
        poller.tick(&mut out).unwrap();

        let printed = String::from_utf8(out).unwrap();
        let expected = format!(
            "0: oid: {} number: 123456789012\n1: oid: {} number: 7\n2: oid: {} string: ge-0/0/1\n",
            oids[0], oids[1], oids[2]
        );
        assert_eq!(printed, expected);
    }

    #[test]
    fn record_total_is_request_plus_response() {
        let mut poller = Poller::new(ScriptedSession::new(three_values()), three_oids());
        let record = poller.tick(&mut Vec::new()).unwrap();
        assert_eq!(record, PollRecord::new(32, 40));
        assert_eq!(record.total_bytes, record.request_bytes + record.response_bytes);
    }

    #[test]
    fn same_oids_every_tick() {
        let mut poller = Poller::new(ScriptedSession::new(three_values()), three_oids());
        for _ in 0..3 {
            poller.tick(&mut Vec::new()).unwrap();
        }
        let requests = &poller.session().requests;
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.as_slice() == poller.oids()));
    }

    #[test]
    fn failed_get_is_request_failed() {
        let mut session = ScriptedSession::new(three_values());
        session.fail = true;
        let mut poller = Poller::new(session, three_oids());
        let mut out = Vec::new();
        assert!(matches!(poller.tick(&mut out), Err(PollError::RequestFailed(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn missing_setting_never_connects() {
        let connected = Rc::new(Cell::new(false));
        let settings = crate::config::Settings {
            target: Some("192.0.2.1".into()),
            port: Some("161".into()),
            community: None,
            poll_period: Some("5".into()),
            ..Default::default()
        };

        let flag = connected.clone();
        let result = settings.resolve().and_then(|config| {
            Poller::initialize(&config, |_| {
                flag.set(true);
                Ok(ScriptedSession::new(Vec::new()))
            })
        });

        assert!(matches!(result, Err(PollError::ConfigMissing { .. })));
        assert!(!connected.get());
    }

    #[test]
    fn connect_failure_is_reported() {
        let result: Result<Poller<ScriptedSession>> =
            Poller::initialize(&example_config(), |_| Err(anyhow!("no route")));
        match result {
            Err(PollError::ConnectFailed { target, .. }) => assert_eq!(target, "192.0.2.1:161"),
            _ => panic!("expected ConnectFailed"),
        }
    }

    #[test]
    fn end_to_end_row() {
        let tmp = tempdir().unwrap();
        let config = example_config();
        let mut poller =
            Poller::initialize(&config, |_| Ok(ScriptedSession::new(three_values()))).unwrap();
        assert_eq!(poller.oids().len(), 14);

        let log = PollLog::create(tmp.path(), chrono::Utc::now()).unwrap();
        let record = poller.tick(&mut Vec::new()).unwrap();
        log.append(&record).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec![crate::record::LOG_HEADER, "32, 40, 72"]);
    }

    #[test]
    fn run_appends_one_row_per_tick_after_a_single_header() {
        let tmp = tempdir().unwrap();
        let log = PollLog::create(tmp.path(), chrono::Utc::now()).unwrap();
        let mut poller = Poller::new(ScriptedSession::new(three_values()), three_oids());

        let started = Instant::now();
        let ticks = poller
            .run(Duration::from_millis(10), &log, &mut Vec::new(), Some(3))
            .unwrap();
        assert_eq!(ticks, 3);
        assert!(started.elapsed() >= Duration::from_millis(30));

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines.iter().filter(|l| **l == crate::record::LOG_HEADER).count(),
            1
        );
        assert_eq!(lines[0], crate::record::LOG_HEADER);
        assert!(lines[1..].iter().all(|l| *l == "32, 40, 72"));
    }

    #[test]
    fn run_stops_on_first_failure() {
        let tmp = tempdir().unwrap();
        let log = PollLog::create(tmp.path(), chrono::Utc::now()).unwrap();
        let mut session = ScriptedSession::new(three_values());
        session.fail = true;
        let mut poller = Poller::new(session, three_oids());

        let result = poller.run(Duration::from_millis(1), &log, &mut Vec::new(), None);
        assert!(matches!(result, Err(PollError::RequestFailed(_))));
        assert_eq!(poller.session().requests.len(), 1);
        assert_eq!(std::fs::read_to_string(log.path()).unwrap().lines().count(), 1);
    }

    #[test]
    fn schedule_rejects_unrepresentable_interval() {
        assert!(Schedule::new(Instant::now(), Duration::MAX).is_none());
        assert!(Schedule::new(Instant::now(), Duration::from_secs(u16::MAX.into())).is_some());
    }

    #[test]
    fn run_with_oversized_interval_is_an_error() {
        let tmp = tempdir().unwrap();
        let log = PollLog::create(tmp.path(), chrono::Utc::now()).unwrap();
        let mut poller = Poller::new(ScriptedSession::new(three_values()), three_oids());

        let result = poller.run(Duration::MAX, &log, &mut Vec::new(), Some(1));
        assert!(matches!(
            result,
            Err(PollError::ConfigInvalid { name: ENV_POLL_PERIOD, .. })
        ));
        assert!(poller.session().requests.is_empty());
    }

    #[test]
    fn schedule_skips_missed_deadlines() {
        let start = Instant::now();
        let interval = Duration::from_secs(5);
        let mut schedule = Schedule::new(start, interval).unwrap();

        assert_eq!(schedule.next_deadline(start), start + interval);
        // polling ran until 17s; only the latest missed deadline survives
        let late = start + Duration::from_secs(17);
        assert_eq!(schedule.next_deadline(late), start + Duration::from_secs(15));
        assert_eq!(
            schedule.next_deadline(start + Duration::from_secs(15)),
            start + Duration::from_secs(20)
        );
    }
}
