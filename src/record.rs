use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, TimeZone};

use crate::error::{PollError, Result};

pub const LOG_HEADER: &str = "size of request, size of response, total size";
const LOG_PREFIX: &str = "xjob_snmp_replies_";

/// Byte sizes observed for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollRecord {
    pub request_bytes: usize,
    pub response_bytes: usize,
    pub total_bytes: usize,
}

impl PollRecord {
    pub fn new(request_bytes: usize, response_bytes: usize) -> Self {
        Self {
            request_bytes,
            response_bytes,
            total_bytes: request_bytes + response_bytes,
        }
    }
}

impl fmt::Display for PollRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}",
            self.request_bytes, self.response_bytes, self.total_bytes
        )
    }
}

/// Append-only CSV-like file holding one [`PollRecord`] per line.
#[derive(Debug, Clone)]
pub struct PollLog {
    path: PathBuf,
}

impl PollLog {
    /// Creates a fresh log in `dir` named after `now` and writes the header.
    pub fn create<Tz>(dir: &Path, now: DateTime<Tz>) -> Result<Self>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let name = format!(
            "{}{}.txt",
            LOG_PREFIX,
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let path = dir.join(name);

        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Deleted previous dump file"),
            Err(_) => tracing::debug!(path = %path.display(), "Did not delete any old file with same name"),
        }

        fs::File::create(&path).map_err(|source| PollError::FileError {
            path: path.clone(),
            source,
        })?;

        let log = Self { path };
        log.append_line(LOG_HEADER)?;
        tracing::info!(path = %log.path.display(), "poll log created");
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &PollRecord) -> Result<()> {
        self.append_line(&record.to_string())
    }

    fn append_line(&self, line: &str) -> Result<()> {
        let file_error = |source: std::io::Error| PollError::FileError {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(file_error)?;
        writeln!(file, "{}", line).map_err(file_error)?;
        file.sync_data().map_err(file_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use tempfile::tempdir;

    #[test]
    fn total_is_sum() {
        let record = PollRecord::new(32, 40);
        assert_eq!(record.total_bytes, 72);
        assert_eq!(record.to_string(), "32, 40, 72");
    }

    #[test]
    fn file_name_is_timestamped() {
        let tmp = tempdir().unwrap();
        let now = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2021, 5, 4, 13, 2, 1)
            .unwrap();
        let log = PollLog::create(tmp.path(), now).unwrap();
        assert_eq!(
            log.path().file_name().unwrap().to_str().unwrap(),
            "xjob_snmp_replies_2021-05-04T13:02:01+01:00.txt"
        );
    }

    #[test]
    fn header_once_then_rows() {
        let tmp = tempdir().unwrap();
        let log = PollLog::create(tmp.path(), Utc::now()).unwrap();
        log.append(&PollRecord::new(1, 2)).unwrap();
        log.append(&PollRecord::new(3, 4)).unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, format!("{}\n1, 2, 3\n3, 4, 7\n", LOG_HEADER));
    }

    #[test]
    fn recreating_replaces_old_file() {
        let tmp = tempdir().unwrap();
        let now = Utc::now();
        let first = PollLog::create(tmp.path(), now).unwrap();
        first.append(&PollRecord::new(9, 9)).unwrap();

        let second = PollLog::create(tmp.path(), now).unwrap();
        assert_eq!(first.path(), second.path());
        assert_eq!(
            fs::read_to_string(second.path()).unwrap(),
            format!("{}\n", LOG_HEADER)
        );
    }

    #[test]
    fn missing_directory_is_a_file_error() {
        let tmp = tempdir().unwrap();
        let err = PollLog::create(&tmp.path().join("absent"), Utc::now()).unwrap_err();
        assert!(matches!(err, PollError::FileError { .. }));
    }
}
