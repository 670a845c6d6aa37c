//! Attendance log: an append-only CSV with at most one row per (name, date).
//!
//! ```text
//! Name,Date,Time
//! Asha,2026-10-16,09:02:11
//! ```
//!
//! Read-check-append is not atomic on its own, so all writes in a process go
//! through a single writer thread ([`spawn_writer`]).

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub const LOG_HEADER: [&str; 3] = ["Name", "Date", "Time"];
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Error, Debug)]
pub enum LogError {
    #[error("attendance log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("attendance log {path} is corrupt at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: u64,
        reason: String,
    },
    #[error("attendance writer thread exited")]
    WriterClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl AttendanceRecord {
    fn to_row(&self) -> [String; 3] {
        [
            self.name.clone(),
            self.date.format(DATE_FORMAT).to_string(),
            self.time.format(TIME_FORMAT).to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    Recorded(AttendanceRecord),
    AlreadyMarked,
}

/// Direct access to the CSV file. Not synchronized; see [`spawn_writer`].
#[derive(Debug, Clone)]
pub struct AttendanceLog {
    path: PathBuf,
}

impl AttendanceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in file order. A missing or empty file yields no records.
    pub fn view(&self) -> Result<Vec<AttendanceRecord>, LogError> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io(e)),
        };

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

        let headers = reader.headers().map_err(|e| self.corrupt(1, e.to_string()))?;
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        if headers.iter().ne(LOG_HEADER) {
            return Err(self.corrupt(1, format!("unexpected header {headers:?}")));
        }

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| {
                let line = e.position().map_or(0, |p| p.line());
                self.corrupt(line, e.to_string())
            })?;
            let line = row.position().map_or(0, |p| p.line());
            records.push(self.parse_row(&row, line)?);
        }
        Ok(records)
    }

    /// Record `name` as present today, unless already recorded today.
    pub fn mark(&self, name: &str) -> Result<MarkOutcome, LogError> {
        self.mark_at(name, Local::now().naive_local())
    }

    /// [`mark`](Self::mark) with an explicit clock reading.
    ///
    /// Refuses to append when the existing file cannot be parsed.
    pub fn mark_at(&self, name: &str, at: NaiveDateTime) -> Result<MarkOutcome, LogError> {
        let date = at.date();
        let existing = self.view()?;
        if existing.iter().any(|r| r.name == name && r.date == date) {
            tracing::debug!(name, %date, "already marked today");
            return Ok(MarkOutcome::AlreadyMarked);
        }

        let record = AttendanceRecord {
            name: name.to_string(),
            date,
            time: at.time().with_nanosecond(0).unwrap_or(at.time()),
        };
        self.append(&record)?;
        tracing::info!(name, %date, time = %record.time, "attendance recorded");
        Ok(MarkOutcome::Recorded(record))
    }

    fn append(&self, record: &AttendanceRecord) -> Result<(), LogError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io(e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| self.io(e))?;

        let mut existing = Vec::new();
        file.read_to_end(&mut existing).map_err(|e| self.io(e))?;

        // A whitespace-only file has no header yet; start it over.
        let blank = existing.iter().all(u8::is_ascii_whitespace);
        let mut prefix = Vec::new();
        if blank {
            if !existing.is_empty() {
                file.set_len(0).map_err(|e| self.io(e))?;
            }
        } else if existing.last() != Some(&b'\n') {
            prefix.push(b'\n');
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(prefix);
        let write = |w: &mut csv::Writer<Vec<u8>>, row: &[String]| {
            w.write_record(row).map_err(|e| self.io(io::Error::other(e)))
        };
        if blank {
            let header: Vec<String> = LOG_HEADER.iter().map(|h| h.to_string()).collect();
            write(&mut writer, &header)?;
        }
        write(&mut writer, &record.to_row())?;
        let bytes = writer
            .into_inner()
            .map_err(|e| self.io(io::Error::other(e.to_string())))?;

        // Header (if any) and row in a single write.
        io::Write::write_all(&mut file, &bytes).map_err(|e| self.io(e))?;
        file.sync_data().map_err(|e| self.io(e))
    }

    fn parse_row(&self, row: &csv::StringRecord, line: u64) -> Result<AttendanceRecord, LogError> {
        let name = row.get(0).unwrap_or_default();
        if name.is_empty() {
            return Err(self.corrupt(line, "empty name".into()));
        }
        let date = row
            .get(1)
            .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
            .ok_or_else(|| self.corrupt(line, format!("bad date {:?}", row.get(1))))?;
        let time = row
            .get(2)
            .and_then(|t| NaiveTime::parse_from_str(t, TIME_FORMAT).ok())
            .ok_or_else(|| self.corrupt(line, format!("bad time {:?}", row.get(2))))?;
        Ok(AttendanceRecord {
            name: name.to_string(),
            date,
            time,
        })
    }

    fn io(&self, source: io::Error) -> LogError {
        LogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, line: u64, reason: String) -> LogError {
        LogError::Corrupt {
            path: self.path.clone(),
            line,
            reason,
        }
    }
}

enum LogRequest {
    Mark {
        name: String,
        at: NaiveDateTime,
        reply: oneshot::Sender<Result<MarkOutcome, LogError>>,
    },
    View {
        reply: oneshot::Sender<Result<Vec<AttendanceRecord>, LogError>>,
    },
}

/// Clone-safe handle to the attendance writer thread.
///
/// Methods block the calling thread; do not call them from async code.
#[derive(Clone)]
pub struct AttendanceHandle {
    tx: mpsc::Sender<LogRequest>,
}

impl AttendanceHandle {
    pub fn mark(&self, name: &str) -> Result<MarkOutcome, LogError> {
        self.mark_at(name, Local::now().naive_local())
    }

    pub fn mark_at(&self, name: &str, at: NaiveDateTime) -> Result<MarkOutcome, LogError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .blocking_send(LogRequest::Mark {
                name: name.to_string(),
                at,
                reply,
            })
            .map_err(|_| LogError::WriterClosed)?;
        rx.blocking_recv().map_err(|_| LogError::WriterClosed)?
    }

    pub fn view(&self) -> Result<Vec<AttendanceRecord>, LogError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .blocking_send(LogRequest::View { reply })
            .map_err(|_| LogError::WriterClosed)?;
        rx.blocking_recv().map_err(|_| LogError::WriterClosed)?
    }
}

/// Spawn the single writer for `log` on a dedicated OS thread.
///
/// The thread exits once every handle has been dropped.
pub fn spawn_writer(log: AttendanceLog) -> Result<AttendanceHandle, LogError> {
    let (tx, mut rx) = mpsc::channel::<LogRequest>(16);
    let path = log.path().to_path_buf();

    std::thread::Builder::new()
        .name("rollcall-log".into())
        .spawn(move || {
            tracing::debug!(path = %log.path().display(), "attendance writer started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    LogRequest::Mark { name, at, reply } => {
                        let _ = reply.send(log.mark_at(&name, at));
                    }
                    LogRequest::View { reply } => {
                        let _ = reply.send(log.view());
                    }
                }
            }
            tracing::debug!("attendance writer exiting");
        })
        .map_err(|source| LogError::Io { path, source })?;

    Ok(AttendanceHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn temp_log() -> (tempfile::TempDir, AttendanceLog) {
        let tmp = tempfile::tempdir().unwrap();
        let log = AttendanceLog::new(tmp.path().join("attendance.csv"));
        (tmp, log)
    }

    #[test]
    fn test_view_missing_and_empty() {
        let (_tmp, log) = temp_log();
        assert!(log.view().unwrap().is_empty());

        fs::write(log.path(), b"").unwrap();
        assert!(log.view().unwrap().is_empty());

        fs::write(log.path(), b"Name,Date,Time\n").unwrap();
        assert!(log.view().unwrap().is_empty());
    }

    #[test]
    fn test_blank_file_gets_header_on_first_mark() {
        let (_tmp, log) = temp_log();
        fs::write(log.path(), b"\n").unwrap();
        assert!(log.view().unwrap().is_empty());

        log.mark_at("Asha", at(2026, 10, 16, 9, 0, 0)).unwrap();
        assert_eq!(
            fs::read_to_string(log.path()).unwrap(),
            "Name,Date,Time\nAsha,2026-10-16,09:00:00\n"
        );
        log.mark_at("Bob", at(2026, 10, 16, 9, 1, 0)).unwrap();
        assert_eq!(log.view().unwrap().len(), 2);
    }

    #[test]
    fn test_mark_twice_same_day_is_idempotent() {
        let (_tmp, log) = temp_log();
        let first = log.mark_at("Asha", at(2026, 10, 16, 9, 0, 0)).unwrap();
        let second = log.mark_at("Asha", at(2026, 10, 16, 17, 30, 0)).unwrap();

        assert!(matches!(first, MarkOutcome::Recorded(_)));
        assert_eq!(second, MarkOutcome::AlreadyMarked);
        assert_eq!(log.view().unwrap().len(), 1);
    }

    #[test]
    fn test_mark_on_two_dates() {
        let (_tmp, log) = temp_log();
        log.mark_at("Asha", at(2026, 10, 16, 9, 0, 0)).unwrap();
        log.mark_at("Asha", at(2026, 10, 17, 9, 0, 0)).unwrap();
        log.mark_at("Bob", at(2026, 10, 17, 9, 1, 0)).unwrap();

        let records = log.view().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        assert_eq!(records[2].name, "Bob");
    }

    #[test]
    fn test_file_format() {
        let (_tmp, log) = temp_log();
        let mut t = at(2026, 10, 16, 7, 5, 3);
        t += chrono::Duration::milliseconds(250);
        log.mark_at("Ravi Kumar", t).unwrap();
        log.mark_at("O'Neil, Sam", at(2026, 10, 16, 14, 0, 0)).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            text,
            "Name,Date,Time\nRavi Kumar,2026-10-16,07:05:03\n\"O'Neil, Sam\",2026-10-16,14:00:00\n"
        );
        assert_eq!(log.view().unwrap()[1].name, "O'Neil, Sam");
    }

    #[test]
    fn test_missing_trailing_newline_is_repaired() {
        let (_tmp, log) = temp_log();
        fs::write(log.path(), b"Name,Date,Time\nAsha,2026-10-15,09:00:00").unwrap();
        log.mark_at("Bob", at(2026, 10, 16, 9, 0, 0)).unwrap();
        assert_eq!(log.view().unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_log_refuses_append() {
        let (_tmp, log) = temp_log();
        let garbage = b"Name,Date,Time\nAsha,yesterday,09:00:00\n";
        fs::write(log.path(), garbage).unwrap();

        assert!(matches!(log.view(), Err(LogError::Corrupt { .. })));
        assert!(matches!(
            log.mark_at("Bob", at(2026, 10, 16, 9, 0, 0)),
            Err(LogError::Corrupt { .. })
        ));
        assert_eq!(fs::read(log.path()).unwrap(), garbage);
    }

    #[test]
    fn test_wrong_header_and_column_count() {
        let (_tmp, log) = temp_log();
        fs::write(log.path(), b"who,when\nAsha,2026-10-16\n").unwrap();
        assert!(matches!(log.view(), Err(LogError::Corrupt { line: 1, .. })));

        fs::write(log.path(), b"Name,Date,Time\nAsha,2026-10-16\n").unwrap();
        assert!(matches!(log.view(), Err(LogError::Corrupt { .. })));
    }

    #[test]
    fn test_writer_serializes_concurrent_marks() {
        let (_tmp, log) = temp_log();
        let handle = spawn_writer(log.clone()).unwrap();
        let when = at(2026, 10, 16, 9, 0, 0);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let h = handle.clone();
                std::thread::spawn(move || h.mark_at("Asha", when).unwrap())
            })
            .collect();
        let recorded = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|o| matches!(o, MarkOutcome::Recorded(_)))
            .count();

        assert_eq!(recorded, 1);
        assert_eq!(handle.view().unwrap().len(), 1);
    }
}
