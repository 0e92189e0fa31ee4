//! Per-test structured logger.
//!
//! Each [`TestLogger`] owns one JSON-lines file at
//! `{artifact_dir}/logs/{test}-{%Y%m%d-%H%M%S}.log`. Every entry carries the
//! current metadata map. A single mutex guards the file handle and the
//! metadata, so entries never interleave and metadata changes are atomic with
//! respect to writes.
//!
//! `close()` appends a final entry, optionally writes
//! `{artifact_dir}/{test}-report.json`, and releases the file. Later calls to
//! `close()` do nothing and later entries are dropped.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{self, TestConfiguration};
use crate::error::{Error, Result};

/// Filename timestamp layout for log files.
pub const LOG_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

// ── Entries ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339.
    pub timestamp: String,
    pub test_name: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Summary persisted next to the logs on close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub test_name: String,
    pub start_time: String,
    pub end_time: String,
    /// Human-readable, e.g. `1m 3s 12ms`.
    pub duration: String,
    pub duration_ms: u64,
    pub artifact_dir: String,
    pub final_metadata: Map<String, Value>,
}

// ── Options ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerOptions {
    pub artifact_dir: PathBuf,
    /// Keep `Debug` entries.
    pub detailed: bool,
    /// Also emit each entry as a `tracing` event.
    pub mirror: bool,
    pub write_report_on_close: bool,
}

impl LoggerOptions {
    #[must_use]
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            detailed: false,
            mirror: false,
            write_report_on_close: true,
        }
    }

    /// Detailed logging also turns on mirroring.
    #[must_use]
    pub fn from_config(config: &TestConfiguration) -> Self {
        Self {
            artifact_dir: config.artifact_dir.clone(),
            detailed: config.enable_detailed_logs,
            mirror: config.enable_detailed_logs,
            write_report_on_close: true,
        }
    }

    #[must_use]
    pub const fn detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    #[must_use]
    pub const fn mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    #[must_use]
    pub const fn write_report_on_close(mut self, write: bool) -> Self {
        self.write_report_on_close = write;
        self
    }
}

// ── Logger ──────────────────────────────────────────────────────────────

struct LoggerState {
    file: Option<File>,
    metadata: Map<String, Value>,
}

pub struct TestLogger {
    test_name: String,
    options: LoggerOptions,
    log_path: PathBuf,
    start_time: DateTime<Local>,
    started: Instant,
    state: Mutex<LoggerState>,
}

impl fmt::Debug for TestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestLogger")
            .field("test_name", &self.test_name)
            .field("log_path", &self.log_path)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl TestLogger {
    /// Create the logs directory and open a fresh log file.
    pub fn new(test_name: &str, options: LoggerOptions) -> Result<Self> {
        let start_time = Local::now();
        let stamp = start_time.format(LOG_STAMP_FORMAT).to_string();
        let file_stem = file_safe_name(test_name);
        let log_path = config::log_file_path(&options.artifact_dir, &file_stem, &stamp);
        if let Some(dir) = log_path.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::io("create log directory", dir, e))?;
        }
        let file =
            File::create(&log_path).map_err(|e| Error::io("create log file", &log_path, e))?;

        let logger = Self {
            test_name: test_name.to_string(),
            options,
            log_path,
            start_time,
            started: Instant::now(),
            state: Mutex::new(LoggerState {
                file: Some(file),
                metadata: Map::new(),
            }),
        };
        logger.info("Test logger initialized");
        Ok(logger)
    }

    #[must_use]
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    #[must_use]
    pub fn artifact_dir(&self) -> &Path {
        &self.options.artifact_dir
    }

    #[must_use]
    pub const fn detailed(&self) -> bool {
        self.options.detailed
    }

    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        config::report_file_path(&self.options.artifact_dir, &file_safe_name(&self.test_name))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().file.is_none()
    }

    fn lock(&self) -> MutexGuard<'_, LoggerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Leveled entries ─────────────────────────────────────────────────

    pub fn log(&self, level: LogLevel, message: impl fmt::Display) {
        let mut state = self.lock();
        self.write_locked(&mut state, level, &message.to_string());
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(LogLevel::Error, message);
    }

    /// Write one entry while the caller already holds the state lock.
    fn write_locked(&self, state: &mut LoggerState, level: LogLevel, message: &str) {
        if level == LogLevel::Debug && !self.options.detailed {
            return;
        }
        let Some(file) = state.file.as_mut() else {
            return;
        };
        let entry = LogEntry {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            test_name: self.test_name.clone(),
            level,
            message: message.to_string(),
            metadata: state.metadata.clone(),
        };
        let written = serde_json::to_string(&entry)
            .map_err(io::Error::other)
            .and_then(|line| writeln!(file, "{line}"));
        if let Err(e) = written {
            tracing::warn!(path = %self.log_path.display(), error = %e, "failed to write log entry");
        }
        if self.options.mirror {
            mirror_entry(&entry);
        }
    }

    // ── Metadata ────────────────────────────────────────────────────────

    /// Attach a key to every later entry, replacing any previous value.
    pub fn add_metadata(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock().metadata.insert(key.into(), value.into());
    }

    pub fn remove_metadata(&self, key: &str) -> Option<Value> {
        self.lock().metadata.remove(key)
    }

    #[must_use]
    pub fn metadata(&self) -> Map<String, Value> {
        self.lock().metadata.clone()
    }

    // ── Convenience entries ─────────────────────────────────────────────

    pub fn step(&self, number: usize, description: &str) {
        self.info(format_args!("Step {number}: {description}"));
    }

    /// Run `f` as a named step, logging its start, duration, and failure.
    pub fn log_test_step<T, E, F>(&self, name: &str, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: fmt::Display,
    {
        self.info(format_args!("Starting test step: {name}"));
        let start = Instant::now();
        let outcome = f();
        let elapsed = format_elapsed(start.elapsed());
        match &outcome {
            Ok(_) => self.info(format_args!(
                "Test step completed: {name} (duration: {elapsed})"
            )),
            Err(e) => self.error(format_args!(
                "Test step failed: {name} (duration: {elapsed}, error: {e})"
            )),
        }
        outcome
    }

    pub fn resource(&self, action: &str, resource_type: &str, name: &str) {
        self.info(format_args!("{action} resource: {resource_type}.{name}"));
    }

    /// Records the resource identity as metadata, then logs the creation.
    pub fn log_resource_creation(
        &self,
        resource_type: &str,
        name: &str,
        attributes: &Map<String, Value>,
    ) {
        {
            let mut state = self.lock();
            state
                .metadata
                .insert("resource_type".to_string(), Value::from(resource_type));
            state
                .metadata
                .insert("resource_name".to_string(), Value::from(name));
        }
        self.resource("Creating", resource_type, name);
        if !attributes.is_empty() {
            self.debug(format_args!(
                "Resource attributes: {}",
                Value::Object(attributes.clone())
            ));
        }
    }

    pub fn log_resource_destruction(&self, resource_type: &str, name: &str) {
        self.resource("Destroying", resource_type, name);
    }

    pub fn log_api_call(&self, method: &str, endpoint: &str, params: &Value) {
        self.debug(format_args!("API Call: {method} {endpoint} (params: {params})"));
    }

    pub fn log_api_response(&self, status: u16, duration: Duration, response: &Value) {
        self.debug(format_args!(
            "API Response: status={status}, duration={}",
            format_elapsed(duration)
        ));
        if self.options.detailed {
            self.debug(format_args!("Response data: {response}"));
        }
    }

    pub fn log_duration(&self, label: &str, duration: Duration) {
        self.info(format_args!("{label} took {}", format_elapsed(duration)));
    }

    // ── Artifacts ───────────────────────────────────────────────────────

    /// Write `content` to `{artifact_dir}/{name}`, creating parent dirs.
    pub fn save_artifact(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.artifact_target(name)?;
        fs::write(&path, content).map_err(|e| Error::io("write artifact", &path, e))?;
        self.info(format_args!("Saved artifact: {name}"));
        Ok(path)
    }

    /// Stream `reader` into `{artifact_dir}/{name}`. Returns bytes copied.
    pub fn save_artifact_from_reader(&self, name: &str, reader: &mut impl Read) -> Result<u64> {
        let path = self.artifact_target(name)?;
        let mut out =
            File::create(&path).map_err(|e| Error::io("create artifact file", &path, e))?;
        let copied =
            io::copy(reader, &mut out).map_err(|e| Error::io("copy artifact data", &path, e))?;
        self.info(format_args!("Saved artifact from reader: {name}"));
        Ok(copied)
    }

    /// Hand `f` a writer backed by `logs/{name}-output.log`.
    pub fn capture_output<T, F>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<T>,
    {
        validate_artifact_name(name)?;
        let path = self
            .options
            .artifact_dir
            .join("logs")
            .join(format!("{name}-output.log"));
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::io("create capture directory", dir, e))?;
        }
        let mut file = File::create(&path).map_err(|e| Error::io("create capture file", &path, e))?;
        self.info(format_args!("Capturing output for: {name}"));
        let value = f(&mut file).map_err(|e| Error::io("capture output to", &path, e))?;
        file.flush()
            .map_err(|e| Error::io("flush capture file", &path, e))?;
        Ok(value)
    }

    fn artifact_target(&self, name: &str) -> Result<PathBuf> {
        validate_artifact_name(name)?;
        let path = self.options.artifact_dir.join(name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::io("create artifact directory", dir, e))?;
        }
        Ok(path)
    }

    // ── Close ───────────────────────────────────────────────────────────

    fn build_report(&self, metadata: &Map<String, Value>) -> TestReport {
        let elapsed = self.started.elapsed();
        TestReport {
            test_name: self.test_name.clone(),
            start_time: self.start_time.to_rfc3339_opts(SecondsFormat::Secs, false),
            end_time: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            duration: format_elapsed(elapsed),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            artifact_dir: self.options.artifact_dir.display().to_string(),
            final_metadata: metadata.clone(),
        }
    }

    /// Finish the log. Safe to call more than once.
    ///
    /// # Errors
    /// The report cannot be serialized or written, or the log cannot be
    /// flushed. The file handle is released either way.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock();
        if state.file.is_none() {
            return Ok(());
        }
        self.write_locked(&mut state, LogLevel::Info, "Test execution completed");

        let report_result = if self.options.write_report_on_close {
            let report = self.build_report(&state.metadata);
            let path = self.report_path();
            let written = serde_json::to_string_pretty(&report)
                .map_err(Error::from)
                .and_then(|json| {
                    fs::write(&path, json).map_err(|e| Error::io("write report", &path, e))
                });
            if written.is_ok() {
                let message = format!("Test report generated: {}", path.display());
                self.write_locked(&mut state, LogLevel::Info, &message);
            }
            written
        } else {
            Ok(())
        };

        let flushed = match state.file.take() {
            Some(mut file) => file
                .flush()
                .map_err(|e| Error::io("flush log file", &self.log_path, e)),
            None => Ok(()),
        };
        report_result.and(flushed)
    }
}

/// Test names may contain `/` for sub-tests; keep them in one file name.
pub(crate) fn file_safe_name(test_name: &str) -> String {
    test_name.replace(['/', '\\'], "_")
}

/// Artifact names must be non-empty relative paths without `..`.
fn validate_artifact_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if name.is_empty() || path.is_absolute() || escapes {
        return Err(Error::InvalidArtifactName(name.to_string()));
    }
    Ok(())
}

fn format_elapsed(d: Duration) -> String {
    // Millisecond precision keeps the text readable.
    let trimmed = Duration::from_millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
    if trimmed.is_zero() {
        return "0ms".to_string();
    }
    humantime::format_duration(trimmed).to_string()
}

fn mirror_entry(entry: &LogEntry) {
    let test = entry.test_name.as_str();
    let message = entry.message.as_str();
    match entry.level {
        LogLevel::Debug => tracing::debug!(test, "{message}"),
        LogLevel::Info => tracing::info!(test, "{message}"),
        LogLevel::Warn => tracing::warn!(test, "{message}"),
        LogLevel::Error => tracing::error!(test, "{message}"),
    }
}

// ── Factory ─────────────────────────────────────────────────────────────

/// Creates loggers sharing one set of options and prunes old log files.
#[derive(Debug, Clone)]
pub struct LoggerFactory {
    options: LoggerOptions,
}

impl LoggerFactory {
    #[must_use]
    pub const fn new(options: LoggerOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn from_config(config: &TestConfiguration) -> Self {
        Self::new(LoggerOptions::from_config(config))
    }

    #[must_use]
    pub const fn options(&self) -> &LoggerOptions {
        &self.options
    }

    pub fn create_logger(&self, test_name: &str) -> Result<TestLogger> {
        TestLogger::new(test_name, self.options.clone())
    }

    /// Delete files in `logs/` last modified before `now - older_than`.
    ///
    /// A missing logs directory removes nothing. Individual removal failures
    /// are logged and skipped.
    pub fn cleanup_old_logs(&self, older_than: Duration) -> Result<usize> {
        let log_dir = self.options.artifact_dir.join("logs");
        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let entries = match fs::read_dir(&log_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::io("read log directory", &log_dir, e)),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };
            if modified >= cutoff {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove old log file");
                }
            }
        }
        tracing::debug!(dir = %log_dir.display(), removed, "pruned old logs");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_entries(path: &Path) -> Vec<LogEntry> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn creates_timestamped_log_file_under_logs() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TestLogger::new("TestAccGateway", LoggerOptions::new(dir.path())).unwrap();
        let name = logger.log_path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("TestAccGateway-"));
        assert!(name.ends_with(".log"));
        // TestAccGateway- + %Y%m%d-%H%M%S + .log
        assert_eq!(name.len(), "TestAccGateway-".len() + 15 + 4);
        assert_eq!(logger.log_path().parent().unwrap(), dir.path().join("logs"));
    }

    #[test]
    fn entries_carry_metadata_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TestLogger::new("TestMeta", LoggerOptions::new(dir.path())).unwrap();
        logger.add_metadata("region", "us-east-1");
        logger.warn("first");
        assert_eq!(logger.remove_metadata("region"), Some(Value::from("us-east-1")));
        logger.error("second");

        let entries = read_entries(logger.log_path());
        assert_eq!(entries[0].message, "Test logger initialized");
        assert!(entries[0].metadata.is_empty());
        assert_eq!(entries[1].level, LogLevel::Warn);
        assert_eq!(entries[1].metadata.get("region"), Some(&Value::from("us-east-1")));
        assert_eq!(entries[2].level, LogLevel::Error);
        assert!(entries[2].metadata.is_empty());
        assert_eq!(entries[2].test_name, "TestMeta");
    }

    #[test]
    fn concurrent_writers_keep_entries_whole() {
        let dir = tempfile::tempdir().unwrap();
        let logger = std::sync::Arc::new(
            TestLogger::new("TestConcurrent", LoggerOptions::new(dir.path())).unwrap(),
        );
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let logger = std::sync::Arc::clone(&logger);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        logger.add_metadata(format!("worker{t}"), i);
                        logger.info(format_args!("worker={t} seq={i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let entries = read_entries(logger.log_path());
        assert_eq!(entries.len(), 1 + 8 * 200);
        for entry in &entries[1..] {
            let (worker, seq) = entry
                .message
                .strip_prefix("worker=")
                .and_then(|rest| rest.split_once(" seq="))
                .unwrap();
            // The writer's own metadata update lands before its entry.
            assert_eq!(
                entry.metadata.get(&format!("worker{worker}")),
                Some(&Value::from(seq.parse::<u64>().unwrap())),
                "{entry:?}"
            );
        }
    }

    #[test]
    fn log_test_step_records_failure() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TestLogger::new("TestStep", LoggerOptions::new(dir.path())).unwrap();
        let ok: std::result::Result<u32, String> = logger.log_test_step("apply", || Ok(7));
        assert_eq!(ok, Ok(7));
        let err: std::result::Result<(), String> =
            logger.log_test_step("destroy", || Err("boom".to_string()));
        assert!(err.is_err());

        let messages: Vec<String> = read_entries(logger.log_path())
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert!(messages.iter().any(|m| m == "Starting test step: apply"));
        assert!(messages.iter().any(|m| m.starts_with("Test step completed: apply")));
        assert!(
            messages
                .iter()
                .any(|m| m.starts_with("Test step failed: destroy") && m.contains("error: boom"))
        );
    }

    #[test]
    fn resource_creation_sets_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TestLogger::new("TestRes", LoggerOptions::new(dir.path())).unwrap();
        logger.log_resource_creation("aviatrix_vpc", "vpc1", &Map::new());
        logger.log_resource_destruction("aviatrix_vpc", "vpc1");
        let entries = read_entries(logger.log_path());
        let last = entries.last().unwrap();
        assert_eq!(last.message, "Destroying resource: aviatrix_vpc.vpc1");
        assert_eq!(last.metadata.get("resource_name"), Some(&Value::from("vpc1")));
    }

    #[test]
    fn artifacts_reject_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TestLogger::new("TestArt", LoggerOptions::new(dir.path())).unwrap();
        for bad in ["", "../evil.txt", "/etc/passwd", "state/../../x"] {
            assert!(
                matches!(logger.save_artifact(bad, b"x"), Err(Error::InvalidArtifactName(_))),
                "{bad}"
            );
        }
        let path = logger.save_artifact("state/main.tfstate", b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
        assert_eq!(path, dir.path().join("state").join("main.tfstate"));
    }

    #[test]
    fn save_from_reader_streams_content() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TestLogger::new("TestReader", LoggerOptions::new(dir.path())).unwrap();
        let mut reader = io::Cursor::new(b"plan output".to_vec());
        let copied = logger
            .save_artifact_from_reader("plan.txt", &mut reader)
            .unwrap();
        assert_eq!(copied, 11);
        assert_eq!(
            fs::read_to_string(dir.path().join("plan.txt")).unwrap(),
            "plan output"
        );
    }

    #[test]
    fn capture_output_writes_side_file() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TestLogger::new("TestCapture", LoggerOptions::new(dir.path())).unwrap();
        let value = logger
            .capture_output("terraform-init", |out| {
                writeln!(out, "Initializing provider plugins...")?;
                Ok(42)
            })
            .unwrap();
        assert_eq!(value, 42);
        let captured =
            fs::read_to_string(dir.path().join("logs").join("terraform-init-output.log")).unwrap();
        assert_eq!(captured, "Initializing provider plugins...\n");
    }

    #[test]
    fn close_writes_report_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TestLogger::new("TestClose", LoggerOptions::new(dir.path())).unwrap();
        logger.add_metadata("enabled_providers", vec!["aws", "oci"]);
        logger.close().unwrap();
        assert!(logger.is_closed());
        logger.close().unwrap();
        logger.info("dropped");

        let report: TestReport =
            serde_json::from_str(&fs::read_to_string(logger.report_path()).unwrap()).unwrap();
        assert_eq!(report.test_name, "TestClose");
        assert_eq!(
            report.final_metadata.get("enabled_providers"),
            Some(&serde_json::json!(["aws", "oci"]))
        );

        let messages: Vec<String> = read_entries(logger.log_path())
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(
            messages
                .iter()
                .filter(|m| *m == "Test execution completed")
                .count(),
            1
        );
        assert!(!messages.iter().any(|m| m == "dropped"));
    }

    #[test]
    fn report_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TestLogger::new(
            "TestNoReport",
            LoggerOptions::new(dir.path()).write_report_on_close(false),
        )
        .unwrap();
        logger.close().unwrap();
        assert!(!logger.report_path().exists());
    }

    #[test]
    fn subtest_names_stay_in_logs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logger = TestLogger::new("TestAcc/aws", LoggerOptions::new(dir.path())).unwrap();
        assert_eq!(logger.log_path().parent().unwrap(), dir.path().join("logs"));
        assert_eq!(logger.report_path(), dir.path().join("TestAcc_aws-report.json"));
    }

    #[test]
    fn cleanup_without_logs_dir_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let factory = LoggerFactory::new(LoggerOptions::new(dir.path().join("absent")));
        assert_eq!(factory.cleanup_old_logs(Duration::ZERO).unwrap(), 0);
    }

    #[test]
    fn cleanup_keeps_recent_files() {
        let dir = tempfile::tempdir().unwrap();
        let factory = LoggerFactory::new(LoggerOptions::new(dir.path()));
        let logger = factory.create_logger("TestRecent").unwrap();
        logger.close().unwrap();
        assert_eq!(
            factory
                .cleanup_old_logs(Duration::from_secs(24 * 3600))
                .unwrap(),
            0
        );
        assert!(logger.log_path().exists());
    }
}
