//! Per-test counters for resources, API calls, errors, and warnings.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Serializable view of [`TestMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub test_name: String,
    pub start_time: String,
    /// `None` until finalized.
    pub end_time: Option<String>,
    pub duration_seconds: f64,
    pub resources_created: u64,
    pub resources_deleted: u64,
    pub api_call_count: u64,
    pub error_count: usize,
    pub warning_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
struct MetricsState {
    end_time: Option<DateTime<Utc>>,
    duration: Duration,
    resources_created: u64,
    resources_deleted: u64,
    api_calls: u64,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Counters owned by one test case. All mutators are safe to share across
/// threads.
#[derive(Debug)]
pub struct TestMetrics {
    test_name: String,
    start_time: DateTime<Utc>,
    state: Mutex<MetricsState>,
}

impl TestMetrics {
    #[must_use]
    pub fn new(test_name: &str) -> Self {
        Self {
            test_name: test_name.to_string(),
            start_time: Utc::now(),
            state: Mutex::new(MetricsState {
                end_time: None,
                duration: Duration::ZERO,
                resources_created: 0,
                resources_deleted: 0,
                api_calls: 0,
                errors: Vec::new(),
                warnings: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn record_resource_created(&self) {
        self.lock().resources_created += 1;
    }

    pub fn record_resource_deleted(&self) {
        self.lock().resources_deleted += 1;
    }

    pub fn record_api_call(&self) {
        self.lock().api_calls += 1;
    }

    pub fn record_error(&self, message: impl Into<String>) {
        self.lock().errors.push(message.into());
    }

    pub fn record_warning(&self, message: impl Into<String>) {
        self.lock().warnings.push(message.into());
    }

    /// Freeze the end time and duration. Returns `false` if already done.
    pub fn finalize(&self) -> bool {
        let mut state = self.lock();
        if state.end_time.is_some() {
            return false;
        }
        let end = Utc::now();
        state.duration = (end - self.start_time).to_std().unwrap_or(Duration::ZERO);
        state.end_time = Some(end);
        true
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.lock().end_time.is_some()
    }

    /// Zero until finalized.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.lock().duration
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.lock();
        MetricsSnapshot {
            test_name: self.test_name.clone(),
            start_time: self.start_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            end_time: state
                .end_time
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            duration_seconds: state.duration.as_secs_f64(),
            resources_created: state.resources_created,
            resources_deleted: state.resources_deleted,
            api_call_count: state.api_calls,
            error_count: state.errors.len(),
            warning_count: state.warnings.len(),
            errors: state.errors.clone(),
            warnings: state.warnings.clone(),
        }
    }

    /// One-paragraph text summary, listing errors and warnings.
    #[must_use]
    pub fn summary(&self) -> String {
        let snap = self.snapshot();
        let duration = Duration::from_millis(
            u64::try_from(self.duration().as_millis()).unwrap_or(u64::MAX),
        );
        let mut out = format!(
            "Test: {}\nDuration: {}\nResources Created: {}\nResources Deleted: {}\nAPI Calls: {}\nErrors: {}\nWarnings: {}",
            snap.test_name,
            humantime::format_duration(duration),
            snap.resources_created,
            snap.resources_deleted,
            snap.api_call_count,
            snap.error_count,
            snap.warning_count,
        );
        for e in &snap.errors {
            let _ = write!(out, "\n  error: {e}");
        }
        for w in &snap.warnings {
            let _ = write!(out, "\n  warning: {w}");
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    pub fn write_metrics_to_file(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| Error::io("create metrics directory", dir, e))?;
        }
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| Error::io("write metrics", path, e))
    }
}
