//! Error types for the acceptance-test support crate.
//!
//! Configuration problems are aggregated into a [`ValidationReport`] so a
//! single failing run reports everything wrong at once. Filesystem problems
//! surface immediately with the offending path attached.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::credentials::Provider;

/// Result type alias for acceptance-test helpers.
pub type Result<T> = std::result::Result<T, Error>;

/// Where a validation issue was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueScope {
    /// Aviatrix controller identity.
    Controller,
    /// A cloud provider credential set.
    Provider(Provider),
    /// Cross-cutting rules (e.g. "at least one provider").
    Global,
}

/// What is wrong with a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// Required variable is unset or empty.
    Missing,
    /// Variable names a file that does not exist.
    FileNotFound(PathBuf),
    /// Every provider is disabled through its skip flag.
    NoProviderEnabled,
}

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub scope: IssueScope,
    /// Environment variable the issue is about (empty for global issues).
    pub variable: String,
    pub kind: IssueKind,
}

impl ValidationIssue {
    #[must_use]
    pub fn missing(scope: IssueScope, variable: &str) -> Self {
        Self {
            scope,
            variable: variable.to_string(),
            kind: IssueKind::Missing,
        }
    }

    #[must_use]
    pub fn file_not_found(scope: IssueScope, variable: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            scope,
            variable: variable.to_string(),
            kind: IssueKind::FileNotFound(path.into()),
        }
    }

    #[must_use]
    pub const fn no_provider_enabled() -> Self {
        Self {
            scope: IssueScope::Global,
            variable: String::new(),
            kind: IssueKind::NoProviderEnabled,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let IssueScope::Provider(provider) = self.scope {
            write!(f, "{}: ", provider.display_name())?;
        }
        match &self.kind {
            IssueKind::Missing => write!(f, "{} is required", self.variable),
            IssueKind::FileNotFound(path) => {
                write!(f, "{} file not found: {}", self.variable, path.display())
            }
            IssueKind::NoProviderEnabled => f.write_str("at least one cloud provider must be enabled"),
        }
    }
}

/// Every issue found by one validation pass, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        self.issues.extend(issues);
    }

    /// Variable names mentioned by the report, in order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|issue| !issue.variable.is_empty())
            .map(|issue| issue.variable.as_str())
            .collect()
    }

    /// `Ok(())` when empty, otherwise the report as an error.
    pub fn into_result(self) -> std::result::Result<(), ConfigError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("configuration validation failed:")?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

/// Errors raised while loading the test configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Validation(ValidationReport),

    #[error("failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// The aggregated report, when this is a validation failure.
    #[must_use]
    pub const fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Validation(report) => Some(report),
            Self::EnvFile { .. } => None,
        }
    }
}

/// Main error type for the acceptance-test helpers.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown cloud provider: {0}")]
    UnknownProvider(String),

    #[error("{} provider is not enabled", .0.display_name())]
    ProviderDisabled(Provider),

    #[error("invalid artifact name: {0}")]
    InvalidArtifactName(String),

    #[error("logger for {0} is closed")]
    LoggerClosed(String),

    #[error("provider factory failed: {0}")]
    ProviderFactory(String),

    #[error("terraform {operation} failed: {message}")]
    Lifecycle {
        operation: &'static str,
        message: String,
    },
}

impl Error {
    /// Wrap an I/O error with the action and path that produced it.
    #[must_use]
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
