//! Support library for Aviatrix Terraform provider acceptance tests
//!
//! This crate provides:
//! - Environment snapshots and `.env` overlays (`EnvSnapshot`)
//! - Per-provider credential rules, validation, and masked summaries
//! - Aggregated test configuration (`TestConfiguration`)
//! - JSON-lines test logging with artifacts and reports (`TestLogger`)
//! - Per-test metrics, resource naming, retries, and state waits
//! - Pre-check gates and a per-test framework around the Terraform lifecycle

#![forbid(unsafe_code)]

pub mod config;
pub mod credentials;
pub mod env;
pub mod error;
pub mod framework;
pub mod logger;
pub mod metrics;
pub mod naming;
pub mod precheck;
pub mod retry;
pub mod telemetry;
pub mod wait;

// Re-export key types for convenience
pub use config::{CloudTestDefaults, ControllerCredentials, TestConfiguration, Timeouts};
pub use credentials::{
    CredentialStatus, CredentialSummary, Provider, ProviderCredentialSet, credentials_summary,
    enabled_providers, mask_value, validate_controller, validate_provider,
};
pub use env::EnvSnapshot;
pub use error::{ConfigError, Error, Result, ValidationIssue, ValidationReport};
pub use framework::{
    LifecycleRunner, ProviderFactory, ResourceChanges, TerraformOptions, TestFramework,
};
pub use logger::{LogEntry, LogLevel, LoggerFactory, LoggerOptions, TestLogger, TestReport};
pub use metrics::{MetricsSnapshot, TestMetrics};
pub use naming::ResourceNamingConfig;
pub use precheck::{AcceptanceGate, PreCheckOutcome};
pub use retry::{CancellationToken, RetryError, RetryPolicy, retry, retry_check};
pub use telemetry::init_tracing;
pub use wait::{StateWaiter, WaitError};
