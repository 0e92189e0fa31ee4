//! Test-run configuration assembled from an [`EnvSnapshot`].
//!
//! [`TestConfiguration::load`] resolves controller credentials, every
//! provider's credential set, timeouts, feature flags, and artifact paths in
//! one pass, then validates the result. Validation reports every issue it
//! finds. Malformed booleans, integers, and durations fall back to their
//! defaults instead of failing the load.
//!
//! The resulting value is meant to be built once per test process and shared
//! behind an `Arc`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::credentials::{self, Provider, ProviderCredentialSet};
use crate::env::EnvSnapshot;
use crate::error::{ConfigError, Error, IssueScope, Result, ValidationIssue, ValidationReport};

// ── Defaults ────────────────────────────────────────────────────────────

pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_ARTIFACT_DIR: &str = "./test-results";
pub const DEFAULT_DATA_DIR: &str = "./test-data";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_RESOURCE_PREFIX: &str = "tf-test";

/// Region fallbacks applied before validation.
pub const REGION_FALLBACKS: [(&str, &str); 4] = [
    ("AWS_DEFAULT_REGION", "us-east-1"),
    ("ARM_LOCATION", "East US"),
    ("GOOGLE_REGION", "us-central1"),
    ("OCI_REGION", "us-ashburn-1"),
];

/// Fixed per-operation timeouts handed to the Terraform harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timeouts {
    pub default: Duration,
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
    pub retry: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(30 * 60),
            create: Duration::from_secs(20 * 60),
            update: Duration::from_secs(15 * 60),
            delete: Duration::from_secs(20 * 60),
            retry: Duration::from_secs(5 * 60),
        }
    }
}

/// Aviatrix controller endpoint and login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerCredentials {
    pub controller_ip: String,
    pub username: String,
    pub password: String,
}

impl ControllerCredentials {
    #[must_use]
    pub fn resolve(env: &EnvSnapshot) -> Self {
        let [controller_ip, username, password] =
            credentials::CONTROLLER_VARS.map(|name| env.get_or_empty(name).to_string());
        Self {
            controller_ip,
            username,
            password,
        }
    }

    #[must_use]
    pub fn issues(&self) -> Vec<ValidationIssue> {
        let values = [&self.controller_ip, &self.username, &self.password];
        credentials::CONTROLLER_VARS
            .into_iter()
            .zip(values)
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| ValidationIssue::missing(IssueScope::Controller, name))
            .collect()
    }
}

/// Network and sizing defaults used when a test provisions cloud resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudTestDefaults {
    pub region: String,
    /// VPC / VNet / VCN block.
    pub network_cidr: String,
    pub subnet_cidr: String,
    /// Instance type, VM size, machine type, or shape.
    pub instance_size: String,
}

impl CloudTestDefaults {
    #[must_use]
    pub fn resolve(provider: Provider, env: &EnvSnapshot) -> Self {
        let (vars, defaults) = match provider {
            Provider::Aws => (
                ["AWS_TEST_REGION", "AWS_TEST_VPC_CIDR", "AWS_TEST_SUBNET_CIDR", "AWS_TEST_INSTANCE_TYPE"],
                ["us-east-1", "10.0.0.0/16", "10.0.1.0/24", "t3.medium"],
            ),
            Provider::Azure => (
                ["AZURE_TEST_REGION", "AZURE_TEST_VNET_CIDR", "AZURE_TEST_SUBNET_CIDR", "AZURE_TEST_VM_SIZE"],
                ["East US", "10.1.0.0/16", "10.1.1.0/24", "Standard_B2s"],
            ),
            Provider::Gcp => (
                ["GCP_TEST_REGION", "GCP_TEST_VPC_CIDR", "GCP_TEST_SUBNET_CIDR", "GCP_TEST_MACHINE_TYPE"],
                ["us-central1", "10.2.0.0/16", "10.2.1.0/24", "n1-standard-2"],
            ),
            Provider::Oci => (
                ["OCI_TEST_REGION", "OCI_TEST_VCN_CIDR", "OCI_TEST_SUBNET_CIDR", "OCI_TEST_INSTANCE_SHAPE"],
                ["us-ashburn-1", "10.3.0.0/16", "10.3.1.0/24", "VM.Standard2.1"],
            ),
        };
        Self {
            region: env.string_or(vars[0], defaults[0]),
            network_cidr: env.string_or(vars[1], defaults[1]),
            subnet_cidr: env.string_or(vars[2], defaults[2]),
            instance_size: env.string_or(vars[3], defaults[3]),
        }
    }
}

// ── TestConfiguration ───────────────────────────────────────────────────

/// Immutable snapshot of everything a test run needs.
#[derive(Debug, Clone)]
pub struct TestConfiguration {
    pub controller: ControllerCredentials,
    pub providers: BTreeMap<Provider, ProviderCredentialSet>,
    pub cloud_defaults: BTreeMap<Provider, CloudTestDefaults>,

    pub test_timeout: Duration,
    pub timeouts: Timeouts,
    pub max_retries: u32,
    pub retry_delay: Duration,

    pub artifact_dir: PathBuf,
    pub data_dir: PathBuf,

    pub enable_parallel: bool,
    pub enable_detailed_logs: bool,
    pub enable_screenshots: bool,

    pub resource_prefix: String,
    pub resource_suffix: Option<String>,

    /// Raw `TF_ACC` value; gates are applied by the pre-checks.
    pub tf_acc: String,
    pub tf_version: Option<String>,
}

impl TestConfiguration {
    /// Resolve and validate.
    ///
    /// Region fallbacks are applied first, so an unset region never counts
    /// as missing here.
    pub fn load(env: &EnvSnapshot) -> std::result::Result<Self, ConfigError> {
        let config = Self::resolve(env);
        config.validate()?;
        tracing::debug!(
            providers = ?config.enabled_providers(),
            artifact_dir = %config.artifact_dir.display(),
            "test configuration loaded"
        );
        Ok(config)
    }

    /// Resolve every field without validating.
    #[must_use]
    pub fn resolve(env: &EnvSnapshot) -> Self {
        let env = env.clone().with_fallbacks(REGION_FALLBACKS);
        let providers = Provider::ALL
            .into_iter()
            .map(|p| (p, ProviderCredentialSet::resolve(p, &env)))
            .collect();
        let cloud_defaults = Provider::ALL
            .into_iter()
            .map(|p| (p, CloudTestDefaults::resolve(p, &env)))
            .collect();

        Self {
            controller: ControllerCredentials::resolve(&env),
            providers,
            cloud_defaults,
            test_timeout: env.duration_or("GO_TEST_TIMEOUT", DEFAULT_TEST_TIMEOUT),
            timeouts: Timeouts::default(),
            max_retries: env.int_or("TEST_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            retry_delay: DEFAULT_RETRY_DELAY,
            artifact_dir: PathBuf::from(env.string_or("TEST_ARTIFACT_DIR", DEFAULT_ARTIFACT_DIR)),
            data_dir: PathBuf::from(env.string_or("TEST_DATA_DIR", DEFAULT_DATA_DIR)),
            enable_parallel: env.bool_or("ENABLE_PARALLEL_TESTS", true),
            enable_detailed_logs: env.bool_or("ENABLE_DETAILED_LOGS", false),
            enable_screenshots: env.bool_or("ENABLE_SCREENSHOTS", false),
            resource_prefix: env.string_or("TEST_RESOURCE_PREFIX", DEFAULT_RESOURCE_PREFIX),
            resource_suffix: env.get("TEST_RESOURCE_SUFFIX").map(str::to_string),
            tf_acc: env.get_or_empty("TF_ACC").to_string(),
            tf_version: env.get("TF_VERSION").map(str::to_string),
        }
    }

    /// Every issue across the controller and all enabled providers.
    #[must_use]
    pub fn validation_report(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        report.extend(self.controller.issues());
        for set in self.providers.values() {
            report.extend(set.issues());
        }
        if self.enabled_providers().is_empty() {
            report.push(ValidationIssue::no_provider_enabled());
        }
        report
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.validation_report().into_result()
    }

    #[must_use]
    pub fn enabled_providers(&self) -> Vec<Provider> {
        self.providers
            .values()
            .filter(|set| set.enabled)
            .map(|set| set.provider)
            .collect()
    }

    /// Case-insensitive lookup; unknown names are never enabled.
    #[must_use]
    pub fn is_provider_enabled(&self, name: &str) -> bool {
        name.parse::<Provider>()
            .ok()
            .and_then(|p| self.providers.get(&p))
            .is_some_and(|set| set.enabled)
    }

    #[must_use]
    pub fn provider(&self, provider: Provider) -> Option<&ProviderCredentialSet> {
        self.providers.get(&provider)
    }

    #[must_use]
    pub fn cloud_defaults(&self, provider: Provider) -> Option<&CloudTestDefaults> {
        self.cloud_defaults.get(&provider)
    }

    /// Terraform provider block values for one cloud.
    ///
    /// # Errors
    /// [`Error::ProviderDisabled`] when the provider is skipped.
    pub fn provider_config(&self, provider: Provider) -> Result<BTreeMap<&'static str, String>> {
        let set = self
            .providers
            .get(&provider)
            .filter(|set| set.enabled)
            .ok_or(Error::ProviderDisabled(provider))?;
        let pairs: &[(&'static str, &str)] = match provider {
            Provider::Aws => &[
                ("access_key", "AWS_ACCESS_KEY_ID"),
                ("secret_key", "AWS_SECRET_ACCESS_KEY"),
                ("region", "AWS_DEFAULT_REGION"),
            ],
            Provider::Azure => &[
                ("client_id", "ARM_CLIENT_ID"),
                ("client_secret", "ARM_CLIENT_SECRET"),
                ("subscription_id", "ARM_SUBSCRIPTION_ID"),
                ("tenant_id", "ARM_TENANT_ID"),
            ],
            Provider::Gcp => &[
                ("credentials", "GOOGLE_APPLICATION_CREDENTIALS"),
                ("project", "GOOGLE_PROJECT"),
                ("region", "GOOGLE_REGION"),
            ],
            Provider::Oci => &[
                ("user_id", "OCI_USER_ID"),
                ("tenancy_id", "OCI_TENANCY_ID"),
                ("fingerprint", "OCI_FINGERPRINT"),
                ("private_key_path", "OCI_PRIVATE_KEY_PATH"),
                ("region", "OCI_REGION"),
            ],
        };
        Ok(pairs
            .iter()
            .map(|(key, var)| (*key, set.get(var).to_string()))
            .collect())
    }

    // ── Paths ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.artifact_dir.join("logs")
    }

    #[must_use]
    pub fn screenshots_dir(&self) -> PathBuf {
        self.artifact_dir.join("screenshots")
    }

    /// `logs/{test}-{stamp}.log`, where `stamp` is `%Y%m%d-%H%M%S`.
    #[must_use]
    pub fn log_path(&self, test_name: &str, stamp: &str) -> PathBuf {
        log_file_path(&self.artifact_dir, test_name, stamp)
    }

    #[must_use]
    pub fn screenshot_path(&self, test_name: &str, step: u32, stamp: &str) -> PathBuf {
        self.screenshots_dir()
            .join(format!("{test_name}-step{step}-{stamp}.png"))
    }

    #[must_use]
    pub fn report_path(&self, test_name: &str) -> PathBuf {
        report_file_path(&self.artifact_dir, test_name)
    }

    #[must_use]
    pub fn metrics_path(&self, test_name: &str) -> PathBuf {
        self.artifact_dir.join(format!("{test_name}-metrics.json"))
    }

    /// Create the artifact, logs, screenshots, and test-data directories.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.artifact_dir.clone(),
            self.logs_dir(),
            self.screenshots_dir(),
            self.data_dir.clone(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| Error::io("create directory", &dir, e))?;
        }
        Ok(())
    }

    /// Human-readable overview. Secrets are masked.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Test Configuration Summary ===");
        let _ = writeln!(out, "Controller IP: {}", self.controller.controller_ip);
        let _ = writeln!(out, "Username: {}", self.controller.username);
        let _ = writeln!(out, "Password: {}", credentials::mask_value(&self.controller.password));
        let _ = writeln!(out, "Test Timeout: {}", humantime::format_duration(self.test_timeout));
        let _ = writeln!(out, "Max Retries: {}", self.max_retries);
        let _ = writeln!(out, "Artifact Dir: {}", self.artifact_dir.display());
        let _ = writeln!(out, "Parallel Tests: {}", self.enable_parallel);
        let _ = writeln!(out, "Detailed Logs: {}", self.enable_detailed_logs);
        let _ = writeln!(out, "Screenshots: {}", self.enable_screenshots);
        let _ = writeln!(out, "\n=== Cloud Providers ===");
        for set in self.providers.values() {
            let mark = if set.enabled { "enabled " } else { "skipped " };
            let _ = writeln!(
                out,
                "  {mark}{} ({})",
                set.provider.display_name(),
                set.region()
            );
        }
        out
    }
}

pub(crate) fn log_file_path(artifact_dir: &Path, test_name: &str, stamp: &str) -> PathBuf {
    artifact_dir
        .join("logs")
        .join(format!("{test_name}-{stamp}.log"))
}

pub(crate) fn report_file_path(artifact_dir: &Path, test_name: &str) -> PathBuf {
    artifact_dir.join(format!("{test_name}-report.json"))
}
