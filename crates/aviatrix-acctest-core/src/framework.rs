//! Per-test bundle of configuration, logger, metrics, and provider factory,
//! plus a driver for the Terraform apply/destroy lifecycle.
//!
//! The Terraform harness itself stays outside this crate. Tests plug it in
//! through [`LifecycleRunner`], and the provider under test is built through
//! [`ProviderFactory`], so nothing here depends on process-wide singletons.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::config::{ControllerCredentials, TestConfiguration};
use crate::credentials::Provider;
use crate::error::{Error, Result};
use crate::logger::{LoggerFactory, TestLogger, file_safe_name};
use crate::metrics::TestMetrics;
use crate::naming::ResourceNamingConfig;
use crate::precheck::{self, AcceptanceGate, PreCheckOutcome};
use crate::retry::CancellationToken;

// ── Collaborator seams ──────────────────────────────────────────────────

/// Builds the provider under test from controller credentials.
pub trait ProviderFactory {
    type Provider;

    fn build(&self, controller: &ControllerCredentials) -> Result<Self::Provider>;
}

impl<P, F> ProviderFactory for F
where
    F: Fn(&ControllerCredentials) -> Result<P>,
{
    type Provider = P;

    fn build(&self, controller: &ControllerCredentials) -> Result<P> {
        self(controller)
    }
}

/// Working directory and input variables for one Terraform module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerraformOptions {
    pub dir: PathBuf,
    pub vars: BTreeMap<String, Value>,
}

impl TerraformOptions {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            vars: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

/// External Terraform driver. Each call returns the command's output text.
pub trait LifecycleRunner {
    type Error: fmt::Display;

    fn init_and_apply(&mut self, options: &TerraformOptions) -> std::result::Result<String, Self::Error>;
    fn destroy(&mut self, options: &TerraformOptions) -> std::result::Result<String, Self::Error>;
    fn import(
        &mut self,
        options: &TerraformOptions,
        address: &str,
        id: &str,
    ) -> std::result::Result<String, Self::Error>;
    fn output(&mut self, options: &TerraformOptions, name: &str) -> std::result::Result<String, Self::Error>;
}

/// Resource counts from a Terraform summary line such as
/// `Apply complete! Resources: 3 added, 0 changed, 0 destroyed.` or
/// `Destroy complete! Resources: 3 destroyed.`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceChanges {
    pub added: u64,
    pub changed: u64,
    pub destroyed: u64,
}

impl ResourceChanges {
    /// Parse the last summary line in `output`, if any.
    #[must_use]
    pub fn parse(output: &str) -> Option<Self> {
        let line = output
            .lines()
            .rev()
            .find(|line| line.contains("complete! Resources:"))?;
        let (_, counts) = line.split_once("Resources:")?;
        let mut changes = Self::default();
        for part in counts.trim().trim_end_matches('.').split(',') {
            let mut words = part.split_whitespace();
            let (Some(count), Some(kind)) = (words.next(), words.next()) else {
                continue;
            };
            let Ok(count) = count.parse::<u64>() else {
                continue;
            };
            match kind {
                "added" | "imported" => changes.added += count,
                "changed" => changes.changed += count,
                "destroyed" => changes.destroyed += count,
                _ => {}
            }
        }
        Some(changes)
    }
}

// ── Framework ───────────────────────────────────────────────────────────

pub struct TestFramework<F: ProviderFactory> {
    test_name: String,
    config: Arc<TestConfiguration>,
    factory: F,
    logger: TestLogger,
    metrics: TestMetrics,
    naming: ResourceNamingConfig,
    gate: AcceptanceGate,
    cancel: CancellationToken,
}

impl<F: ProviderFactory> fmt::Debug for TestFramework<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestFramework")
            .field("test_name", &self.test_name)
            .field("gate", &self.gate)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

impl<F: ProviderFactory> TestFramework<F> {
    /// Open the test's logger and metrics and record run metadata.
    pub fn new(test_name: &str, config: Arc<TestConfiguration>, factory: F) -> Result<Self> {
        let logger = LoggerFactory::from_config(&config).create_logger(test_name)?;
        let enabled: Vec<String> = config
            .enabled_providers()
            .into_iter()
            .map(|p| p.as_str().to_string())
            .collect();

        logger.info("Test framework initialized");
        logger.add_metadata("test_name", test_name);
        logger.add_metadata("tf_version", config.tf_version.clone().unwrap_or_default());
        logger.add_metadata("enabled_providers", enabled);

        Ok(Self {
            test_name: test_name.to_string(),
            naming: ResourceNamingConfig::from_config(&config),
            metrics: TestMetrics::new(test_name),
            config,
            factory,
            logger,
            gate: AcceptanceGate::default(),
            cancel: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn with_gate(mut self, gate: AcceptanceGate) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    #[must_use]
    pub fn config(&self) -> &TestConfiguration {
        &self.config
    }

    #[must_use]
    pub const fn logger(&self) -> &TestLogger {
        &self.logger
    }

    #[must_use]
    pub const fn metrics(&self) -> &TestMetrics {
        &self.metrics
    }

    #[must_use]
    pub const fn naming(&self) -> &ResourceNamingConfig {
        &self.naming
    }

    /// Token that interrupts retries and waits started for this test.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Acceptance gate, then full configuration validation.
    #[must_use]
    pub fn precheck(&self) -> PreCheckOutcome {
        let gate = precheck::acceptance_gate(&self.config.tf_acc, self.gate);
        if !gate.is_run() {
            return gate;
        }
        if let Err(e) = self.config.validate() {
            self.logger.error(format_args!("Pre-check validation failed: {e}"));
            return PreCheckOutcome::Fail(format!("Test configuration validation failed: {e}"));
        }
        self.logger.info("Pre-check validation passed");
        PreCheckOutcome::Run
    }

    /// Provider block for the Aviatrix provider itself.
    #[must_use]
    pub fn configure_provider(&self) -> BTreeMap<&'static str, String> {
        let controller = &self.config.controller;
        self.logger.info(format_args!(
            "Configuring provider with controller: {}",
            controller.controller_ip
        ));
        BTreeMap::from([
            ("controller_ip", controller.controller_ip.clone()),
            ("username", controller.username.clone()),
            ("password", controller.password.clone()),
        ])
    }

    pub fn provider_config(&self, provider: Provider) -> Result<BTreeMap<&'static str, String>> {
        self.config.provider_config(provider)
    }

    pub fn build_provider(&self) -> Result<F::Provider> {
        self.factory.build(&self.config.controller).inspect_err(|e| {
            self.logger.error(format_args!("Provider factory failed: {e}"));
            self.metrics.record_error(e.to_string());
        })
    }

    /// Apply, run `body`, then destroy regardless of how the body went.
    ///
    /// A failed apply still triggers destroy, since Terraform may have
    /// created part of the module. The first error wins: apply, then body,
    /// then destroy.
    pub fn run_lifecycle<R, T>(
        &self,
        runner: &mut R,
        options: &TerraformOptions,
        body: impl FnOnce(&mut R) -> Result<T>,
    ) -> Result<T>
    where
        R: LifecycleRunner,
    {
        self.logger
            .add_metadata("terraform_dir", options.dir.display().to_string());
        let applied = self.terraform_step("apply", || runner.init_and_apply(options));
        if let Ok(output) = &applied {
            let added = ResourceChanges::parse(output).map_or(0, |c| c.added);
            for _ in 0..added {
                self.metrics.record_resource_created();
            }
        }

        let outcome = match applied {
            Ok(_) => body(runner).inspect_err(|e| {
                self.logger.error(format_args!("Test body failed: {e}"));
                self.metrics.record_error(e.to_string());
            }),
            Err(e) => Err(e),
        };

        let destroyed = self.terraform_step("destroy", || runner.destroy(options));
        if let Ok(output) = &destroyed {
            let removed = ResourceChanges::parse(output).map_or(0, |c| c.destroyed);
            for _ in 0..removed {
                self.metrics.record_resource_deleted();
            }
        }

        match (outcome, destroyed) {
            (Ok(value), Ok(_)) => Ok(value),
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
        }
    }

    pub fn import<R: LifecycleRunner>(
        &self,
        runner: &mut R,
        options: &TerraformOptions,
        address: &str,
        id: &str,
    ) -> Result<String> {
        self.logger.info(format_args!("Importing {address} as {id}"));
        self.terraform_step("import", || runner.import(options, address, id))
    }

    pub fn output<R: LifecycleRunner>(
        &self,
        runner: &mut R,
        options: &TerraformOptions,
        name: &str,
    ) -> Result<String> {
        self.terraform_step("output", || runner.output(options, name))
            .map(|raw| raw.trim().to_string())
    }

    fn terraform_step<E: fmt::Display>(
        &self,
        operation: &'static str,
        call: impl FnOnce() -> std::result::Result<String, E>,
    ) -> Result<String> {
        self.metrics.record_api_call();
        self.logger
            .log_test_step(&format!("terraform {operation}"), call)
            .map_err(|e| {
                let message = e.to_string();
                self.metrics.record_error(format!("terraform {operation}: {message}"));
                Error::Lifecycle { operation, message }
            })
    }

    /// Finalize metrics, write `{test}-metrics.json`, and close the logger.
    /// Does nothing once the logger is closed; metrics finalized earlier by
    /// the caller keep their end time.
    pub fn cleanup(&self) -> Result<()> {
        if self.logger.is_closed() {
            return Ok(());
        }
        self.metrics.finalize();
        let path = self.config.metrics_path(&file_safe_name(&self.test_name));
        let written = self.metrics.write_metrics_to_file(&path);
        match &written {
            Ok(()) => self
                .logger
                .info(format_args!("Metrics written: {}", path.display())),
            Err(e) => self.logger.error(format_args!("Failed to write metrics: {e}")),
        }
        self.logger.info(self.metrics.summary());
        let closed = self.logger.close();
        written.and(closed)
    }
}
