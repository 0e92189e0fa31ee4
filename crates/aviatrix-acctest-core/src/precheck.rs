//! Pre-test gates: decide whether a test body runs, is skipped, or fails.

use std::fmt;

use crate::credentials::{self, CredentialStatus, Provider};
use crate::env::EnvSnapshot;

/// How `TF_ACC` switches acceptance tests on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AcceptanceGate {
    /// Any non-empty value.
    #[default]
    Lenient,
    /// Exactly `"1"`.
    Strict,
}

impl AcceptanceGate {
    #[must_use]
    pub fn allows(self, tf_acc: &str) -> bool {
        match self {
            Self::Lenient => !tf_acc.is_empty(),
            Self::Strict => tf_acc == "1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreCheckOutcome {
    Run,
    Skip(String),
    Fail(String),
}

impl PreCheckOutcome {
    #[must_use]
    pub const fn is_run(&self) -> bool {
        matches!(self, Self::Run)
    }

    /// Returns `true` when the test body should run, `false` to skip.
    ///
    /// # Panics
    /// On `Fail`, which is how a test is marked failed.
    #[must_use]
    pub fn enforce(self) -> bool {
        match self {
            Self::Run => true,
            Self::Skip(reason) => {
                tracing::info!(%reason, "skipping test");
                false
            }
            Self::Fail(reason) => panic!("pre-check failed: {reason}"),
        }
    }
}

impl fmt::Display for PreCheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => f.write_str("run"),
            Self::Skip(reason) => write!(f, "skip: {reason}"),
            Self::Fail(reason) => write!(f, "fail: {reason}"),
        }
    }
}

/// First outcome that is not `Run`, in order.
pub fn compose(checks: impl IntoIterator<Item = PreCheckOutcome>) -> PreCheckOutcome {
    checks
        .into_iter()
        .find(|outcome| !outcome.is_run())
        .unwrap_or(PreCheckOutcome::Run)
}

#[must_use]
pub fn acceptance_precheck(env: &EnvSnapshot, gate: AcceptanceGate) -> PreCheckOutcome {
    acceptance_gate(env.get_or_empty("TF_ACC"), gate)
}

pub(crate) fn acceptance_gate(tf_acc: &str, gate: AcceptanceGate) -> PreCheckOutcome {
    if gate.allows(tf_acc) {
        PreCheckOutcome::Run
    } else {
        PreCheckOutcome::Skip("Skipping acceptance test (TF_ACC not set)".to_string())
    }
}

/// Fails when any controller identity variable is missing.
#[must_use]
pub fn controller_precheck(env: &EnvSnapshot) -> PreCheckOutcome {
    let missing: Vec<String> = credentials::validate_controller(env)
        .into_iter()
        .map(|issue| issue.variable)
        .collect();
    if missing.is_empty() {
        PreCheckOutcome::Run
    } else {
        PreCheckOutcome::Fail(format!(
            "{} must be set for acceptance tests",
            missing.join(", ")
        ))
    }
}

/// Skips a disabled provider; fails with every credential problem otherwise.
#[must_use]
pub fn provider_precheck(provider: Provider, env: &EnvSnapshot) -> PreCheckOutcome {
    match credentials::validate_provider(provider, env) {
        CredentialStatus::Valid => PreCheckOutcome::Run,
        CredentialStatus::Skipped => PreCheckOutcome::Skip(format!(
            "Skipping {} tests as {} is set",
            provider.display_name(),
            provider.skip_var()
        )),
        CredentialStatus::Invalid(issues) => PreCheckOutcome::Fail(
            issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        ),
    }
}

#[must_use]
pub fn skip_if_no_cloud_provider(env: &EnvSnapshot) -> PreCheckOutcome {
    if credentials::enabled_providers(env).is_empty() {
        PreCheckOutcome::Skip("Skipping test: no cloud providers are configured".to_string())
    } else {
        PreCheckOutcome::Run
    }
}

#[must_use]
pub fn require_env_vars(env: &EnvSnapshot, vars: &[&str]) -> PreCheckOutcome {
    let missing: Vec<&str> = vars
        .iter()
        .copied()
        .filter(|var| env.get(var).is_none())
        .collect();
    match missing.as_slice() {
        [] => PreCheckOutcome::Run,
        [one] => PreCheckOutcome::Fail(format!("Required environment variable {one} is not set")),
        many => PreCheckOutcome::Fail(format!(
            "Required environment variables are not set: {}",
            many.join(", ")
        )),
    }
}

#[must_use]
pub fn skip_if_env_set(env: &EnvSnapshot, var: &str) -> PreCheckOutcome {
    if env.get(var).is_some() {
        PreCheckOutcome::Skip(format!("Skipping test because {var} is set"))
    } else {
        PreCheckOutcome::Run
    }
}
