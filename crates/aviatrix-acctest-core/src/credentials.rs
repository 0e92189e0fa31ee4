//! Per-cloud credential rule sets and validation.
//!
//! Each [`Provider`] carries a fixed table of required and optional
//! environment variables. Validation reads an [`EnvSnapshot`], stats the
//! file-backed fields, and reports every problem it finds; it never stops at
//! the first missing variable and never retries.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::env::EnvSnapshot;
use crate::error::{Error, IssueScope, ValidationIssue};

// ── Providers ───────────────────────────────────────────────────────────

/// Cloud vendor namespace for credentials and test resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
    Gcp,
    Oci,
}

impl Provider {
    /// Every provider, in reporting order.
    pub const ALL: [Self; 4] = [Self::Aws, Self::Azure, Self::Gcp, Self::Oci];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
            Self::Oci => "oci",
        }
    }

    /// Human-facing label used in validation messages.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Aws => "AWS",
            Self::Azure => "Azure",
            Self::Gcp => "GCP",
            Self::Oci => "OCI",
        }
    }

    /// Variable that disables the provider when set to `yes`.
    #[must_use]
    pub const fn skip_var(self) -> &'static str {
        match self {
            Self::Aws => "SKIP_ACCOUNT_AWS",
            Self::Azure => "SKIP_ACCOUNT_AZURE",
            Self::Gcp => "SKIP_ACCOUNT_GCP",
            Self::Oci => "SKIP_ACCOUNT_OCI",
        }
    }

    /// Variable holding the provider's deployment region.
    #[must_use]
    pub const fn region_var(self) -> &'static str {
        match self {
            Self::Aws => "AWS_DEFAULT_REGION",
            Self::Azure => "ARM_LOCATION",
            Self::Gcp => "GOOGLE_REGION",
            Self::Oci => "OCI_REGION",
        }
    }

    #[must_use]
    pub const fn default_region(self) -> &'static str {
        match self {
            Self::Aws => "us-east-1",
            Self::Azure => "East US",
            Self::Gcp => "us-central1",
            Self::Oci => "us-ashburn-1",
        }
    }

    /// Regions acceptance tests are allowed to deploy into. The first entry
    /// is the preferred one.
    #[must_use]
    pub const fn test_regions(self) -> &'static [&'static str] {
        match self {
            Self::Aws => &["us-east-1", "us-west-1", "us-west-2", "eu-west-1", "eu-central-1"],
            Self::Azure => &["East US", "West US", "West Europe", "Southeast Asia"],
            Self::Gcp => &["us-central1", "us-west1", "us-east1", "europe-west1"],
            Self::Oci => &["us-ashburn-1", "us-phoenix-1", "eu-frankfurt-1"],
        }
    }

    /// Stable account name registered on the controller for this provider.
    #[must_use]
    pub const fn test_account_name(self) -> &'static str {
        match self {
            Self::Aws => "test-aws-account",
            Self::Azure => "test-azure-account",
            Self::Gcp => "test-gcp-account",
            Self::Oci => "test-oci-account",
        }
    }

    #[must_use]
    pub const fn rules(self) -> &'static ProviderRules {
        match self {
            Self::Aws => &AWS_RULES,
            Self::Azure => &AZURE_RULES,
            Self::Gcp => &GCP_RULES,
            Self::Oci => &OCI_RULES,
        }
    }

    /// `false` when the skip flag is exactly `yes`.
    #[must_use]
    pub fn is_enabled(self, env: &EnvSnapshot) -> bool {
        !env.is_yes(self.skip_var())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "azure" => Ok(Self::Azure),
            "gcp" => Ok(Self::Gcp),
            "oci" => Ok(Self::Oci),
            _ => Err(Error::UnknownProvider(s.to_string())),
        }
    }
}

// ── Rule tables ─────────────────────────────────────────────────────────

/// How a required variable is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCheck {
    /// Set and non-empty.
    Present,
    /// Set, non-empty, and names an existing path.
    FileExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub check: FieldCheck,
}

impl FieldRule {
    const fn present(name: &'static str) -> Self {
        Self {
            name,
            check: FieldCheck::Present,
        }
    }

    const fn file(name: &'static str) -> Self {
        Self {
            name,
            check: FieldCheck::FileExists,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalField {
    pub name: &'static str,
    pub default: Option<&'static str>,
}

impl OptionalField {
    const fn with_default(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            default: Some(default),
        }
    }

    const fn bare(name: &'static str) -> Self {
        Self {
            name,
            default: None,
        }
    }
}

/// Required and optional variables for one provider.
#[derive(Debug)]
pub struct ProviderRules {
    pub provider: Provider,
    pub required: &'static [FieldRule],
    pub optional: &'static [OptionalField],
}

static AWS_RULES: ProviderRules = ProviderRules {
    provider: Provider::Aws,
    required: &[
        FieldRule::present("AWS_ACCESS_KEY_ID"),
        FieldRule::present("AWS_SECRET_ACCESS_KEY"),
        FieldRule::present("AWS_ACCOUNT_NUMBER"),
    ],
    optional: &[
        OptionalField::with_default("AWS_DEFAULT_REGION", "us-east-1"),
        OptionalField::bare("AWS_SESSION_TOKEN"),
    ],
};

static AZURE_RULES: ProviderRules = ProviderRules {
    provider: Provider::Azure,
    required: &[
        FieldRule::present("ARM_CLIENT_ID"),
        FieldRule::present("ARM_CLIENT_SECRET"),
        FieldRule::present("ARM_SUBSCRIPTION_ID"),
        FieldRule::present("ARM_TENANT_ID"),
    ],
    optional: &[
        OptionalField::with_default("ARM_ENVIRONMENT", "public"),
        OptionalField::with_default("ARM_LOCATION", "East US"),
    ],
};

static GCP_RULES: ProviderRules = ProviderRules {
    provider: Provider::Gcp,
    required: &[
        FieldRule::file("GOOGLE_APPLICATION_CREDENTIALS"),
        FieldRule::present("GOOGLE_PROJECT"),
    ],
    optional: &[
        OptionalField::with_default("GOOGLE_REGION", "us-central1"),
        OptionalField::with_default("GOOGLE_ZONE", "us-central1-a"),
    ],
};

static OCI_RULES: ProviderRules = ProviderRules {
    provider: Provider::Oci,
    required: &[
        FieldRule::present("OCI_USER_ID"),
        FieldRule::present("OCI_TENANCY_ID"),
        FieldRule::present("OCI_FINGERPRINT"),
        FieldRule::file("OCI_PRIVATE_KEY_PATH"),
        FieldRule::present("OCI_REGION"),
    ],
    optional: &[OptionalField::bare("OCI_COMPARTMENT_ID")],
};

/// Aviatrix controller identity variables, all required.
pub const CONTROLLER_VARS: [&str; 3] = [
    "AVIATRIX_CONTROLLER_IP",
    "AVIATRIX_USERNAME",
    "AVIATRIX_PASSWORD",
];

// ── Resolved credentials ────────────────────────────────────────────────

/// Outcome of validating one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStatus {
    /// Disabled through its skip flag; nothing was checked.
    Skipped,
    Valid,
    Invalid(Vec<ValidationIssue>),
}

impl CredentialStatus {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Variables named by the issues, empty unless invalid.
    #[must_use]
    pub fn missing_variables(&self) -> Vec<&str> {
        match self {
            Self::Invalid(issues) => issues.iter().map(|i| i.variable.as_str()).collect(),
            Self::Skipped | Self::Valid => Vec::new(),
        }
    }
}

/// Resolved values for one provider's fields.
///
/// Required fields are stored as found (possibly empty); optional fields
/// carry their default when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderCredentialSet {
    pub provider: Provider,
    pub enabled: bool,
    pub values: BTreeMap<&'static str, String>,
}

impl ProviderCredentialSet {
    #[must_use]
    pub fn resolve(provider: Provider, env: &EnvSnapshot) -> Self {
        let rules = provider.rules();
        let mut values = BTreeMap::new();
        for rule in rules.required {
            values.insert(rule.name, env.get_or_empty(rule.name).to_string());
        }
        for field in rules.optional {
            let value = env
                .get(field.name)
                .or(field.default)
                .unwrap_or_default()
                .to_string();
            values.insert(field.name, value);
        }
        Self {
            provider,
            enabled: provider.is_enabled(env),
            values,
        }
    }

    /// Resolved value, or `""` when the field is unknown or unset.
    #[must_use]
    pub fn get(&self, name: &str) -> &str {
        self.values.get(name).map_or("", String::as_str)
    }

    /// Region field for this provider.
    #[must_use]
    pub fn region(&self) -> &str {
        self.get(self.provider.region_var())
    }

    /// Check the required fields. Disabled sets never produce issues.
    #[must_use]
    pub fn issues(&self) -> Vec<ValidationIssue> {
        if !self.enabled {
            return Vec::new();
        }
        let scope = IssueScope::Provider(self.provider);
        self.provider
            .rules()
            .required
            .iter()
            .filter_map(|rule| {
                let value = self.get(rule.name);
                if value.is_empty() {
                    return Some(ValidationIssue::missing(scope, rule.name));
                }
                if rule.check == FieldCheck::FileExists && !Path::new(value).exists() {
                    return Some(ValidationIssue::file_not_found(scope, rule.name, value));
                }
                None
            })
            .collect()
    }

    #[must_use]
    pub fn status(&self) -> CredentialStatus {
        if !self.enabled {
            return CredentialStatus::Skipped;
        }
        let issues = self.issues();
        if issues.is_empty() {
            CredentialStatus::Valid
        } else {
            CredentialStatus::Invalid(issues)
        }
    }
}

/// Validate one provider straight from the snapshot, with no fallbacks.
#[must_use]
pub fn validate_provider(provider: Provider, env: &EnvSnapshot) -> CredentialStatus {
    ProviderCredentialSet::resolve(provider, env).status()
}

/// Check the controller identity variables.
#[must_use]
pub fn validate_controller(env: &EnvSnapshot) -> Vec<ValidationIssue> {
    CONTROLLER_VARS
        .iter()
        .filter(|name| env.get(name).is_none())
        .map(|name| ValidationIssue::missing(IssueScope::Controller, name))
        .collect()
}

/// Providers whose skip flag is not `yes`, in reporting order.
#[must_use]
pub fn enabled_providers(env: &EnvSnapshot) -> Vec<Provider> {
    Provider::ALL
        .into_iter()
        .filter(|p| p.is_enabled(env))
        .collect()
}

// ── Masked summary ──────────────────────────────────────────────────────

/// Mask a credential for display.
///
/// Empty values render as `[NOT SET]`, values of up to eight characters as
/// `****`, and longer values keep their last four characters.
#[must_use]
pub fn mask_value(value: &str) -> String {
    if value.is_empty() {
        return "[NOT SET]".to_string();
    }
    let char_count = value.chars().count();
    if char_count <= 8 {
        "****".to_string()
    } else {
        let suffix_rev: String = value.chars().rev().take(4).collect();
        let suffix: String = suffix_rev.chars().rev().collect();
        format!("****{suffix}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderSummary {
    pub provider: Provider,
    pub enabled: bool,
    /// Required variables with masked values; empty when skipped.
    pub fields: Vec<(String, String)>,
}

/// Masked view of every credential the validators look at.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSummary {
    pub controller: Vec<(String, String)>,
    pub providers: Vec<ProviderSummary>,
}

#[must_use]
pub fn credentials_summary(env: &EnvSnapshot) -> CredentialSummary {
    let controller = CONTROLLER_VARS
        .iter()
        .map(|name| ((*name).to_string(), mask_value(env.get_or_empty(name))))
        .collect();
    let providers = Provider::ALL
        .into_iter()
        .map(|provider| {
            let enabled = provider.is_enabled(env);
            let fields = if enabled {
                provider
                    .rules()
                    .required
                    .iter()
                    .map(|rule| (rule.name.to_string(), mask_value(env.get_or_empty(rule.name))))
                    .collect()
            } else {
                Vec::new()
            };
            ProviderSummary {
                provider,
                enabled,
                fields,
            }
        })
        .collect();
    CredentialSummary {
        controller,
        providers,
    }
}

impl fmt::Display for CredentialSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Credential Configuration Summary ===")?;
        writeln!(f, "\nAviatrix Controller:")?;
        for (name, masked) in &self.controller {
            writeln!(f, "  {name}: {masked}")?;
        }
        for summary in &self.providers {
            writeln!(f, "\n{}:", summary.provider.display_name())?;
            if !summary.enabled {
                writeln!(f, "  [SKIPPED]")?;
                continue;
            }
            for (name, masked) in &summary.fields {
                writeln!(f, "  {name}: {masked}")?;
            }
        }
        Ok(())
    }
}
