//! Resource-name synthesis for test resources.
//!
//! [`ResourceNamingConfig::generate_name`] produces
//! `{prefix}-{type}-{%Y%m%d-%H%M%S}[-{suffix}]`. The timestamp is captured
//! once at construction, so two names for the same resource type from the
//! same config (or from configs built within the same second) are
//! identical. Callers that need distinct names within a second should use a
//! suffix or the random helpers below.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Local;

use crate::config::{DEFAULT_RESOURCE_PREFIX, TestConfiguration};
use crate::credentials::Provider;
use crate::env::EnvSnapshot;

pub const NAME_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

// ── Naming config ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNamingConfig {
    pub prefix: String,
    pub suffix: Option<String>,
    pub timestamp: String,
}

impl ResourceNamingConfig {
    /// Stamp with the current local time.
    #[must_use]
    pub fn new(prefix: impl Into<String>, suffix: Option<String>) -> Self {
        Self::with_timestamp(prefix, suffix, Local::now().format(NAME_STAMP_FORMAT).to_string())
    }

    #[must_use]
    pub fn with_timestamp(
        prefix: impl Into<String>,
        suffix: Option<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.filter(|s| !s.is_empty()),
            timestamp: timestamp.into(),
        }
    }

    /// `TEST_RESOURCE_PREFIX` (default `tf-test`) and `TEST_RESOURCE_SUFFIX`.
    #[must_use]
    pub fn from_env(env: &EnvSnapshot) -> Self {
        Self::new(
            env.string_or("TEST_RESOURCE_PREFIX", DEFAULT_RESOURCE_PREFIX),
            env.get("TEST_RESOURCE_SUFFIX").map(str::to_string),
        )
    }

    #[must_use]
    pub fn from_config(config: &TestConfiguration) -> Self {
        Self::new(config.resource_prefix.clone(), config.resource_suffix.clone())
    }

    #[must_use]
    pub fn generate_name(&self, resource_type: &str) -> String {
        match &self.suffix {
            Some(suffix) => format!(
                "{}-{resource_type}-{}-{suffix}",
                self.prefix, self.timestamp
            ),
            None => format!("{}-{resource_type}-{}", self.prefix, self.timestamp),
        }
    }
}

// ── Random helpers ──────────────────────────────────────────────────────

/// Eight bytes from the OS. If that fails, the clock mixed with a counter,
/// which is enough to keep names apart.
fn os_random_u64() -> u64 {
    static FALLBACK: AtomicU64 = AtomicU64::new(0);
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_ok() {
        return u64::from_le_bytes(bytes);
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));
    nanos ^ FALLBACK.fetch_add(0x9e37_79b9_7f4a_7c15, Ordering::Relaxed)
}

/// Unbiased draw in `[0, bound)`; 0 when `bound == 0`.
fn random_below(bound: u64) -> u64 {
    if bound == 0 {
        return 0;
    }
    let zone = u64::MAX - u64::MAX % bound;
    loop {
        let draw = os_random_u64();
        if draw < zone {
            return draw % bound;
        }
    }
}

fn random_index(len: usize) -> usize {
    usize::try_from(random_below(len as u64)).unwrap_or(0)
}

/// Lowercase alphanumeric string of `len` characters.
#[must_use]
pub fn random_string(len: usize) -> String {
    (0..len)
        .map(|_| char::from(CHARSET[random_index(CHARSET.len())]))
        .collect()
}

/// Uniform integer in `[min, max]`. Bounds are swapped if reversed.
#[must_use]
pub fn random_int(min: i64, max: i64) -> i64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let span = hi.abs_diff(lo).saturating_add(1);
    let offset = random_below(span);
    lo.wrapping_add_unsigned(offset)
}

fn random_octet() -> u8 {
    u8::try_from(random_int(0, 255)).unwrap_or(0)
}

/// `{prefix}-{8 random chars}`.
#[must_use]
pub fn generate_test_resource_name(prefix: &str) -> String {
    format!("{prefix}-{}", random_string(8))
}

/// Random `10.x.y.0/24` block.
#[must_use]
pub fn generate_cidr() -> String {
    format!("10.{}.{}.0/24", random_octet(), random_octet())
}

/// Random `10.x.0.0/16` block.
#[must_use]
pub fn generate_vpc_cidr() -> String {
    format!("10.{}.0.0/16", random_octet())
}

/// Preferred test region for the provider.
#[must_use]
pub fn test_region(provider: Provider) -> &'static str {
    provider.test_regions().first().copied().unwrap_or("us-east-1")
}

#[must_use]
pub fn random_test_region(provider: Provider) -> &'static str {
    let regions = provider.test_regions();
    if regions.is_empty() {
        return "us-east-1";
    }
    regions[random_index(regions.len())]
}

#[must_use]
pub const fn test_account_name(provider: Provider) -> &'static str {
    provider.test_account_name()
}

/// `test-{provider}-vpc-{8 random chars}`.
#[must_use]
pub fn test_vpc_name(provider: Provider) -> String {
    generate_test_resource_name(&format!("test-{provider}-vpc"))
}

/// `test-{provider}-gw-{8 random chars}`.
#[must_use]
pub fn test_gateway_name(provider: Provider) -> String {
    generate_test_resource_name(&format!("test-{provider}-gw"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn name_without_suffix() {
        let cfg = ResourceNamingConfig::with_timestamp("tf-test", None, "20260101-120000");
        assert_eq!(cfg.generate_name("gateway"), "tf-test-gateway-20260101-120000");
    }

    #[test]
    fn name_with_suffix() {
        let cfg = ResourceNamingConfig::with_timestamp(
            "tf-test",
            Some("ci42".to_string()),
            "20260101-120000",
        );
        assert_eq!(cfg.generate_name("vpc"), "tf-test-vpc-20260101-120000-ci42");
    }

    #[test]
    fn empty_suffix_is_dropped() {
        let cfg = ResourceNamingConfig::with_timestamp("p", Some(String::new()), "ts");
        assert_eq!(cfg.generate_name("x"), "p-x-ts");
    }

    #[test]
    fn same_config_same_type_collides() {
        // Names only differ by second; repeated calls on one config collide.
        let cfg = ResourceNamingConfig::new("tf-test", None);
        assert_eq!(cfg.generate_name("gateway"), cfg.generate_name("gateway"));
    }

    #[test]
    fn from_env_reads_prefix_and_suffix() {
        let env = EnvSnapshot::from_pairs([
            ("TEST_RESOURCE_PREFIX", "nightly"),
            ("TEST_RESOURCE_SUFFIX", "b7"),
        ]);
        let cfg = ResourceNamingConfig::from_env(&env);
        assert_eq!(cfg.prefix, "nightly");
        assert_eq!(cfg.suffix.as_deref(), Some("b7"));
        assert_eq!(cfg.timestamp.len(), 15);
        let default = ResourceNamingConfig::from_env(&EnvSnapshot::default());
        assert_eq!(default.prefix, "tf-test");
        assert_eq!(default.suffix, None);
    }

    #[test]
    fn random_below_degenerate_bounds() {
        assert_eq!(random_below(0), 0);
        assert_eq!(random_below(1), 0);
        assert!(random_below(u64::MAX) < u64::MAX);
    }

    #[test]
    fn random_int_covers_small_range() {
        let mut seen = [false; 3];
        for _ in 0..500 {
            let v = random_int(-1, 1);
            seen[usize::try_from(v + 1).unwrap()] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn regions_and_accounts() {
        assert_eq!(test_region(Provider::Gcp), "us-central1");
        assert!(Provider::Oci.test_regions().contains(&random_test_region(Provider::Oci)));
        assert_eq!(test_account_name(Provider::Azure), "test-azure-account");
        assert!(test_vpc_name(Provider::Aws).starts_with("test-aws-vpc-"));
        assert!(test_gateway_name(Provider::Oci).starts_with("test-oci-gw-"));
    }

    #[test]
    fn cidrs_are_well_formed() {
        for _ in 0..100 {
            let cidr = generate_cidr();
            let (addr, mask) = cidr.split_once('/').unwrap();
            assert_eq!(mask, "24");
            let octets: Vec<u8> = addr.split('.').map(|o| o.parse().unwrap()).collect();
            assert_eq!(octets.len(), 4);
            assert_eq!(octets[0], 10);
            assert_eq!(octets[3], 0);

            let vpc = generate_vpc_cidr();
            assert!(vpc.starts_with("10.") && vpc.ends_with(".0.0/16"));
        }
    }

    proptest! {
        #[test]
        fn random_string_has_requested_length_and_charset(len in 0usize..64) {
            let s = random_string(len);
            prop_assert_eq!(s.len(), len);
            prop_assert!(s.bytes().all(|b| CHARSET.contains(&b)));
        }

        #[test]
        fn random_int_stays_in_range(a in -1000i64..1000, b in -1000i64..1000) {
            let v = random_int(a, b);
            prop_assert!(v >= a.min(b) && v <= a.max(b));
        }

        #[test]
        fn resource_names_keep_prefix(prefix in "[a-z][a-z0-9-]{0,15}") {
            let name = generate_test_resource_name(&prefix);
            let expected_prefix = format!("{prefix}-");
            prop_assert!(name.starts_with(&expected_prefix));
            prop_assert_eq!(name.len(), prefix.len() + 9);
        }
    }
}
