//! Declared-state model for bucket replication
//!
//! These records describe what the caller wants the cluster to hold: an
//! ordered list of replication rules, each bound to exactly one remote
//! target. `identity` and `arn` are computed fields, empty until the first
//! apply assigns them, then carried forward by the caller so later applies
//! edit in place instead of re-creating rules.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Path Style
// =============================================================================

/// Addressing style used when the cluster talks to the target endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    On,
    Off,
    #[default]
    Auto,
}

impl PathStyle {
    /// Parse the wire form, case-insensitively. Unknown text maps to `None`;
    /// callers decide whether that warrants a warning or a default.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "on" => Some(PathStyle::On),
            "off" => Some(PathStyle::Off),
            "auto" | "" => Some(PathStyle::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PathStyle::On => "on",
            PathStyle::Off => "off",
            PathStyle::Auto => "auto",
        }
    }
}

impl std::fmt::Display for PathStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Declared Records
// =============================================================================

/// The remote bucket a rule replicates into, including how to reach it.
///
/// `secret_key` is write-only on the cluster side: reads never return it, so
/// `None` means "no desired change" rather than "clear the secret".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationTarget {
    pub bucket: String,
    pub host: String,
    pub region: String,
    pub storage_class: String,
    /// Sub-path prefix inside the target bucket, joined into the composite
    /// target path on the wire.
    pub path: String,
    pub secure: bool,
    pub path_style: PathStyle,
    pub synchronous: bool,
    pub health_check_period: Duration,
    /// Bytes per second; 0 means unlimited.
    pub bandwidth_limit: u64,
    pub access_key: String,
    pub secret_key: Option<String>,
}

/// One declared replication rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationRule {
    /// Stable opaque id; empty until the engine assigns one on first apply.
    pub identity: String,
    /// Destination reference bound to this rule; computed, never authored.
    pub arn: String,
    /// Positive values are caller-supplied and unique per configuration;
    /// non-positive values mean "unassigned" and are replaced by the
    /// synthetic ordinal `-(index + 1)`.
    pub priority: i32,
    pub enabled: bool,
    /// Object-key prefix filter; empty matches everything.
    pub prefix: String,
    /// AND tag filter; an empty map means "no tag filter".
    pub tags: BTreeMap<String, String>,
    pub delete_marker_replication: bool,
    pub delete_replication: bool,
    pub existing_object_replication: bool,
    pub metadata_sync: bool,
    pub target: ReplicationTarget,
}

impl ReplicationRule {
    /// Whether this rule already carries an engine-assigned identity.
    pub fn has_identity(&self) -> bool {
        !self.identity.trim().is_empty()
    }

    /// The priority key used for identity matching: the declared priority
    /// when positive, else the synthetic ordinal for this list position.
    pub fn priority_key(&self, index: usize) -> i32 {
        if self.priority > 0 {
            self.priority
        } else {
            -(index as i32) - 1
        }
    }

    /// The non-negative priority submitted on the wire.
    pub fn wire_priority(&self) -> i32 {
        self.priority.abs()
    }
}

// =============================================================================
// Bucket Name Validation
// =============================================================================

/// Validate an S3 bucket name locally, before any remote call.
pub fn validate_bucket_name(bucket: &str) -> Result<()> {
    let fail = |reason: &str| {
        Err(Error::InvalidBucketName {
            bucket: bucket.to_string(),
            reason: reason.to_string(),
        })
    };

    if bucket.len() < 3 || bucket.len() > 63 {
        return fail("must be between 3 and 63 characters long");
    }
    if !bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return fail("may only contain lowercase letters, digits, hyphens and dots");
    }
    let first = bucket.chars().next().unwrap_or('-');
    let last = bucket.chars().last().unwrap_or('-');
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return fail("must start and end with a letter or digit");
    }
    if bucket.contains("..") {
        return fail("must not contain adjacent dots");
    }
    if bucket.split('.').count() == 4 && bucket.split('.').all(|p| p.parse::<u8>().is_ok()) {
        return fail("must not be formatted like an IP address");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn rule_with_priority(priority: i32) -> ReplicationRule {
        ReplicationRule {
            identity: String::new(),
            arn: String::new(),
            priority,
            enabled: true,
            prefix: String::new(),
            tags: BTreeMap::new(),
            delete_marker_replication: false,
            delete_replication: false,
            existing_object_replication: false,
            metadata_sync: false,
            target: ReplicationTarget {
                bucket: "backup".to_string(),
                host: "replica.example.com:9000".to_string(),
                region: String::new(),
                storage_class: String::new(),
                path: String::new(),
                secure: true,
                path_style: PathStyle::Auto,
                synchronous: false,
                health_check_period: Duration::from_secs(30),
                bandwidth_limit: 0,
                access_key: "key".to_string(),
                secret_key: None,
            },
        }
    }

    #[test]
    fn test_priority_key_prefers_positive_priority() {
        assert_eq!(rule_with_priority(42).priority_key(3), 42);
    }

    #[test]
    fn test_priority_key_substitutes_synthetic_ordinal() {
        assert_eq!(rule_with_priority(0).priority_key(0), -1);
        assert_eq!(rule_with_priority(0).priority_key(2), -3);
        assert_eq!(rule_with_priority(-7).priority_key(4), -5);
    }

    #[test]
    fn test_wire_priority_is_absolute() {
        assert_eq!(rule_with_priority(-3).wire_priority(), 3);
        assert_eq!(rule_with_priority(10).wire_priority(), 10);
    }

    #[test]
    fn test_has_identity_ignores_whitespace() {
        let mut rule = rule_with_priority(1);
        assert!(!rule.has_identity());
        rule.identity = "  ".to_string();
        assert!(!rule.has_identity());
        rule.identity = "c9f3a1".to_string();
        assert!(rule.has_identity());
    }

    #[test]
    fn test_path_style_parse() {
        assert_eq!(PathStyle::parse("on"), Some(PathStyle::On));
        assert_eq!(PathStyle::parse(" OFF "), Some(PathStyle::Off));
        assert_eq!(PathStyle::parse(""), Some(PathStyle::Auto));
        assert_eq!(PathStyle::parse("sideways"), None);
        assert_eq!(PathStyle::Auto.to_string(), "auto");
    }

    #[test]
    fn test_valid_bucket_names() {
        for name in ["abc", "my-bucket", "tenant.data-01", "0backup9"] {
            assert_matches!(validate_bucket_name(name), Ok(()));
        }
    }

    #[test]
    fn test_invalid_bucket_names() {
        for name in [
            "ab",
            "UPPER",
            "has_underscore",
            "-leading",
            "trailing-",
            "double..dot",
            "192.168.1.10",
        ] {
            assert_matches!(
                validate_bucket_name(name),
                Err(Error::InvalidBucketName { .. }),
                "expected rejection for {:?}",
                name
            );
        }
        let long = "a".repeat(64);
        assert_matches!(
            validate_bucket_name(&long),
            Err(Error::InvalidBucketName { .. })
        );
    }
}
