//! Bucket Replication Declaration
//!
//! Defines the schema for the declarative document that drives
//! reconciliation: one bucket, an ordered list of rule blocks, each with
//! exactly one target block. `id` and `arn` are computed fields, populated
//! from the last-applied state rather than authored by hand.
//!
//! Decoding is a single explicit pass from the loosely-typed document into
//! [`ReplicationRule`] records. Every problem is collected as a
//! [`FieldIssue`] tagged with the path of the offending field; nothing is
//! silently defaulted beyond the documented defaults (`enabled` true,
//! `prefix` empty, `pathStyle` auto).

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::model::{PathStyle, ReplicationRule, ReplicationTarget};
use crate::error::{Error, FieldIssue, Result};
use crate::units::{
    format_byte_size, format_duration, parse_byte_size, parse_duration, MIN_BANDWIDTH_BYTES,
};

/// Upper bound on rule blocks per bucket declaration.
pub const MAX_RULES_PER_BUCKET: usize = 10;

// =============================================================================
// Schema
// =============================================================================

/// Root of a bucket-replication declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketReplicationSpec {
    /// Bucket whose replication configuration is being declared.
    #[serde(default)]
    pub bucket: String,

    /// Ordered replication rules; order is significant and preserved across
    /// reconciliations.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// One declared replication rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    /// Computed: stable rule identity assigned on first apply.
    #[serde(default)]
    pub id: String,

    /// Computed: destination reference bound to this rule.
    #[serde(default)]
    pub arn: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Positive and unique when set; omit (or 0) to let the engine assign an
    /// ordinal automatically.
    #[serde(default)]
    pub priority: i32,

    /// Object-key prefix filter.
    #[serde(default)]
    pub prefix: String,

    /// AND tag filter.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    #[serde(default)]
    pub delete_replication: bool,

    #[serde(default)]
    pub delete_marker_replication: bool,

    #[serde(default)]
    pub existing_object_replication: bool,

    #[serde(default)]
    pub metadata_sync: bool,

    /// Exactly one target block is required.
    #[serde(default)]
    pub target: Option<TargetSpec>,
}

/// The remote bucket a rule replicates into.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    pub bucket: String,

    #[serde(default)]
    pub storage_class: String,

    /// Endpoint of the remote cluster, `host[:port]`.
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_secure")]
    pub secure: bool,

    /// `on`, `off` or `auto`.
    #[serde(default = "default_path_style")]
    pub path_style: String,

    /// Sub-path prefix inside the target bucket.
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub synchronous: bool,

    /// Duration text, e.g. `30s`, `5m`, `1h`.
    #[serde(default = "default_health_check_period")]
    pub health_check_period: String,

    /// Byte-size text; `0` means unlimited, anything else must be at least
    /// 100M.
    #[serde(default = "default_bandwidth_limit")]
    pub bandwidth_limit: String,

    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub access_key: String,

    /// Write-only; omit to keep the secret currently known to the engine.
    #[serde(default)]
    pub secret_key: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_secure() -> bool {
    true
}

fn default_path_style() -> String {
    "auto".to_string()
}

fn default_health_check_period() -> String {
    "30s".to_string()
}

fn default_bandwidth_limit() -> String {
    "0".to_string()
}

// =============================================================================
// Decode
// =============================================================================

/// Decode a declaration into typed rules, or fail with every validation
/// issue found, each tagged by field path. No remote call depends on a
/// declaration that did not pass through here.
pub fn decode_rules(spec: &BucketReplicationSpec) -> Result<Vec<ReplicationRule>> {
    let mut issues = Vec::new();
    let mut rules = Vec::with_capacity(spec.rules.len());

    if spec.bucket.trim().is_empty() {
        issues.push(FieldIssue::new("bucket", "cannot be omitted"));
    }
    if spec.rules.len() > MAX_RULES_PER_BUCKET {
        issues.push(FieldIssue::new(
            "rules",
            format!("at most {} rules are supported per bucket", MAX_RULES_PER_BUCKET),
        ));
    }

    let mut seen_priorities: BTreeMap<i32, usize> = BTreeMap::new();

    for (index, rule) in spec.rules.iter().enumerate() {
        let at = |field: &str| format!("rules[{}].{}", index, field);

        let priority = if rule.priority > 0 {
            if let Some(previous) = seen_priorities.insert(rule.priority, index) {
                issues.push(FieldIssue::new(
                    at("priority"),
                    format!("duplicates the priority of rules[{}]", previous),
                ));
            }
            rule.priority
        } else {
            // Priorities are always positive on the wire; a negative value
            // marks this one as automatically assigned.
            -(index as i32) - 1
        };

        validate_tags(&rule.tags, index, &mut issues);

        let Some(target) = &rule.target else {
            issues.push(FieldIssue::new(
                at("target"),
                "exactly one target configuration is required",
            ));
            continue;
        };

        if target.bucket.is_empty() {
            issues.push(FieldIssue::new(at("target.bucket"), "cannot be omitted"));
        }
        if target.host.is_empty() {
            issues.push(FieldIssue::new(at("target.host"), "cannot be omitted"));
        }
        if target.access_key.is_empty() {
            issues.push(FieldIssue::new(at("target.accessKey"), "cannot be omitted"));
        }
        if matches!(&target.secret_key, Some(secret) if secret.is_empty()) {
            issues.push(FieldIssue::new(
                at("target.secretKey"),
                "must not be empty when set",
            ));
        }
        if !target.secure {
            warn!(
                rule = index,
                "target.secure is false; replicating over plain HTTP is unsafe"
            );
        }

        let bandwidth_limit = match parse_byte_size(&target.bandwidth_limit) {
            Ok(value) if value != 0 && value < MIN_BANDWIDTH_BYTES => {
                issues.push(FieldIssue::new(
                    at("target.bandwidthLimit"),
                    format!("must be 0 or at least {}", format_byte_size(MIN_BANDWIDTH_BYTES)),
                ));
                value
            }
            Ok(value) => value,
            Err(_) => {
                issues.push(FieldIssue::new(
                    at("target.bandwidthLimit"),
                    "is not a valid byte size; use plain bytes or a k/M/G/T suffix",
                ));
                0
            }
        };

        let health_check_period = match parse_duration(&target.health_check_period) {
            Ok(duration) => duration,
            Err(_) => {
                issues.push(FieldIssue::new(
                    at("target.healthCheckPeriod"),
                    "is not a valid duration; use an integer followed by s, m or h",
                ));
                Default::default()
            }
        };

        let path_style = PathStyle::parse(&target.path_style).unwrap_or_else(|| {
            warn!(
                rule = index,
                value = %target.path_style,
                "target.pathStyle must be \"on\", \"off\" or \"auto\"; defaulting to \"auto\""
            );
            PathStyle::Auto
        });

        rules.push(ReplicationRule {
            identity: rule.id.clone(),
            arn: rule.arn.clone(),
            priority,
            enabled: rule.enabled,
            prefix: rule.prefix.clone(),
            tags: rule.tags.clone(),
            delete_marker_replication: rule.delete_marker_replication,
            delete_replication: rule.delete_replication,
            existing_object_replication: rule.existing_object_replication,
            metadata_sync: rule.metadata_sync,
            target: ReplicationTarget {
                bucket: target.bucket.clone(),
                host: target.host.clone(),
                region: target.region.clone(),
                storage_class: target.storage_class.clone(),
                path: target.path.clone(),
                secure: target.secure,
                path_style,
                synchronous: target.synchronous,
                health_check_period,
                bandwidth_limit,
                access_key: target.access_key.clone(),
                secret_key: target.secret_key.clone(),
            },
        });
    }

    Error::from_issues(rules, issues)
}

fn validate_tags(tags: &BTreeMap<String, String>, index: usize, issues: &mut Vec<FieldIssue>) {
    for (key, value) in tags {
        let path = format!("rules[{}].tags[{:?}]", index, key);
        if key.is_empty() || key.len() > 128 {
            issues.push(FieldIssue::new(
                path.as_str(),
                "key must be between 1 and 128 characters",
            ));
        }
        if value.is_empty() || value.len() > 256 {
            issues.push(FieldIssue::new(
                path.as_str(),
                "value must be between 1 and 256 characters",
            ));
        }
        if !key.chars().all(valid_tag_char) || !value.chars().all(valid_tag_char) {
            issues.push(FieldIssue::new(
                path.as_str(),
                "may only contain letters, digits and +-._:/@ or space",
            ));
        }
    }
}

fn valid_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "+-._:/@ ".contains(c)
}

// =============================================================================
// Encode
// =============================================================================

/// Render typed rules back into declarative shape, with byte sizes and
/// durations in their canonical text form. Re-rendered text that matches the
/// stored declaration is how the host suppresses spurious diffs.
pub fn encode_rules(bucket: &str, rules: &[ReplicationRule]) -> BucketReplicationSpec {
    BucketReplicationSpec {
        bucket: bucket.to_string(),
        rules: rules
            .iter()
            .map(|rule| RuleSpec {
                id: rule.identity.clone(),
                arn: rule.arn.clone(),
                enabled: rule.enabled,
                priority: rule.priority,
                prefix: rule.prefix.clone(),
                tags: rule.tags.clone(),
                delete_replication: rule.delete_replication,
                delete_marker_replication: rule.delete_marker_replication,
                existing_object_replication: rule.existing_object_replication,
                metadata_sync: rule.metadata_sync,
                target: Some(TargetSpec {
                    bucket: rule.target.bucket.clone(),
                    storage_class: rule.target.storage_class.clone(),
                    host: rule.target.host.clone(),
                    secure: rule.target.secure,
                    path_style: rule.target.path_style.to_string(),
                    path: rule.target.path.clone(),
                    synchronous: rule.target.synchronous,
                    health_check_period: format_duration(rule.target.health_check_period),
                    bandwidth_limit: format_byte_size(rule.target.bandwidth_limit),
                    region: rule.target.region.clone(),
                    access_key: rule.target.access_key.clone(),
                    secret_key: rule.target.secret_key.clone(),
                }),
            })
            .collect(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn minimal_spec() -> BucketReplicationSpec {
        serde_yaml::from_str(
            r#"
            bucket: source
            rules:
              - target:
                  bucket: backup
                  host: replica.example.com:9000
                  accessKey: replicator
                  secretKey: hunter2
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_decode_applies_documented_defaults() {
        let rules = decode_rules(&minimal_spec()).unwrap();
        let rule = &rules[0];

        assert!(rule.enabled);
        assert_eq!(rule.priority, -1);
        assert_eq!(rule.prefix, "");
        assert!(rule.tags.is_empty());
        assert!(!rule.delete_replication);
        assert_eq!(rule.target.path_style, PathStyle::Auto);
        assert!(rule.target.secure);
        assert_eq!(rule.target.bandwidth_limit, 0);
        assert_eq!(
            rule.target.health_check_period,
            std::time::Duration::from_secs(30)
        );
    }

    #[test]
    fn test_decode_assigns_synthetic_priorities_by_position() {
        let mut spec = minimal_spec();
        spec.rules.push(spec.rules[0].clone());
        spec.rules.push(spec.rules[0].clone());
        spec.rules[1].priority = 50;

        let rules = decode_rules(&spec).unwrap();
        assert_eq!(rules[0].priority, -1);
        assert_eq!(rules[1].priority, 50);
        assert_eq!(rules[2].priority, -3);
    }

    #[test]
    fn test_decode_collects_missing_required_fields() {
        let spec: BucketReplicationSpec = serde_yaml::from_str(
            r#"
            rules:
              - target:
                  bucket: backup
              - {}
            "#,
        )
        .unwrap();

        let err = decode_rules(&spec).unwrap_err();
        let issues = match err {
            Error::Validation(issues) => issues,
            other => panic!("expected validation error, got {:?}", other),
        };
        let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        assert!(paths.contains(&"bucket"));
        assert!(paths.contains(&"rules[0].target.host"));
        assert!(paths.contains(&"rules[0].target.accessKey"));
        assert!(paths.contains(&"rules[1].target"));
    }

    #[test]
    fn test_decode_rejects_duplicate_positive_priorities() {
        let mut spec = minimal_spec();
        spec.rules.push(spec.rules[0].clone());
        spec.rules[0].priority = 10;
        spec.rules[1].priority = 10;

        let err = decode_rules(&spec).unwrap_err();
        assert_matches!(
            err,
            Error::Validation(issues) if issues.iter().any(|i| i.path == "rules[1].priority")
        );
    }

    #[test]
    fn test_decode_enforces_bandwidth_floor() {
        let mut spec = minimal_spec();
        spec.rules[0].target.as_mut().unwrap().bandwidth_limit = "50M".to_string();

        let err = decode_rules(&spec).unwrap_err();
        assert_matches!(
            err,
            Error::Validation(issues)
                if issues.iter().any(|i| i.path == "rules[0].target.bandwidthLimit")
        );

        spec.rules[0].target.as_mut().unwrap().bandwidth_limit = "100M".to_string();
        let rules = decode_rules(&spec).unwrap();
        assert_eq!(rules[0].target.bandwidth_limit, 100_000_000);
    }

    #[test]
    fn test_decode_rejects_bad_duration_and_byte_size_text() {
        let mut spec = minimal_spec();
        {
            let target = spec.rules[0].target.as_mut().unwrap();
            target.bandwidth_limit = "fast".to_string();
            target.health_check_period = "soon".to_string();
        }

        let err = decode_rules(&spec).unwrap_err();
        let Error::Validation(issues) = err else {
            panic!("expected validation error");
        };
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_decode_rejects_oversized_rule_list() {
        let mut spec = minimal_spec();
        let template = spec.rules[0].clone();
        for i in 0..MAX_RULES_PER_BUCKET {
            let mut extra = template.clone();
            extra.priority = (i + 1) as i32;
            spec.rules.push(extra);
        }

        let err = decode_rules(&spec).unwrap_err();
        assert_matches!(
            err,
            Error::Validation(issues) if issues.iter().any(|i| i.path == "rules")
        );
    }

    #[test]
    fn test_decode_validates_tag_charset_and_lengths() {
        let mut spec = minimal_spec();
        spec.rules[0]
            .tags
            .insert("team".to_string(), "infra".to_string());
        spec.rules[0]
            .tags
            .insert("bad\u{7f}key".to_string(), "x".to_string());
        spec.rules[0]
            .tags
            .insert("big".to_string(), "v".repeat(257));

        let err = decode_rules(&spec).unwrap_err();
        let Error::Validation(issues) = err else {
            panic!("expected validation error");
        };
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_unknown_path_style_defaults_to_auto() {
        let mut spec = minimal_spec();
        spec.rules[0].target.as_mut().unwrap().path_style = "sideways".to_string();
        let rules = decode_rules(&spec).unwrap();
        assert_eq!(rules[0].target.path_style, PathStyle::Auto);
    }

    #[test]
    fn test_encode_renders_canonical_unit_text() {
        let mut rules = decode_rules(&minimal_spec()).unwrap();
        rules[0].target.bandwidth_limit = 100_000_000;
        rules[0].target.health_check_period = std::time::Duration::from_secs(300);
        rules[0].identity = "r-1".to_string();

        let spec = encode_rules("source", &rules);
        let target = spec.rules[0].target.as_ref().unwrap();
        assert_eq!(target.bandwidth_limit, "100M");
        assert_eq!(target.health_check_period, "5m");
        assert_eq!(spec.rules[0].id, "r-1");
    }

    #[test]
    fn test_decode_of_encode_is_stable() {
        let mut spec = minimal_spec();
        spec.rules[0].priority = 7;
        spec.rules[0].prefix = "logs/".to_string();
        let decoded = decode_rules(&spec).unwrap();
        let redecoded = decode_rules(&encode_rules("source", &decoded)).unwrap();
        assert_eq!(decoded, redecoded);
    }
}
