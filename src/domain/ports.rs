//! Cluster Client Port
//!
//! This module defines the abstraction over the storage cluster's admin API
//! plus the wire-shaped value objects exchanged through it. Infrastructure
//! adapters (REST, in-memory) implement the [`ClusterClient`] trait; the
//! reconciliation engine only ever talks to the trait.
//!
//! The cluster is the sole authority for destination references: a target
//! upsert returns the reference string, and the engine treats it as opaque
//! apart from the convention that it ends in the literal target bucket name.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Service type submitted with every target descriptor and used to filter
/// remote-target listings.
pub const REPLICATION_SERVICE: &str = "replication";

/// Signature version submitted with every target descriptor.
pub const API_SIGNATURE: &str = "s3v4";

// =============================================================================
// Rule Status
// =============================================================================

/// Wire status of a rule or of one of its toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleStatus {
    Enabled,
    #[default]
    Disabled,
}

impl RuleStatus {
    pub fn is_enabled(&self) -> bool {
        matches!(self, RuleStatus::Enabled)
    }
}

impl From<bool> for RuleStatus {
    fn from(enabled: bool) -> Self {
        if enabled {
            RuleStatus::Enabled
        } else {
            RuleStatus::Disabled
        }
    }
}

// =============================================================================
// Filters
// =============================================================================

/// A single tag used in replication filtering. A tag with an empty key is
/// treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTag {
    pub key: String,
    pub value: String,
}

impl RemoteTag {
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

/// Logical AND of a prefix and multiple tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAndFilter {
    pub prefix: String,
    pub tags: Vec<RemoteTag>,
}

impl RemoteAndFilter {
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty() && self.tags.is_empty()
    }
}

/// Object filter attached to a remote rule. Exactly one of the three forms is
/// populated: a bare prefix, a single tag, or the combined AND form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFilter {
    pub prefix: String,
    pub tag: RemoteTag,
    pub and: RemoteAndFilter,
}

// =============================================================================
// Remote Rules
// =============================================================================

/// A replication rule as held by the cluster. Addressed by a destination
/// reference instead of a target descriptor, and carrying the server-side
/// non-negative priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRule {
    pub id: String,
    pub status: RuleStatus,
    pub priority: i32,
    /// Destination reference (ARN) binding this rule to a remote target.
    pub destination: String,
    pub storage_class: String,
    pub filter: RemoteFilter,
    pub delete_marker_replication: RuleStatus,
    pub delete_replication: RuleStatus,
    pub existing_object_replication: RuleStatus,
    /// Replica modification sync, the wire form of metadata sync.
    pub replica_modifications: RuleStatus,
}

impl RemoteRule {
    /// The effective key-prefix filter, regardless of which filter form the
    /// rule uses.
    pub fn prefix(&self) -> &str {
        if !self.filter.and.prefix.is_empty() {
            &self.filter.and.prefix
        } else {
            &self.filter.prefix
        }
    }

    /// The effective tag filter as a map; empty when the rule filters on
    /// prefix only.
    pub fn tag_map(&self) -> BTreeMap<String, String> {
        if !self.filter.and.is_empty() {
            self.filter
                .and
                .tags
                .iter()
                .filter(|tag| !tag.is_empty())
                .map(|tag| (tag.key.clone(), tag.value.clone()))
                .collect()
        } else if !self.filter.tag.is_empty() {
            BTreeMap::from([(self.filter.tag.key.clone(), self.filter.tag.value.clone())])
        } else {
            BTreeMap::new()
        }
    }
}

/// The cluster's full replication configuration for one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub rules: Vec<RemoteRule>,
}

impl RemoteConfig {
    /// Append a new rule built from the wire option set. The identity must
    /// not collide with an existing rule.
    pub fn add_rule(&mut self, options: RuleOptions) -> Result<()> {
        if self.rules.iter().any(|r| r.id == options.id) {
            return Err(Error::Consistency(format!(
                "a rule with identity {:?} already exists in the replication configuration",
                options.id
            )));
        }
        self.rules.push(options.into_rule());
        Ok(())
    }

    /// Replace the rule with the same identity, in place.
    pub fn edit_rule(&mut self, options: RuleOptions) -> Result<()> {
        let Some(slot) = self.rules.iter_mut().find(|r| r.id == options.id) else {
            return Err(Error::Consistency(format!(
                "no rule with identity {:?} to edit in the replication configuration",
                options.id
            )));
        };
        *slot = options.into_rule();
        Ok(())
    }
}

// =============================================================================
// Rule Options
// =============================================================================

/// The wire option set for one rule mutation. Tags travel as a single
/// `key=value&key=value` string, exactly as the admin API encodes them.
#[derive(Debug, Clone, Default)]
pub struct RuleOptions {
    pub id: String,
    pub priority: i32,
    pub enabled: bool,
    pub prefix: String,
    pub tag_string: String,
    pub storage_class: String,
    pub destination: String,
    pub delete_marker_replication: bool,
    pub delete_replication: bool,
    pub existing_object_replication: bool,
    pub metadata_sync: bool,
}

impl RuleOptions {
    /// Parse the encoded tag string. Malformed pairs (no `=`) are dropped.
    pub fn tags(&self) -> Vec<RemoteTag> {
        self.tag_string
            .split('&')
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                (!key.is_empty()).then(|| RemoteTag {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            })
            .collect()
    }

    fn into_rule(self) -> RemoteRule {
        let tags = self.tags();
        let filter = if tags.len() > 1 || (!tags.is_empty() && !self.prefix.is_empty()) {
            RemoteFilter {
                and: RemoteAndFilter {
                    prefix: self.prefix.clone(),
                    tags,
                },
                ..Default::default()
            }
        } else if let Some(tag) = tags.into_iter().next() {
            RemoteFilter {
                tag,
                ..Default::default()
            }
        } else {
            RemoteFilter {
                prefix: self.prefix.clone(),
                ..Default::default()
            }
        };

        RemoteRule {
            id: self.id,
            status: self.enabled.into(),
            priority: self.priority,
            destination: self.destination,
            storage_class: self.storage_class,
            filter,
            delete_marker_replication: self.delete_marker_replication.into(),
            delete_replication: self.delete_replication.into(),
            existing_object_replication: self.existing_object_replication.into(),
            replica_modifications: self.metadata_sync.into(),
        }
    }
}

// =============================================================================
// Remote Targets
// =============================================================================

/// The cluster's view of a remote target. Credentials come back with the
/// access key only; the secret is write-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteTarget {
    pub arn: String,
    pub endpoint: String,
    /// Composite target path; the final segment is the bucket name.
    pub target_bucket: String,
    pub secure: bool,
    pub path_style: String,
    pub access_key: String,
    pub region: String,
    pub bandwidth_limit: u64,
    pub health_check_period: Duration,
    pub replication_sync: bool,
}

/// The upsert payload describing a remote target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Composite target path; the final segment is the bucket name.
    pub target_bucket: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub secure: bool,
    pub path_style: String,
    pub api: String,
    pub service: String,
    pub region: String,
    pub bandwidth_limit: u64,
    pub replication_sync: bool,
    pub disable_proxy: bool,
    pub health_check_period: Duration,
}

// =============================================================================
// Cluster Client Port
// =============================================================================

/// Port for the storage cluster's replication admin API.
///
/// All calls are issued strictly in declared-rule order by the engine; the
/// cluster serializes concurrent mutations on its own side. Implementations
/// surface refusals as [`Error::RemoteRejected`] without retrying.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Read the bucket's current replication rule set. A bucket with no
    /// configuration yields an empty config, not an error.
    async fn get_replication_config(&self, bucket: &str) -> Result<RemoteConfig>;

    /// Replace the bucket's full replication rule set.
    async fn set_replication_config(&self, bucket: &str, config: &RemoteConfig) -> Result<()>;

    /// List the bucket's remote targets, optionally filtered by service type
    /// (empty string lists all).
    async fn list_remote_targets(&self, bucket: &str, service: &str) -> Result<Vec<RemoteTarget>>;

    /// Create or update a remote target and return its destination reference.
    async fn upsert_remote_target(
        &self,
        bucket: &str,
        descriptor: &TargetDescriptor,
    ) -> Result<String>;

    /// Remove a remote target by destination reference.
    async fn remove_remote_target(&self, bucket: &str, arn: &str) -> Result<()>;
}
