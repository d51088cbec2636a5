//! In-Memory Cluster Adapter
//!
//! A fake cluster that implements the `ClusterClient` port entirely in
//! process. Reference assignment follows the live cluster's convention: an
//! opaque string ending in the literal target bucket name. Upserts are
//! idempotent per (endpoint, composite path) pair, so re-submitting an
//! unchanged target yields the same reference.
//!
//! Every served call is recorded, which is what the reconciliation tests
//! assert against (e.g. "the second apply removed zero targets").

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::ports::{
    ClusterClient, RemoteConfig, RemoteTarget, TargetDescriptor, REPLICATION_SERVICE,
};
use crate::error::{Error, Result};
use crate::path;

/// One remote call served by the fake cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    GetConfig { bucket: String },
    SetConfig { bucket: String, rules: usize },
    ListTargets { bucket: String },
    UpsertTarget { bucket: String, path: String },
    RemoveTarget { bucket: String, arn: String },
}

#[derive(Default)]
struct ClusterState {
    configs: HashMap<String, RemoteConfig>,
    targets: HashMap<String, Vec<RemoteTarget>>,
    next_reference: u64,
    calls: Vec<RecordedCall>,
}

/// In-process fake cluster.
#[derive(Default)]
pub struct MemoryCluster {
    state: RwLock<ClusterState>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls served so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.read().calls.clone()
    }

    /// How many remote-target removals have been served.
    pub fn removed_target_count(&self) -> usize {
        self.state
            .read()
            .calls
            .iter()
            .filter(|call| matches!(call, RecordedCall::RemoveTarget { .. }))
            .count()
    }

    /// Mutate a bucket's stored configuration directly, simulating external
    /// interference (re-ordering, duplicated references, ...).
    pub fn mutate_config(&self, bucket: &str, mutate: impl FnOnce(&mut RemoteConfig)) {
        let mut state = self.state.write();
        mutate(state.configs.entry(bucket.to_string()).or_default());
    }

    /// Mutate a bucket's stored target list directly.
    pub fn mutate_targets(&self, bucket: &str, mutate: impl FnOnce(&mut Vec<RemoteTarget>)) {
        let mut state = self.state.write();
        mutate(state.targets.entry(bucket.to_string()).or_default());
    }

    fn descriptor_to_target(descriptor: &TargetDescriptor, arn: String) -> RemoteTarget {
        RemoteTarget {
            arn,
            endpoint: descriptor.endpoint.clone(),
            target_bucket: descriptor.target_bucket.clone(),
            secure: descriptor.secure,
            path_style: descriptor.path_style.clone(),
            access_key: descriptor.access_key.clone(),
            region: descriptor.region.clone(),
            bandwidth_limit: descriptor.bandwidth_limit,
            health_check_period: descriptor.health_check_period,
            replication_sync: descriptor.replication_sync,
        }
    }
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    async fn get_replication_config(&self, bucket: &str) -> Result<RemoteConfig> {
        let mut state = self.state.write();
        state.calls.push(RecordedCall::GetConfig {
            bucket: bucket.to_string(),
        });
        // A bucket with no configuration yields an empty config.
        Ok(state.configs.get(bucket).cloned().unwrap_or_default())
    }

    async fn set_replication_config(&self, bucket: &str, config: &RemoteConfig) -> Result<()> {
        let mut state = self.state.write();
        state.calls.push(RecordedCall::SetConfig {
            bucket: bucket.to_string(),
            rules: config.rules.len(),
        });
        state.configs.insert(bucket.to_string(), config.clone());
        Ok(())
    }

    async fn list_remote_targets(&self, bucket: &str, service: &str) -> Result<Vec<RemoteTarget>> {
        let mut state = self.state.write();
        state.calls.push(RecordedCall::ListTargets {
            bucket: bucket.to_string(),
        });
        if !service.is_empty() && service != REPLICATION_SERVICE {
            return Ok(Vec::new());
        }
        Ok(state.targets.get(bucket).cloned().unwrap_or_default())
    }

    async fn upsert_remote_target(
        &self,
        bucket: &str,
        descriptor: &TargetDescriptor,
    ) -> Result<String> {
        let mut state = self.state.write();
        state.calls.push(RecordedCall::UpsertTarget {
            bucket: bucket.to_string(),
            path: descriptor.target_bucket.clone(),
        });

        let targets = state.targets.entry(bucket.to_string()).or_default();
        if let Some(existing) = targets.iter_mut().find(|t| {
            t.endpoint == descriptor.endpoint && t.target_bucket == descriptor.target_bucket
        }) {
            let arn = existing.arn.clone();
            *existing = Self::descriptor_to_target(descriptor, arn.clone());
            return Ok(arn);
        }

        let (target_bucket_name, _) = path::decompose(&descriptor.target_bucket);
        let token = state.next_reference;
        state.next_reference += 1;
        let arn = format!(
            "arn:replistor:replication::{:08x}:{}",
            token, target_bucket_name
        );
        state
            .targets
            .entry(bucket.to_string())
            .or_default()
            .push(Self::descriptor_to_target(descriptor, arn.clone()));
        Ok(arn)
    }

    async fn remove_remote_target(&self, bucket: &str, arn: &str) -> Result<()> {
        let mut state = self.state.write();
        state.calls.push(RecordedCall::RemoveTarget {
            bucket: bucket.to_string(),
            arn: arn.to_string(),
        });

        let targets = state.targets.entry(bucket.to_string()).or_default();
        let before = targets.len();
        targets.retain(|t| t.arn != arn);
        if targets.len() == before {
            return Err(Error::RemoteRejected {
                context: format!("removing remote target for bucket {:?}", bucket),
                reason: format!("no remote target with ARN {:?}", arn),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn descriptor(path: &str) -> TargetDescriptor {
        TargetDescriptor {
            target_bucket: path.to_string(),
            endpoint: "replica.example.com:9000".to_string(),
            access_key: "replicator".to_string(),
            secret_key: "hunter2".to_string(),
            secure: true,
            path_style: "auto".to_string(),
            api: "s3v4".to_string(),
            service: REPLICATION_SERVICE.to_string(),
            region: String::new(),
            bandwidth_limit: 0,
            replication_sync: false,
            disable_proxy: false,
            health_check_period: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn test_upsert_assigns_reference_ending_in_bucket_name() {
        let cluster = MemoryCluster::new();
        let arn = cluster
            .upsert_remote_target("source", &descriptor("tenants/a/backup"))
            .await
            .unwrap();
        assert!(arn.starts_with("arn:replistor:replication::"));
        assert!(arn.ends_with(":backup"));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_endpoint_and_path() {
        let cluster = MemoryCluster::new();
        let first = cluster
            .upsert_remote_target("source", &descriptor("backup"))
            .await
            .unwrap();
        let second = cluster
            .upsert_remote_target("source", &descriptor("backup"))
            .await
            .unwrap();
        assert_eq!(first, second);

        let other = cluster
            .upsert_remote_target("source", &descriptor("other"))
            .await
            .unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_remove_unknown_target_is_rejected() {
        let cluster = MemoryCluster::new();
        assert_matches!(
            cluster.remove_remote_target("source", "arn:ghost").await,
            Err(Error::RemoteRejected { .. })
        );
    }

    #[tokio::test]
    async fn test_unconfigured_bucket_reads_as_empty() {
        let cluster = MemoryCluster::new();
        let config = cluster.get_replication_config("source").await.unwrap();
        assert!(config.rules.is_empty());
        assert!(cluster
            .list_remote_targets("source", "")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_service_filter_limits_listing() {
        let cluster = MemoryCluster::new();
        cluster
            .upsert_remote_target("source", &descriptor("backup"))
            .await
            .unwrap();
        assert_eq!(
            cluster
                .list_remote_targets("source", REPLICATION_SERVICE)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(cluster
            .list_remote_targets("source", "ilm")
            .await
            .unwrap()
            .is_empty());
    }
}
