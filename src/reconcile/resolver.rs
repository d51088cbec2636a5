//! Target Resolution
//!
//! For each declared rule, derives the remote-target descriptor and upserts
//! it against the cluster, which answers with the destination reference to
//! embed in the rule. The descriptor is re-submitted on every apply rather
//! than diffed against the existing target list; the upsert is idempotent on
//! the cluster side and the cluster stays the sole authority for reference
//! assignment.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::model::{validate_bucket_name, ReplicationRule};
use crate::domain::ports::{ClusterClient, TargetDescriptor, API_SIGNATURE, REPLICATION_SERVICE};
use crate::error::Result;
use crate::path;
use crate::reconcile::ensure_active;

pub(crate) struct TargetResolver<'a> {
    client: &'a dyn ClusterClient,
    bucket: &'a str,
}

impl<'a> TargetResolver<'a> {
    pub(crate) fn new(client: &'a dyn ClusterClient, bucket: &'a str) -> Self {
        Self { client, bucket }
    }

    /// Upsert the rule's remote target and return its destination reference.
    /// The target bucket name is validated locally before anything goes on
    /// the wire.
    pub(crate) async fn resolve(
        &self,
        rule: &ReplicationRule,
        cancel: &CancellationToken,
    ) -> Result<String> {
        validate_bucket_name(&rule.target.bucket)?;

        let target_bucket = path::compose(&rule.target.bucket, &rule.target.path);
        debug!(path = %target_bucket, "full path to target bucket");

        let descriptor = TargetDescriptor {
            target_bucket,
            endpoint: rule.target.host.clone(),
            access_key: rule.target.access_key.clone(),
            secret_key: rule.target.secret_key.clone().unwrap_or_default(),
            secure: rule.target.secure,
            path_style: rule.target.path_style.to_string(),
            api: API_SIGNATURE.to_string(),
            service: REPLICATION_SERVICE.to_string(),
            region: rule.target.region.clone(),
            bandwidth_limit: rule.target.bandwidth_limit,
            replication_sync: rule.target.synchronous,
            disable_proxy: false,
            health_check_period: rule.target.health_check_period,
        };

        ensure_active(cancel)?;
        let arn = self
            .client
            .upsert_remote_target(self.bucket, &descriptor)
            .await?;
        debug!(arn = %arn, endpoint = %rule.target.host, "remote target resolved");
        Ok(arn)
    }
}
