//! Apply and Delete Passes
//!
//! The apply pass walks the declared rules in order: resolve the rule's
//! remote target, serialize the rule into the wire option set and add or
//! edit it against the freshly-read remote configuration, then drop every
//! remote target no longer referenced and submit the full rule set. Any
//! remote failure aborts the remaining sequence without rollback; re-running
//! the pass converges because edits are keyed by stable rule identities.
//!
//! The delete pass clears the rule set, removes every remote target and
//! verifies none survived.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::model::ReplicationRule;
use crate::domain::ports::{ClusterClient, RuleOptions, REPLICATION_SERVICE};
use crate::error::{Error, Result};
use crate::reconcile::matcher::match_rules;
use crate::reconcile::project::project_rules;
use crate::reconcile::resolver::TargetResolver;
use crate::reconcile::ensure_active;

/// The reconciliation engine for one cluster client.
///
/// Stateless apart from the client handle: every pass receives the declared
/// rules and returns the updated view, so repeated invocation converges.
pub struct Reconciler {
    client: Arc<dyn ClusterClient>,
}

impl Reconciler {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Converge the bucket's replication configuration to `declared`.
    ///
    /// Returns the declared rules with newly assigned identities and
    /// destination references written back; persisting them is what makes
    /// the next apply an in-place edit instead of a re-creation.
    #[instrument(skip(self, declared, cancel), fields(bucket = %bucket, rules = declared.len()))]
    pub async fn apply(
        &self,
        bucket: &str,
        declared: &[ReplicationRule],
        cancel: &CancellationToken,
    ) -> Result<Vec<ReplicationRule>> {
        info!("applying replication configuration");

        ensure_active(cancel)?;
        let mut config = self.client.get_replication_config(bucket).await?;
        ensure_active(cancel)?;
        let existing_targets = self
            .client
            .list_remote_targets(bucket, REPLICATION_SERVICE)
            .await?;

        let resolver = TargetResolver::new(self.client.as_ref(), bucket);
        let mut updated = declared.to_vec();
        let mut used_references: Vec<String> = Vec::with_capacity(updated.len());

        for (index, rule) in updated.iter_mut().enumerate() {
            let arn = resolver.resolve(rule, cancel).await?;

            let tag_string = rule
                .tags
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join("&");

            let mut options = RuleOptions {
                id: rule.identity.trim().to_string(),
                priority: rule.wire_priority(),
                enabled: rule.enabled,
                prefix: rule.prefix.clone(),
                tag_string,
                storage_class: rule.target.storage_class.clone(),
                destination: arn.clone(),
                delete_marker_replication: rule.delete_marker_replication,
                delete_replication: rule.delete_replication,
                existing_object_replication: rule.existing_object_replication,
                metadata_sync: rule.metadata_sync,
            };

            if options.id.is_empty() {
                let identity = new_identity();
                debug!(rule = index, identity = %identity, "adding rule");
                rule.identity = identity.clone();
                options.id = identity;
                config.add_rule(options)?;
            } else {
                debug!(rule = index, identity = %options.id, "editing rule");
                config.edit_rule(options)?;
            }

            rule.arn = arn.clone();
            used_references.push(arn);
        }

        for target in &existing_targets {
            if !used_references.contains(&target.arn) {
                debug!(arn = %target.arn, "removing remote target no longer referenced by any rule");
                ensure_active(cancel)?;
                self.client.remove_remote_target(bucket, &target.arn).await?;
            }
        }

        ensure_active(cancel)?;
        self.client.set_replication_config(bucket, &config).await?;

        info!(rules = updated.len(), "replication configuration applied");
        Ok(updated)
    }

    /// Report the bucket's current configuration in declarative shape,
    /// ordered the way the caller declared it. `last_declared` supplies the
    /// priority map for identity matching and the write-only secrets the
    /// cluster cannot return.
    #[instrument(skip(self, last_declared, cancel), fields(bucket = %bucket))]
    pub async fn read(
        &self,
        bucket: &str,
        last_declared: &[ReplicationRule],
        cancel: &CancellationToken,
    ) -> Result<Vec<ReplicationRule>> {
        debug!("reading replication configuration");

        ensure_active(cancel)?;
        let config = self.client.get_replication_config(bucket).await?;
        let matches = match_rules(&config.rules, last_declared)?;

        ensure_active(cancel)?;
        let targets = self.client.list_remote_targets(bucket, "").await?;

        project_rules(&matches, &targets, last_declared)
    }

    /// Remove the bucket's replication configuration entirely: clear the
    /// rule set, then remove every remote target. A target still present
    /// afterwards means something outside this engine holds on to it.
    #[instrument(skip(self, cancel), fields(bucket = %bucket))]
    pub async fn delete(&self, bucket: &str, cancel: &CancellationToken) -> Result<()> {
        ensure_active(cancel)?;
        let mut config = self.client.get_replication_config(bucket).await?;

        info!(rules = config.rules.len(), "disabling replication");
        config.rules.clear();

        ensure_active(cancel)?;
        self.client.set_replication_config(bucket, &config).await?;

        ensure_active(cancel)?;
        let targets = self.client.list_remote_targets(bucket, "").await?;
        for target in &targets {
            debug!(arn = %target.arn, "removing remote target");
            ensure_active(cancel)?;
            self.client.remove_remote_target(bucket, &target.arn).await?;
        }

        ensure_active(cancel)?;
        let leftover = self.client.list_remote_targets(bucket, "").await?;
        if !leftover.is_empty() {
            return Err(Error::Consistency(format!(
                "{} remote target(s) are still present on the bucket while none are expected",
                leftover.len()
            )));
        }

        info!("replication configuration removed");
        Ok(())
    }
}

/// Globally-unique rule identity, assigned once and persisted by the caller.
fn new_identity() -> String {
    Uuid::new_v4().simple().to_string()
}
