//! State Projection
//!
//! The inverse of the apply pass: rebuilds declarative rule records from the
//! cluster's rule set and target list, in original declared order. The
//! cluster never returns target secrets, so the projector carries the secret
//! forward from the last-known declared rule at the same position, and
//! leaves it unset when no such rule exists, rather than inventing or
//! clearing one.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::model::{PathStyle, ReplicationRule, ReplicationTarget};
use crate::domain::ports::RemoteTarget;
use crate::error::{Error, Result};
use crate::path;
use crate::reconcile::matcher::RuleMatches;

/// Project matched remote state into declarative rule records.
pub fn project_rules(
    matches: &RuleMatches<'_>,
    remote_targets: &[RemoteTarget],
    last_declared: &[ReplicationRule],
) -> Result<Vec<ReplicationRule>> {
    if remote_targets.len() != matches.matched.len() {
        return Err(Error::Consistency(format!(
            "inconsistent number of remote targets and replication rules ({} != {})",
            remote_targets.len(),
            matches.matched.len()
        )));
    }

    let mut projected: BTreeMap<usize, ReplicationRule> = BTreeMap::new();

    for (index, remote) in &matches.matched {
        let known = last_declared.get(*index);

        // Negate back to the synthetic sign only when the wire priority is
        // the absolute value of a known auto-assigned priority.
        let mut priority = remote.priority;
        if let Some(declared) = known {
            if priority == -declared.priority {
                priority = -priority;
            }
        }

        projected.insert(
            *index,
            ReplicationRule {
                identity: remote.id.clone(),
                arn: remote.destination.clone(),
                priority,
                enabled: remote.status.is_enabled(),
                prefix: remote.prefix().to_string(),
                tags: remote.tag_map(),
                delete_marker_replication: remote.delete_marker_replication.is_enabled(),
                delete_replication: remote.delete_replication.is_enabled(),
                existing_object_replication: remote.existing_object_replication.is_enabled(),
                metadata_sync: remote.replica_modifications.is_enabled(),
                target: ReplicationTarget {
                    bucket: String::new(),
                    host: String::new(),
                    region: String::new(),
                    storage_class: remote.storage_class.clone(),
                    path: String::new(),
                    secure: true,
                    path_style: PathStyle::Auto,
                    synchronous: false,
                    health_check_period: Default::default(),
                    bandwidth_limit: 0,
                    access_key: String::new(),
                    secret_key: known.and_then(|rule| rule.target.secret_key.clone()),
                },
            },
        );
    }

    for remote_target in remote_targets {
        let Some(index) = matches.by_reference.get(&remote_target.arn) else {
            return Err(Error::Consistency(format!(
                "no replication rule references remote target {:?}",
                remote_target.arn
            )));
        };
        // Every reference in the map came from a matched rule, so the slot
        // exists.
        let Some(rule) = projected.get_mut(index) else {
            continue;
        };

        debug!(arn = %remote_target.arn, path = %remote_target.target_bucket, "projecting remote target");

        let (bucket, sub_path) = path::decompose(&remote_target.target_bucket);
        let target = &mut rule.target;
        target.bucket = bucket;
        target.path = sub_path;
        target.host = remote_target.endpoint.clone();
        target.secure = remote_target.secure;
        target.path_style = PathStyle::parse(&remote_target.path_style).unwrap_or_default();
        target.synchronous = remote_target.replication_sync;
        target.health_check_period = remote_target.health_check_period;
        target.bandwidth_limit = remote_target.bandwidth_limit;
        target.region = remote_target.region.clone();
        target.access_key = remote_target.access_key.clone();
    }

    Ok(projected.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{RemoteRule, RuleStatus};
    use crate::reconcile::matcher::match_rules;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn remote_rule(priority: i32, destination: &str) -> RemoteRule {
        RemoteRule {
            id: format!("id-{}", priority),
            status: RuleStatus::Enabled,
            priority,
            destination: destination.to_string(),
            ..Default::default()
        }
    }

    fn remote_target(arn: &str, target_bucket: &str) -> RemoteTarget {
        RemoteTarget {
            arn: arn.to_string(),
            endpoint: "replica.example.com:9000".to_string(),
            target_bucket: target_bucket.to_string(),
            secure: true,
            path_style: "auto".to_string(),
            access_key: "replicator".to_string(),
            region: "eu-west-1".to_string(),
            bandwidth_limit: 100_000_000,
            health_check_period: Duration::from_secs(30),
            replication_sync: false,
        }
    }

    fn declared_with_secret(priority: i32, secret: Option<&str>) -> ReplicationRule {
        ReplicationRule {
            identity: "known".to_string(),
            arn: String::new(),
            priority,
            enabled: true,
            prefix: String::new(),
            tags: Default::default(),
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
                access_key: "replicator".to_string(),
                secret_key: secret.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_projects_target_fields_and_composite_path() {
        let declared = vec![declared_with_secret(0, Some("hunter2"))];
        let remote_rules = vec![remote_rule(1, "arn:x:backup")];
        let targets = vec![remote_target("arn:x:backup", "tenants/a/backup")];

        let matches = match_rules(&remote_rules, &declared).unwrap();
        let projected = project_rules(&matches, &targets, &declared).unwrap();

        assert_eq!(projected.len(), 1);
        let rule = &projected[0];
        assert_eq!(rule.target.bucket, "backup");
        assert_eq!(rule.target.path, "tenants/a");
        assert_eq!(rule.target.host, "replica.example.com:9000");
        assert_eq!(rule.target.bandwidth_limit, 100_000_000);
        assert_eq!(rule.target.region, "eu-west-1");
        // Synthetic priority restored to its negative sign.
        assert_eq!(rule.priority, -1);
        // Secret carried forward from last-known declared state.
        assert_eq!(rule.target.secret_key.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_projects_no_secret_when_declared_list_shrank() {
        // Two remote rules but only one last-known declared rule: position 1
        // has nobody to borrow a secret from and must stay unset.
        let declared = vec![declared_with_secret(10, Some("hunter2"))];
        let remote_rules = vec![remote_rule(10, "arn:a:backup"), remote_rule(2, "arn:b:other")];
        let targets = vec![
            remote_target("arn:a:backup", "backup"),
            remote_target("arn:b:other", "other"),
        ];

        let matches = match_rules(&remote_rules, &declared).unwrap();
        let projected = project_rules(&matches, &targets, &declared).unwrap();

        assert_eq!(projected.len(), 2);
        assert_eq!(projected[0].target.secret_key.as_deref(), Some("hunter2"));
        assert_eq!(projected[1].target.secret_key, None);
    }

    #[test]
    fn test_count_mismatch_is_fatal() {
        let declared = vec![declared_with_secret(10, None)];
        let remote_rules = vec![remote_rule(10, "arn:a:backup")];

        let matches = match_rules(&remote_rules, &declared).unwrap();
        assert_matches!(
            project_rules(&matches, &[], &declared),
            Err(Error::Consistency(message)) if message.contains("0 != 1")
        );
    }

    #[test]
    fn test_orphaned_reference_is_fatal() {
        let declared = vec![declared_with_secret(10, None)];
        let remote_rules = vec![remote_rule(10, "arn:a:backup")];
        let targets = vec![remote_target("arn:ghost:other", "other")];

        let matches = match_rules(&remote_rules, &declared).unwrap();
        assert_matches!(
            project_rules(&matches, &targets, &declared),
            Err(Error::Consistency(message)) if message.contains("arn:ghost:other")
        );
    }

    #[test]
    fn test_positive_priority_is_not_negated() {
        let declared = vec![declared_with_secret(10, None)];
        let remote_rules = vec![remote_rule(10, "arn:a:backup")];
        let targets = vec![remote_target("arn:a:backup", "backup")];

        let matches = match_rules(&remote_rules, &declared).unwrap();
        let projected = project_rules(&matches, &targets, &declared).unwrap();
        assert_eq!(projected[0].priority, 10);
    }
}
