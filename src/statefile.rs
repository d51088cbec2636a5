//! Last-Applied State
//!
//! The engine assigns rule identities and destination references on first
//! apply, and the cluster never returns target secrets; both have to be
//! carried between invocations by the caller. The host binary keeps them in
//! a small JSON state file and merges them into each freshly decoded
//! declaration.
//!
//! Correlation during the merge is positional, mirroring how secrets are
//! recovered on read. If the declared list shrinks or reorders between
//! applies, entries can attach to the wrong position; the read path keeps
//! the same convention so the two stay consistent.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::model::ReplicationRule;
use crate::error::{Error, Result};

/// Persisted record of the last successful apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub bucket: String,
    pub applied_at: DateTime<Utc>,
    pub rules: Vec<ReplicationRule>,
}

impl StateFile {
    pub fn new(bucket: impl Into<String>, rules: Vec<ReplicationRule>) -> Self {
        Self {
            bucket: bucket.into(),
            applied_at: Utc::now(),
            rules,
        }
    }

    /// Load a state file; a missing file is simply "no prior state".
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("unreadable state file {:?}: {}", path, e)))?;
        Ok(Some(state))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("unable to serialize state: {}", e)))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Fold last-applied identities, references and secrets into freshly decoded
/// rules, by position. The declaration always wins where it says something;
/// the state only fills what the declaration cannot know.
pub fn merge_last_applied(rules: &mut [ReplicationRule], last_applied: &[ReplicationRule]) {
    for (rule, known) in rules.iter_mut().zip(last_applied) {
        if !rule.has_identity() {
            rule.identity = known.identity.clone();
        }
        if rule.arn.is_empty() {
            rule.arn = known.arn.clone();
        }
        if rule.target.secret_key.is_none() {
            rule.target.secret_key = known.target.secret_key.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{PathStyle, ReplicationTarget};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn rule(identity: &str, secret: Option<&str>) -> ReplicationRule {
        ReplicationRule {
            identity: identity.to_string(),
            arn: if identity.is_empty() {
                String::new()
            } else {
                format!("arn:replistor:replication::0:{}", identity)
            },
            priority: 1,
            enabled: true,
            prefix: String::new(),
            tags: BTreeMap::new(),
            delete_marker_replication: false,
            delete_replication: false,
            existing_object_replication: false,
            metadata_sync: false,
            target: ReplicationTarget {
                bucket: "backup".to_string(),
                host: "replica:9000".to_string(),
                region: String::new(),
                storage_class: String::new(),
                path: String::new(),
                secure: true,
                path_style: PathStyle::Auto,
                synchronous: false,
                health_check_period: Duration::from_secs(30),
                bandwidth_limit: 0,
                access_key: "key".to_string(),
                secret_key: secret.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_merge_fills_identity_and_secret_from_state() {
        let mut rules = vec![rule("", None)];
        let last = vec![rule("abc123", Some("hunter2"))];

        merge_last_applied(&mut rules, &last);
        assert_eq!(rules[0].identity, "abc123");
        assert!(rules[0].arn.ends_with(":abc123"));
        assert_eq!(rules[0].target.secret_key.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_merge_never_overwrites_declared_values() {
        let mut rules = vec![rule("declared-id", Some("new-secret"))];
        let last = vec![rule("old-id", Some("old-secret"))];

        merge_last_applied(&mut rules, &last);
        assert_eq!(rules[0].identity, "declared-id");
        assert_eq!(rules[0].target.secret_key.as_deref(), Some("new-secret"));
    }

    #[test]
    fn test_merge_tolerates_length_mismatch() {
        let mut rules = vec![rule("", None), rule("", None)];
        let last = vec![rule("only-one", Some("s"))];

        merge_last_applied(&mut rules, &last);
        assert_eq!(rules[0].identity, "only-one");
        assert_eq!(rules[1].identity, "");
        assert_eq!(rules[1].target.secret_key, None);
    }

    #[test]
    fn test_state_round_trips_through_disk() {
        let dir = std::env::temp_dir().join("replistor-state-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");

        let state = StateFile::new("source", vec![rule("abc123", Some("hunter2"))]);
        state.save(&path).unwrap();

        let loaded = StateFile::load(&path).unwrap().expect("state should exist");
        assert_eq!(loaded.bucket, "source");
        assert_eq!(loaded.rules, state.rules);

        std::fs::remove_file(&path).unwrap();
        assert!(StateFile::load(&path).unwrap().is_none());
    }
}
