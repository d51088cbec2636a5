//! Identity Matching
//!
//! Re-associates each remote rule with the position its declaration occupies
//! in the caller's rule list, so read-backs never re-order unrelated rules.
//! Priority is the primary key: positive priorities are caller-supplied and
//! unique, while auto-assigned rules carry the synthetic `-(index + 1)`
//! ordinal locally and its absolute value on the wire, so their wire priority
//! never hits the map and they fall back to remote list position.

use std::collections::HashMap;

use crate::domain::model::ReplicationRule;
use crate::domain::ports::RemoteRule;
use crate::error::{Error, Result};

/// The outcome of matching a remote rule list against declared state.
#[derive(Debug)]
pub struct RuleMatches<'a> {
    /// Each remote rule paired with the declared index it belongs to.
    pub matched: Vec<(usize, &'a RemoteRule)>,
    /// Destination reference → declared index, for target correlation.
    pub by_reference: HashMap<String, usize>,
}

/// Match remote rules to declared positions.
///
/// Two remote rules resolving to the same destination reference cannot be
/// disambiguated and are rejected as external interference.
pub fn match_rules<'a>(
    remote_rules: &'a [RemoteRule],
    declared: &[ReplicationRule],
) -> Result<RuleMatches<'a>> {
    let mut priority_to_index: HashMap<i32, usize> = HashMap::with_capacity(declared.len());
    for (index, rule) in declared.iter().enumerate() {
        priority_to_index.insert(rule.priority_key(index), index);
    }

    let mut matched = Vec::with_capacity(remote_rules.len());
    let mut by_reference: HashMap<String, usize> = HashMap::with_capacity(remote_rules.len());

    for (position, remote) in remote_rules.iter().enumerate() {
        let index = priority_to_index
            .get(&remote.priority)
            .copied()
            .unwrap_or(position);

        if by_reference
            .insert(remote.destination.clone(), index)
            .is_some()
        {
            return Err(Error::Consistency(format!(
                "two replication rules reference the same destination {:?}",
                remote.destination
            )));
        }
        matched.push((index, remote));
    }

    Ok(RuleMatches {
        matched,
        by_reference,
    })
}
