//! Reconciliation Engine
//!
//! Converges the cluster's replication state to the declared state:
//!
//! - **Resolver** (`resolver.rs`) - derives a remote-target descriptor per
//!   declared rule and upserts it, yielding the destination reference
//! - **Apply** (`apply.rs`) - the diff/apply pass (add/edit rules, remove
//!   unreferenced targets) and the delete pass
//! - **Matcher** (`matcher.rs`) - re-associates remote rules with declared
//!   positions by priority, with destination references as the tiebreak check
//! - **Project** (`project.rs`) - rebuilds declarative rule records from
//!   remote state for reporting current state back to the caller
//!
//! The engine holds no mutable state of its own; every pass reads what it
//! needs, issues blocking calls in declared order and returns. Cancellation
//! is cooperative: the token is consulted before each remote call, and calls
//! already issued are never undone.

mod apply;
mod matcher;
mod project;
mod resolver;

pub use apply::Reconciler;
pub use matcher::{match_rules, RuleMatches};
pub use project::project_rules;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Bail out with [`Error::Cancelled`] if the caller gave up; checked before
/// every remote call so a cancelled pass skips exactly the calls not yet
/// issued.
pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_active_reflects_token_state() {
        let token = CancellationToken::new();
        assert!(ensure_active(&token).is_ok());
        token.cancel();
        assert!(matches!(ensure_active(&token), Err(Error::Cancelled)));
    }
}
