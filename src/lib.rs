//! Replistor - Declarative Bucket-Replication Reconciler
//!
//! Reconciles a declared, ordered set of bucket-replication rules (and their
//! remote-replication targets) against the live state of an S3-compatible
//! object storage cluster, issuing the minimal remote calls needed to
//! converge while keeping rule and target identity stable across repeated
//! runs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Declaration (YAML)  ──decode──▶  ReplicationRule records        │
//! │                                          │                       │
//! │            apply:  resolve targets ──▶ add/edit rules ──▶ API    │
//! │            read:   match identities ──▶ project state ◀── API    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cluster is the sole source of truth and the sole authority for
//! destination references; the engine holds no mutable state between passes.
//! Secrets are write-only on the cluster side and carried forward from
//! last-known declared state.
//!
//! # Modules
//!
//! - [`adapters`] - Infrastructure adapters implementing the cluster port
//! - [`decl`] - Declarative schema, decode/encode front door
//! - [`domain`] - Declared-state model and the cluster client port
//! - [`error`] - Error types
//! - [`path`] - Composite target path handling
//! - [`reconcile`] - The reconciliation engine (apply/read/delete passes)
//! - [`statefile`] - Last-applied state persistence for the host binary
//! - [`units`] - Byte-size and duration codecs

pub mod adapters;
pub mod decl;
pub mod domain;
pub mod error;
pub mod path;
pub mod reconcile;
pub mod statefile;
pub mod units;

// Re-export commonly used types
pub use decl::{decode_rules, encode_rules, BucketReplicationSpec};
pub use domain::model::{PathStyle, ReplicationRule, ReplicationTarget};
pub use domain::ports::{ClusterClient, RemoteConfig, RemoteRule, RemoteTarget};
pub use error::{Error, FieldIssue, Result};
pub use reconcile::Reconciler;
