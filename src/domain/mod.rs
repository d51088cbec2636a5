//! Domain Layer
//!
//! Core domain types for bucket replication, organized into:
//!
//! - **Model** (`model.rs`) - Declared-state records: the rules and targets a
//!   caller wants the cluster to converge to
//! - **Ports** (`ports.rs`) - The cluster client abstraction and the remote
//!   wire value objects it exchanges

pub mod model;
pub mod ports;

// Re-export commonly used types
pub use model::{validate_bucket_name, PathStyle, ReplicationRule, ReplicationTarget};
pub use ports::{
    ClusterClient, RemoteAndFilter, RemoteConfig, RemoteFilter, RemoteRule, RemoteTag,
    RemoteTarget, RuleOptions, RuleStatus, TargetDescriptor, API_SIGNATURE, REPLICATION_SERVICE,
};
