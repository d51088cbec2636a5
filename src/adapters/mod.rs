//! Infrastructure Adapters
//!
//! Implementations of the [`ClusterClient`](crate::domain::ports::ClusterClient)
//! port, following the Port/Adapter (Hexagonal) architecture pattern:
//!
//! - [`RestClusterClient`] - JSON admin API of a live cluster over HTTP
//! - [`MemoryCluster`] - in-process fake cluster for tests and local
//!   experiments; records every call it serves
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use replistor::adapters::RestClusterClient;
//! use replistor::reconcile::Reconciler;
//!
//! let client = RestClusterClient::new("https://admin.cluster:9000", token)?;
//! let reconciler = Reconciler::new(Arc::new(client));
//! ```

pub mod http;
pub mod memory;

pub use http::RestClusterClient;
pub use memory::{MemoryCluster, RecordedCall};
