//! Declarative Surface
//!
//! Schema types for the YAML bucket-replication declaration, the decode
//! function that turns them into typed domain records (collecting
//! field-path-tagged validation issues), and the encode direction used to
//! report projected state back in declarative shape.

mod bucket_replication;

pub use bucket_replication::{
    decode_rules, encode_rules, BucketReplicationSpec, RuleSpec, TargetSpec, MAX_RULES_PER_BUCKET,
};
