//! Two-tier distributed token bucket: one global pool, one cache per node.

pub mod global;
pub mod local;

pub use global::{GlobalBucket, Grant};
pub use local::{LocalBucket, RefillPolicy};
