//! DriftSync - Multi-Source Document Store Reconciliation Manager
//!
//! A Rust-based reconciliation manager for a small document store cluster:
//! two independent primary nodes each own a distinct logical dataset, and a
//! group of replica nodes converges to hold the union of both datasets,
//! resolving conflicting updates by recency.
//!
//! # Architecture
//!
//! DriftSync has no central authority and no durable state of its own. Each
//! scheduled cycle reads full collection snapshots from every node, merges
//! them by content-derived logical identity with a last-write-wins rule on
//! `created_at`, and rewrites diverged replicas wholesale. Storage-assigned
//! identifiers are regenerated on every write and never used for matching.
//!
//! Every step is idempotent: a cycle that partially fails leaves the
//! affected node stale until the next cycle re-merges it.
//!
//! # Features
//!
//! - Content-derived document identity (`name:email`, storage-id fallback)
//! - Ordered last-write-wins merge with parsed-timestamp recency
//! - Whole-group replica convergence (no per-replica diffing)
//! - Primary ingestion that never erases replica-only documents
//! - Per-unit failure isolation with structured cycle reports
//! - Configurable retry/backoff for node readiness and connects

pub mod config;
pub mod document;
pub mod error;
pub mod merge;
pub mod node;
pub mod retry;
pub mod sync;

pub use config::SyncConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SyncConfig;
    pub use crate::document::{DocKey, Document};
    pub use crate::error::{Error, Result};
    pub use crate::merge::{merge, MergedSet};
    pub use crate::node::{MariaDbNode, MemoryNode, NodeClient};
    pub use crate::retry::RetryPolicy;
    pub use crate::sync::{CycleReport, PrimarySource, SyncCycle};
}
