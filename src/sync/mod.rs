//! Reconciliation engines and the cycle orchestrator.
//!
//! `converge` brings the replica group to one identical state, `ingest`
//! folds a primary's dataset into each replica, and `cycle` sequences the
//! two (converge, ingest, converge) and reports per-unit outcomes.

pub mod converge;
pub mod cycle;
pub mod ingest;

pub use converge::converge_replicas;
pub use cycle::{CycleReport, PrimarySource, SyncCycle, SyncStep, UnitReport};
pub use ingest::ingest_from_primary;
