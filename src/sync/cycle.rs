//! Sync Cycle Orchestrator.
//!
//! One reconciliation cycle runs, per configured dataset, in a fixed order:
//! converge the replicas (absorbs direct replica writes since the last
//! cycle), ingest each primary, then converge again. Ingestion writes to
//! each replica independently and can partially fail, so the closing
//! convergence is what guarantees all replicas end the cycle with identical
//! content. Every unit failure is caught here; the cycle always attempts
//! every remaining unit and reports per-unit outcomes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::node::NodeClient;
use crate::retry::RetryPolicy;
use crate::sync::{converge_replicas, ingest_from_primary};

/// A primary node together with the dataset it owns.
pub struct PrimarySource {
    pub node: Arc<dyn NodeClient>,
    pub database: String,
}

/// The step a unit belongs to, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    PreConverge,
    Ingest,
    PostConverge,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStep::PreConverge => f.write_str("pre-converge"),
            SyncStep::Ingest => f.write_str("ingest"),
            SyncStep::PostConverge => f.write_str("post-converge"),
        }
    }
}

/// Outcome of one unit of work within a cycle.
#[derive(Debug)]
pub struct UnitReport {
    pub step: SyncStep,
    pub database: String,
    /// Primary node name for ingest units
    pub source: Option<String>,
    /// The failure, when the unit did not succeed
    pub error: Option<Error>,
}

impl UnitReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for UnitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.step, self.database)?;
        if let Some(source) = &self.source {
            write!(f, " from {source}")?;
        }
        match &self.error {
            None => write!(f, ": ok"),
            Some(e) => write!(f, ": {e}"),
        }
    }
}

/// Per-unit outcomes of one reconciliation cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub units: Vec<UnitReport>,
}

impl CycleReport {
    /// Whether every unit succeeded
    pub fn is_success(&self) -> bool {
        self.units.iter().all(UnitReport::succeeded)
    }

    /// The units that failed
    pub fn failures(&self) -> Vec<&UnitReport> {
        self.units.iter().filter(|u| !u.succeeded()).collect()
    }

    fn record(&mut self, step: SyncStep, database: &str, source: Option<&str>, result: Result<()>) {
        let unit = UnitReport {
            step,
            database: database.to_string(),
            source: source.map(str::to_string),
            error: result.err(),
        };
        match &unit.error {
            None => tracing::info!("{unit}"),
            Some(_) => tracing::warn!("{unit}"),
        }
        self.units.push(unit);
    }
}

/// Orchestrates reconciliation cycles over a fixed topology.
pub struct SyncCycle {
    primaries: Vec<PrimarySource>,
    replicas: Vec<Arc<dyn NodeClient>>,
    collection: String,
}

impl SyncCycle {
    pub fn new(
        primaries: Vec<PrimarySource>,
        replicas: Vec<Arc<dyn NodeClient>>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            primaries,
            replicas,
            collection: collection.into(),
        }
    }

    /// The distinct datasets this cycle reconciles, in primary order.
    fn databases(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for primary in &self.primaries {
            if !seen.contains(&primary.database.as_str()) {
                seen.push(&primary.database);
            }
        }
        seen
    }

    /// Wait until every node in the topology answers a ping.
    ///
    /// Readiness gate before the first cycle. Provisioning guarantees the
    /// nodes exist; this only waits out their startup.
    pub async fn wait_until_ready(
        &self,
        policy: RetryPolicy,
        ping_timeout: Duration,
    ) -> Result<()> {
        let nodes = self
            .primaries
            .iter()
            .map(|p| &p.node)
            .chain(self.replicas.iter());

        for node in nodes {
            policy
                .run(&format!("ping {}", node.name()), || async move {
                    if node.ping(ping_timeout).await {
                        Ok(())
                    } else {
                        Err(Error::ConnectionTimeout(node.name().to_string()))
                    }
                })
                .await?;
            tracing::info!(node = %node.name(), "node is ready");
        }
        Ok(())
    }

    /// Run one reconciliation cycle and report every unit's outcome.
    pub async fn run(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let collection = self.collection.as_str();

        // Pre-pass: absorb direct writes made to replicas since last cycle.
        for database in self.databases() {
            let result = converge_replicas(&self.replicas, database, collection).await;
            report.record(SyncStep::PreConverge, database, None, result.map(|_| ()));
        }

        // Pull externally-originated data from each primary.
        for primary in &self.primaries {
            let result = ingest_from_primary(
                &primary.node,
                &self.replicas,
                &primary.database,
                collection,
            )
            .await;
            report.record(
                SyncStep::Ingest,
                &primary.database,
                Some(primary.node.name()),
                result,
            );
        }

        // Post-pass: close the window ingestion opened by writing to each
        // replica independently.
        for database in self.databases() {
            let result = converge_replicas(&self.replicas, database, collection).await;
            report.record(SyncStep::PostConverge, database, None, result.map(|_| ()));
        }

        if report.is_success() {
            tracing::info!("reconciliation cycle complete, {} units ok", report.units.len());
        } else {
            tracing::warn!(
                "reconciliation cycle complete with {} failed of {} units",
                report.failures().len(),
                report.units.len()
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::testutil::doc;
    use crate::document::{DocKey, Document};
    use crate::node::MemoryNode;
    use std::collections::BTreeMap;

    const COLLECTION: &str = "users";

    fn user(name: &str, created_at: &str) -> Document {
        doc(&[
            ("name", name),
            ("email", &format!("{name}@x.com")),
            ("created_at", created_at),
        ])
    }

    struct Fixture {
        primaries: Vec<Arc<MemoryNode>>,
        replicas: Vec<Arc<MemoryNode>>,
        cycle: SyncCycle,
    }

    fn fixture() -> Fixture {
        let primaries: Vec<Arc<MemoryNode>> = (1..=2)
            .map(|i| Arc::new(MemoryNode::new(format!("node{i}"))))
            .collect();
        let replicas: Vec<Arc<MemoryNode>> = (1..=3)
            .map(|i| Arc::new(MemoryNode::new(format!("replica{i}"))))
            .collect();

        let sources = primaries
            .iter()
            .enumerate()
            .map(|(i, node)| PrimarySource {
                node: Arc::clone(node) as Arc<dyn NodeClient>,
                database: format!("appdb{}", i + 1),
            })
            .collect();
        let replica_clients = replicas
            .iter()
            .map(|n| Arc::clone(n) as Arc<dyn NodeClient>)
            .collect();

        Fixture {
            cycle: SyncCycle::new(sources, replica_clients, COLLECTION),
            primaries,
            replicas,
        }
    }

    /// A replica's collection as id-stripped content, keyed by identity.
    fn contents(replica: &MemoryNode, database: &str) -> BTreeMap<DocKey, Document> {
        replica
            .documents(database, COLLECTION)
            .iter()
            .map(|d| (d.key(), d.without_id()))
            .collect()
    }

    fn assert_replicas_equal(replicas: &[Arc<MemoryNode>], database: &str) {
        let reference = contents(&replicas[0], database);
        for replica in &replicas[1..] {
            assert_eq!(
                contents(replica, database),
                reference,
                "replica {} diverges in {database}",
                replica.name()
            );
        }
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        // Replica A holds alice@T1, replica B holds bob@T2, the primary
        // re-announces alice with a stale T0.
        let f = fixture();
        f.replicas[0].seed("appdb1", COLLECTION, vec![user("alice", "2024-02-01T00:00:00")]);
        f.replicas[1].seed("appdb1", COLLECTION, vec![user("bob", "2024-02-02T00:00:00")]);
        f.primaries[0].seed("appdb1", COLLECTION, vec![user("alice", "2024-01-15T00:00:00")]);

        let report = f.cycle.run().await;
        assert!(report.is_success());

        for replica in &f.replicas {
            let docs = replica.documents("appdb1", COLLECTION);
            assert_eq!(docs.len(), 2);
            let alice = docs.iter().find(|d| d.str_field("name") == "alice").unwrap();
            let bob = docs.iter().find(|d| d.str_field("name") == "bob").unwrap();
            assert_eq!(alice.created_at(), "2024-02-01T00:00:00");
            assert_eq!(bob.created_at(), "2024-02-02T00:00:00");
        }
    }

    #[tokio::test]
    async fn test_convergence_closure_across_both_datasets() {
        let f = fixture();
        f.primaries[0].seed("appdb1", COLLECTION, vec![user("alice", "2024-01-01T00:00:00")]);
        f.primaries[1].seed("appdb2", COLLECTION, vec![user("carol", "2024-01-03T00:00:00")]);
        f.replicas[2].seed("appdb2", COLLECTION, vec![user("dave", "2024-01-04T00:00:00")]);

        let report = f.cycle.run().await;
        assert!(report.is_success());
        // 2 pre-converge + 2 ingest + 2 post-converge
        assert_eq!(report.units.len(), 6);

        assert_replicas_equal(&f.replicas, "appdb1");
        assert_replicas_equal(&f.replicas, "appdb2");
        assert_eq!(f.replicas[0].documents("appdb2", COLLECTION).len(), 2);
    }

    #[tokio::test]
    async fn test_cycle_is_idempotent() {
        let f = fixture();
        f.primaries[0].seed("appdb1", COLLECTION, vec![user("alice", "2024-01-01T00:00:00")]);

        f.cycle.run().await;
        let settled: Vec<_> = f
            .replicas
            .iter()
            .map(|r| contents(r, "appdb1"))
            .collect();

        let report = f.cycle.run().await;
        assert!(report.is_success());
        for (replica, before) in f.replicas.iter().zip(&settled) {
            assert_eq!(&contents(replica, "appdb1"), before);
        }
    }

    #[tokio::test]
    async fn test_conflicting_versions_converge_in_one_cycle() {
        // Every replica holds its own version of the same document, so the
        // key sets are identical everywhere; one cycle must still leave all
        // replicas on the most recent version.
        let f = fixture();
        f.replicas[0].seed("appdb1", COLLECTION, vec![user("alice", "2024-02-01T00:00:00")]);
        f.replicas[1].seed("appdb1", COLLECTION, vec![user("alice", "2024-03-01T00:00:00")]);
        f.replicas[2].seed("appdb1", COLLECTION, vec![user("alice", "2024-02-15T00:00:00")]);

        let report = f.cycle.run().await;
        assert!(report.is_success());

        for replica in &f.replicas {
            let docs = replica.documents("appdb1", COLLECTION);
            assert_eq!(docs.len(), 1);
            assert_eq!(docs[0].created_at(), "2024-03-01T00:00:00");
        }
        assert_replicas_equal(&f.replicas, "appdb1");
    }

    #[tokio::test]
    async fn test_failed_unit_does_not_abort_the_rest() {
        let f = fixture();
        f.primaries[0].fail_reads(true);
        f.primaries[0].seed("appdb1", COLLECTION, vec![user("alice", "2024-01-01T00:00:00")]);
        f.primaries[1].seed("appdb2", COLLECTION, vec![user("carol", "2024-01-03T00:00:00")]);

        let report = f.cycle.run().await;
        assert!(!report.is_success());

        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].step, SyncStep::Ingest);
        assert_eq!(failures[0].database, "appdb1");
        assert_eq!(failures[0].source.as_deref(), Some("node1"));

        // The other primary's dataset still made it to every replica.
        for replica in &f.replicas {
            assert_eq!(replica.documents("appdb2", COLLECTION).len(), 1);
        }
    }

    #[tokio::test]
    async fn test_post_converge_repairs_partial_ingestion() {
        // One replica rejects the ingest write but accepts the post-pass
        // rewrite: the closing convergence reruns against fresh reads, so a
        // transient mid-cycle failure still ends in a converged group.
        let f = fixture();
        f.primaries[0].seed("appdb1", COLLECTION, vec![user("alice", "2024-01-01T00:00:00")]);
        f.replicas[1].fail_writes(true);

        let report = f.cycle.run().await;
        assert!(!report.is_success());

        f.replicas[1].fail_writes(false);
        let report = f.cycle.run().await;
        assert!(report.is_success());
        assert_replicas_equal(&f.replicas, "appdb1");
        assert_eq!(f.replicas[1].documents("appdb1", COLLECTION).len(), 1);
    }

    #[tokio::test]
    async fn test_wait_until_ready() {
        let f = fixture();
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        f.cycle
            .wait_until_ready(policy, Duration::from_millis(10))
            .await
            .unwrap();

        f.replicas[1].set_unreachable(true);
        let err = f
            .cycle
            .wait_until_ready(policy, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { .. }));
    }
}
