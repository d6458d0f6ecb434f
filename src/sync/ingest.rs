//! Primary Ingestion Engine.
//!
//! Folds a primary's dataset into every replica without discarding
//! replica-only documents. Each replica is merged replica-first, so a
//! replica's own copy of a key wins ties against a stale primary
//! re-announcing the same key.

use std::sync::Arc;

use crate::error::Result;
use crate::merge::merge;
use crate::node::NodeClient;

/// Ingest one primary's collection into every replica.
///
/// An empty primary is a no-op: primaries are never net-negative sources.
/// Each replica is processed independently; a fetch or write failure on one
/// replica is logged and the rest are still processed, with the first error
/// returned at the end.
pub async fn ingest_from_primary(
    primary: &Arc<dyn NodeClient>,
    replicas: &[Arc<dyn NodeClient>],
    database: &str,
    collection: &str,
) -> Result<()> {
    let primary_docs = primary.fetch_all(database, collection).await?;
    if primary_docs.is_empty() {
        tracing::debug!(
            node = %primary.name(),
            "primary has no documents in {}.{}, nothing to ingest",
            database,
            collection
        );
        return Ok(());
    }

    tracing::debug!(
        node = %primary.name(),
        "ingesting {} documents from {}.{}",
        primary_docs.len(),
        database,
        collection
    );

    let mut first_error = None;
    for replica in replicas {
        let result = async {
            let replica_docs = replica.fetch_all(database, collection).await?;
            // Replica first: its copy of a key wins ties against the primary.
            let merged = merge(&[replica_docs, primary_docs.clone()]);
            replica
                .replace_all(database, collection, merged.into_documents())
                .await
        }
        .await;

        if let Err(e) = result {
            tracing::error!(node = %replica.name(), "ingestion failed: {e}");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
