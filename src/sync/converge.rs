//! Replica Convergence Engine.
//!
//! Brings every replica's copy of one collection to the same reconciled
//! content. The group is read in replica-list order, merged in that order,
//! and rewritten as a whole: once any replica's content diverges from the
//! reconciled set (ignoring storage identifiers), all replicas are rewritten
//! together. The divergence check covers versions, not just keys, so two
//! replicas holding the same key with different `created_at` values still
//! trigger the rewrite and settle on the most recent one.

use std::sync::Arc;

use crate::document::Document;
use crate::error::Result;
use crate::merge::merge;
use crate::node::NodeClient;

/// Converge all replicas for one (database, collection) pair.
///
/// Returns whether the replicas were rewritten. A fetch failure aborts the
/// whole unit before any write: rewriting the group from an incomplete read
/// set would drop the unread replica's documents. A write failure on one
/// replica is logged and the remaining replicas are still written; the first
/// write error is returned after all writes were attempted.
pub async fn converge_replicas(
    replicas: &[Arc<dyn NodeClient>],
    database: &str,
    collection: &str,
) -> Result<bool> {
    if replicas.is_empty() {
        return Ok(false);
    }

    // All reads happen before any write.
    let mut sets: Vec<Vec<Document>> = Vec::with_capacity(replicas.len());
    for replica in replicas {
        let docs = replica.fetch_all(database, collection).await?;
        tracing::debug!(
            node = %replica.name(),
            "fetched {} documents from {}.{}",
            docs.len(),
            database,
            collection
        );
        sets.push(docs);
    }

    let merged = merge(&sets);
    let diverged = sets.iter().any(|set| !merged.matches(set));

    if !diverged {
        tracing::debug!(
            "replicas already converged for {}.{} ({} documents)",
            database,
            collection,
            merged.len()
        );
        return Ok(false);
    }

    tracing::info!(
        "rewriting {} replicas for {}.{} with {} documents",
        replicas.len(),
        database,
        collection,
        merged.len()
    );

    let documents = merged.into_documents();
    let mut first_error = None;
    for replica in replicas {
        if let Err(e) = replica
            .replace_all(database, collection, documents.clone())
            .await
        {
            tracing::error!(node = %replica.name(), "replica rewrite failed: {e}");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(true),
    }
}
