//! Node clients.
//!
//! A node is one addressable storage endpoint holding named collections.
//! The `NodeClient` trait is the thin operation surface the reconciliation
//! engines work against: fetch the whole snapshot, replace the whole
//! collection, ping. Implementations: MariaDB-backed (production) and
//! in-memory (tests).

mod mariadb;
mod memory;

pub use mariadb::MariaDbNode;
pub use memory::MemoryNode;

use std::time::Duration;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::Result;

/// Operation surface over a single storage node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Node identifier for logs and reports
    fn name(&self) -> &str;

    /// Fetch the full contents of one collection.
    ///
    /// Returns the whole current snapshot or an error, never a partial set.
    async fn fetch_all(&self, database: &str, collection: &str) -> Result<Vec<Document>>;

    /// Replace the full contents of one collection.
    ///
    /// Deletes everything, then bulk-inserts the given documents with
    /// freshly generated storage identifiers. Destructive: a document that
    /// was only reachable by its storage id is unrecoverable afterwards.
    async fn replace_all(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<()>;

    /// Whether the node answers within the timeout.
    async fn ping(&self, timeout: Duration) -> bool;
}
