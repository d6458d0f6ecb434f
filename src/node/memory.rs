//! In-memory node client.
//!
//! Same semantics as the MariaDB backend but everything lives in memory:
//! storage identifiers come from a per-node counter and are regenerated on
//! every `replace_all`. Reads, writes, and pings can be made to fail for
//! error-path tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::node::NodeClient;

/// In-memory node, thread-safe via RwLock.
pub struct MemoryNode {
    name: String,
    inner: RwLock<Inner>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    unreachable: AtomicBool,
}

struct Inner {
    /// (database, collection) -> stored documents
    collections: HashMap<(String, String), Vec<Document>>,
    /// Monotonic storage id source, never reused
    next_id: u64,
}

impl MemoryNode {
    /// Create an empty node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(Inner {
                collections: HashMap::new(),
                next_id: 1,
            }),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Insert documents directly, assigning storage identifiers.
    ///
    /// Unlike `replace_all` this appends, the way independent writers would.
    pub fn seed(&self, database: &str, collection: &str, documents: Vec<Document>) {
        let mut inner = self.inner.write().unwrap();
        let slot = inner.next_id;
        inner.next_id += documents.len() as u64;
        let stored = inner
            .collections
            .entry((database.to_string(), collection.to_string()))
            .or_default();
        for (offset, doc) in documents.into_iter().enumerate() {
            let mut doc = doc.without_id();
            doc.id = Some((slot + offset as u64).to_string());
            stored.push(doc);
        }
    }

    /// Current contents of a collection, for assertions
    pub fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        let inner = self.inner.read().unwrap();
        inner
            .collections
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Make every fetch fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every replace fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make pings fail
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl NodeClient for MemoryNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_all(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Query {
                node: self.name.clone(),
                database: database.to_string(),
                collection: collection.to_string(),
                reason: "injected read failure".to_string(),
            });
        }
        Ok(self.documents(database, collection))
    }

    async fn replace_all(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Write {
                node: self.name.clone(),
                database: database.to_string(),
                collection: collection.to_string(),
                reason: "injected write failure".to_string(),
            });
        }

        let mut inner = self.inner.write().unwrap();
        let slot = inner.next_id;
        inner.next_id += documents.len() as u64;
        let stored = documents
            .into_iter()
            .enumerate()
            .map(|(offset, doc)| {
                let mut doc = doc.without_id();
                doc.id = Some((slot + offset as u64).to_string());
                doc
            })
            .collect();
        inner
            .collections
            .insert((database.to_string(), collection.to_string()), stored);
        Ok(())
    }

    async fn ping(&self, _timeout: Duration) -> bool {
        !self.unreachable.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::testutil::doc;

    #[tokio::test]
    async fn test_seed_and_fetch() {
        let node = MemoryNode::new("replica1");
        node.seed("appdb1", "users", vec![doc(&[("name", "alice")])]);

        let docs = node.fetch_all("appdb1", "users").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id.as_deref(), Some("1"));

        // Missing collection reads as empty, not as an error
        assert!(node.fetch_all("appdb2", "users").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_regenerates_storage_ids() {
        let node = MemoryNode::new("replica1");
        node.seed("appdb1", "users", vec![doc(&[("name", "alice")])]);

        let docs = node.fetch_all("appdb1", "users").await.unwrap();
        node.replace_all("appdb1", "users", docs.clone()).await.unwrap();

        let rewritten = node.fetch_all("appdb1", "users").await.unwrap();
        assert_eq!(rewritten.len(), 1);
        assert_ne!(rewritten[0].id, docs[0].id);
        assert_eq!(rewritten[0].fields, docs[0].fields);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let node = MemoryNode::new("replica1");

        node.fail_reads(true);
        assert!(node.fetch_all("appdb1", "users").await.is_err());
        node.fail_reads(false);

        node.fail_writes(true);
        assert!(node.replace_all("appdb1", "users", vec![]).await.is_err());

        assert!(node.ping(Duration::from_millis(10)).await);
        node.set_unreachable(true);
        assert!(!node.ping(Duration::from_millis(10)).await);
    }
}
