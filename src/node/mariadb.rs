//! MariaDB-backed node client.
//!
//! Each collection is a table with an auto-increment id and the document as
//! JSON text. The auto-increment id is the storage-assigned identifier: it
//! is dropped before insert and regenerated by the server, so it never
//! survives a `replace_all`.
//!
//! Database and collection names are interpolated as backtick-quoted SQL
//! identifiers. Config validation rejects names containing backticks, which
//! keeps the quoting sound.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySqlPool, Row};
use tokio::time::timeout;

use crate::config::{Credentials, NodeAddress};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::node::NodeClient;

/// A node client backed by one server-level MariaDB connection pool.
pub struct MariaDbNode {
    name: String,
    address: NodeAddress,
    pool: MySqlPool,
}

impl MariaDbNode {
    /// Connect to a storage node.
    ///
    /// The pool is server-level (no database in the URL) because one node
    /// serves collections from several logical datasets.
    pub async fn connect(
        name: impl Into<String>,
        address: NodeAddress,
        credentials: &Credentials,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let url = format!(
            "mysql://{}:{}@{}",
            credentials.user, credentials.password, address
        );

        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(connect_timeout)
            .connect(&url)
            .await
            .map_err(|e| Error::Connection {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name: name.into(),
            address,
            pool,
        })
    }

    /// The node's storage address
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    /// Create the backing database and table for a collection if missing.
    pub async fn ensure_collection(&self, database: &str, collection: &str) -> Result<()> {
        let statements = [
            format!("CREATE DATABASE IF NOT EXISTS `{database}`"),
            format!(
                "CREATE TABLE IF NOT EXISTS `{database}`.`{collection}` (\
                 id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY, \
                 doc LONGTEXT NOT NULL\
                 ) CHARACTER SET utf8mb4"
            ),
        ];

        for sql in &statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| self.write_error(database, collection, e.to_string()))?;
        }
        Ok(())
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn query_error(&self, database: &str, collection: &str, reason: String) -> Error {
        Error::Query {
            node: self.name.clone(),
            database: database.to_string(),
            collection: collection.to_string(),
            reason,
        }
    }

    fn write_error(&self, database: &str, collection: &str, reason: String) -> Error {
        Error::Write {
            node: self.name.clone(),
            database: database.to_string(),
            collection: collection.to_string(),
            reason,
        }
    }
}

#[async_trait]
impl NodeClient for MariaDbNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_all(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
        let sql = format!("SELECT id, doc FROM `{database}`.`{collection}`");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.query_error(database, collection, e.to_string()))?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let id: u64 = row
                .try_get("id")
                .map_err(|e| self.query_error(database, collection, e.to_string()))?;
            let raw: String = row
                .try_get("doc")
                .map_err(|e| self.query_error(database, collection, e.to_string()))?;

            let mut doc: Document =
                serde_json::from_str(&raw).map_err(|e| Error::MalformedDocument {
                    node: self.name.clone(),
                    reason: format!("row {id} in {database}.{collection}: {e}"),
                })?;
            doc.id = Some(id.to_string());
            documents.push(doc);
        }

        Ok(documents)
    }

    async fn replace_all(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| self.write_error(database, collection, e.to_string()))?;

        let delete = format!("DELETE FROM `{database}`.`{collection}`");
        sqlx::query(&delete)
            .execute(&mut *tx)
            .await
            .map_err(|e| self.write_error(database, collection, e.to_string()))?;

        let insert = format!("INSERT INTO `{database}`.`{collection}` (doc) VALUES (?)");
        for doc in &documents {
            let raw = serde_json::to_string(&doc.without_id())
                .map_err(|e| self.write_error(database, collection, e.to_string()))?;
            sqlx::query(&insert)
                .bind(raw)
                .execute(&mut *tx)
                .await
                .map_err(|e| self.write_error(database, collection, e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| self.write_error(database, collection, e.to_string()))?;

        tracing::debug!(
            node = %self.name,
            "replaced {}.{} with {} documents",
            database,
            collection,
            documents.len()
        );
        Ok(())
    }

    async fn ping(&self, timeout_duration: Duration) -> bool {
        let check = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool);
        matches!(timeout(timeout_duration, check).await, Ok(Ok(1)))
    }
}
