//! Documents and logical identity.
//!
//! Storage assigns every document a fresh identifier on each write, so
//! identifiers are useless for matching documents across nodes. Identity is
//! content-derived instead: `name:email` when both fields are present, with
//! the stringified storage identifier as the fallback.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Separator between the name and email halves of a derived key.
const KEY_SEPARATOR: &str = ":";

/// The logical identity of a document, stable across nodes and rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocKey(String);

impl DocKey {
    /// True for the degenerate case: no identity fields and no storage id.
    ///
    /// Multiple documents can collide on the empty key; the merge recency
    /// rule applies to them like any other collision.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document: an arbitrary field map plus the storage-assigned identifier.
///
/// Only `name`, `email`, and `created_at` are interpreted; every other field
/// passes through untouched. The storage id is never written back - nodes
/// regenerate it on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Storage-assigned identifier, if the document was read from a node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Document fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Create a document with no storage identifier
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { id: None, fields }
    }

    /// Create a document as read from a node, with its storage identifier
    pub fn with_id(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            fields,
        }
    }

    /// Get a field as a string, or "" when absent or non-string
    pub fn str_field(&self, name: &str) -> &str {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// The recency signal: `created_at` as an ISO-8601 string, "" when absent
    pub fn created_at(&self) -> &str {
        self.str_field("created_at")
    }

    /// Derive the logical key for this document.
    ///
    /// `name:email` when both are non-empty, else the stringified storage
    /// identifier. Total and deterministic; the result may be empty when
    /// neither source is present.
    pub fn key(&self) -> DocKey {
        let name = self.str_field("name");
        let email = self.str_field("email");
        if !name.is_empty() && !email.is_empty() {
            return DocKey(format!("{name}{KEY_SEPARATOR}{email}"));
        }
        DocKey(self.id.clone().unwrap_or_default())
    }

    /// The document without its storage identifier, ready for insertion
    pub fn without_id(&self) -> Document {
        Document {
            id: None,
            fields: self.fields.clone(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::doc;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_from_name_and_email() {
        let d = doc(&[("name", "alice"), ("email", "a@x.com")]);
        assert_eq!(d.key().as_str(), "alice:a@x.com");
    }

    #[test]
    fn test_key_falls_back_to_storage_id() {
        let mut d = doc(&[("name", "alice")]);
        d.id = Some("650f1a2b".to_string());
        assert_eq!(d.key().as_str(), "650f1a2b");

        // Empty identity fields do not count
        let mut d = doc(&[("name", ""), ("email", "a@x.com")]);
        d.id = Some("650f1a2b".to_string());
        assert_eq!(d.key().as_str(), "650f1a2b");
    }

    #[test]
    fn test_degenerate_empty_key() {
        let d = doc(&[("city", "riga")]);
        assert!(d.key().is_empty());
    }

    #[test]
    fn test_identity_ignores_storage_id_when_fields_present() {
        let mut a = doc(&[("name", "alice"), ("email", "a@x.com")]);
        a.id = Some("1".to_string());
        let mut b = doc(&[("name", "alice"), ("email", "a@x.com")]);
        b.id = Some("9000".to_string());
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_non_string_fields_pass_through() {
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!(42));
        fields.insert("tags".to_string(), json!(["a", "b"]));
        let d = Document::with_id("7", fields);
        // Non-string name does not contribute to identity
        assert_eq!(d.key().as_str(), "7");
        assert_eq!(d.fields["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_without_id_strips_only_the_id() {
        let d = Document::with_id("3", doc(&[("name", "bob")]).fields);
        let stripped = d.without_id();
        assert!(stripped.id.is_none());
        assert_eq!(stripped.fields, d.fields);
    }

    #[test]
    fn test_serde_flattens_fields() {
        let d = doc(&[("name", "alice"), ("email", "a@x.com")]);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json, json!({"name": "alice", "email": "a@x.com"}));

        let back: Document = serde_json::from_value(json).unwrap();
        assert_eq!(back.key().as_str(), "alice:a@x.com");
    }
}
