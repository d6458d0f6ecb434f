//! Ordered last-write-wins merge of document sets.
//!
//! The merger folds document sets, in the order the caller supplies them,
//! into one reconciled set keyed by logical identity. The first document
//! seen for a key holds the slot; a later document takes it over only when
//! it is strictly more recent by `created_at`, or when it carries a
//! timestamp and the incumbent does not. Ties keep the incumbent, which is
//! why both call sites fix their input ordering.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDateTime};

use crate::document::{DocKey, Document};

/// A reconciled document set: at most one document per logical key.
#[derive(Debug, Clone, Default)]
pub struct MergedSet {
    docs: HashMap<DocKey, Document>,
}

impl MergedSet {
    /// Number of surviving documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// The surviving logical keys
    pub fn keys(&self) -> BTreeSet<DocKey> {
        self.docs.keys().cloned().collect()
    }

    /// Look up the surviving document for a key
    pub fn get(&self, key: &DocKey) -> Option<&Document> {
        self.docs.get(key)
    }

    /// The surviving documents, ready to be written back
    pub fn into_documents(self) -> Vec<Document> {
        self.docs.into_values().collect()
    }

    /// Whether a raw document set already holds exactly this reconciled
    /// content, ignoring storage identifiers.
    ///
    /// A duplicate key within the set never matches: the reconciled set
    /// holds one document per key.
    pub fn matches(&self, docs: &[Document]) -> bool {
        if docs.len() != self.docs.len() {
            return false;
        }
        docs.iter().all(|doc| {
            self.docs
                .get(&doc.key())
                .map_or(false, |survivor| survivor.fields == doc.fields)
        })
    }
}

/// Merge document sets in the given order into one reconciled set.
pub fn merge(sets: &[Vec<Document>]) -> MergedSet {
    let mut merged = MergedSet::default();

    for set in sets {
        for doc in set {
            let key = doc.key();
            match merged.docs.get(&key) {
                None => {
                    merged.docs.insert(key, doc.clone());
                }
                Some(incumbent) => {
                    if supersedes(doc, incumbent) {
                        merged.docs.insert(key, doc.clone());
                    }
                }
            }
        }
    }

    merged
}

/// The logical keys of one raw document set.
pub fn key_set(docs: &[Document]) -> BTreeSet<DocKey> {
    docs.iter().map(|d| d.key()).collect()
}

/// Whether `candidate` replaces `incumbent` at the same key.
fn supersedes(candidate: &Document, incumbent: &Document) -> bool {
    let candidate_at = candidate.created_at();
    let incumbent_at = incumbent.created_at();

    if candidate_at.is_empty() {
        return false;
    }
    if incumbent_at.is_empty() {
        // Any timestamp beats none
        return true;
    }
    timestamp_order(candidate_at, incumbent_at) == Ordering::Greater
}

/// Order two `created_at` strings by the instants they denote.
///
/// Writers are not guaranteed to share a timestamp format or zone offset, so
/// a plain string comparison is only valid between identically-formatted
/// values. Both sides are parsed (RFC 3339, then naive ISO-8601) and compared
/// as instants when possible; the string comparison remains as the fallback
/// for unparseable or mixed aware/naive pairs.
fn timestamp_order(a: &str, b: &str) -> Ordering {
    if let (Ok(a), Ok(b)) = (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (parse_naive(a), parse_naive(b)) {
        return a.cmp(&b);
    }
    a.cmp(b)
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}
