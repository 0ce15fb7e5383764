//! In-memory document store.
//!
//! Used by tests and demos. Relies on the default (non-atomic) `upsert` of
//! [`DocumentStore`], and can be switched offline to exercise the
//! store-unavailable paths.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use serde_json::Value;

use crate::document::{Direction, Document, DocumentStore, Fields, Query};
use crate::error::{StoreError, StoreResult};

/// Document store kept in process memory, one insertion-ordered list per collection.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<BTreeMap<String, Vec<Document>>>,
    next_id: AtomicU64,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing (or regaining) the connection to the store.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or_default(), y.as_f64().unwrap_or_default());
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.ensure_online()?;
        let collections = self.collections.lock();
        let mut docs: Vec<Document> = collections
            .get(&query.collection)
            .map(|docs| docs.iter().filter(|d| query.matches(&d.fields)).cloned().collect())
            .unwrap_or_default();

        if let Some((field, direction)) = &query.order_by {
            // Stable sort; reversing the comparator keeps ties in reverse insertion order
            // for descending queries, matching the SQLite store.
            match direction {
                Direction::Ascending => {
                    docs.sort_by(|a, b| compare_values(a.fields.get(field), b.fields.get(field)))
                }
                Direction::Descending => {
                    docs.reverse();
                    docs.sort_by(|a, b| compare_values(b.fields.get(field), a.fields.get(field)))
                }
            }
        }

        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.ensure_online()?;
        let collections = self.collections.lock();
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    fn add(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        let id = format!("doc-{}", self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1);
        self.insert(collection, &id, fields)?;
        Ok(id)
    }

    fn insert(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.ensure_online()?;
        let mut collections = self.collections.lock();
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.id == id) {
            return Err(StoreError::Conflict(format!("{}/{}", collection, id)));
        }
        docs.push(Document {
            id: id.to_string(),
            fields,
        });
        Ok(())
    }

    fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.ensure_online()?;
        let mut collections = self.collections.lock();
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        doc.fields.extend(fields);
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.ensure_online()?;
        let mut collections = self.collections.lock();
        if let Some(docs) = collections.get_mut(collection) {
            docs.retain(|d| d.id != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::document::{Filter, UpsertKey};
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_descending_order_breaks_ties_newest_first() {
        let store = MemoryDocumentStore::new();
        let a = store.add("modules", fields(json!({"createdAt": 10}))).unwrap();
        let b = store.add("modules", fields(json!({"createdAt": 10}))).unwrap();
        let c = store.add("modules", fields(json!({"createdAt": 5}))).unwrap();

        let docs = store
            .query(&Query::collection("modules").order_by("createdAt", Direction::Descending))
            .unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec![b.as_str(), a.as_str(), c.as_str()]);
    }

    #[test]
    fn test_offline_store_is_unavailable() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.query(&Query::collection("modules")),
            Err(StoreError::Unavailable(_))
        ));

        store.set_offline(false);
        assert!(store.query(&Query::collection("modules")).unwrap().is_empty());
    }

    #[test]
    fn test_default_upsert_updates_existing() {
        let store = MemoryDocumentStore::new();
        let key = [Filter::eq("userId", "u1")];
        let first = store
            .upsert(
                "userProgress",
                UpsertKey::Fields(&key),
                fields(json!({"userId": "u1", "progress": 10})),
                fields(json!({"progress": 10})),
            )
            .unwrap();
        let second = store
            .upsert(
                "userProgress",
                UpsertKey::Fields(&key),
                fields(json!({"userId": "u1", "progress": 80})),
                fields(json!({"progress": 80})),
            )
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        let all = store.query(&Query::collection("userProgress")).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].fields["progress"], 80);
    }
}
