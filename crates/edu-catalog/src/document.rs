//! Document store seam.
//!
//! The catalog repository talks to its backing store only through the
//! primitives defined here: equality-filtered, ordered queries plus
//! add/get/update/delete by id and a keyed upsert.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::StoreResult;

/// Field map of a stored document (everything except its id).
pub type Fields = Map<String, Value>;

/// A stored document: its store-assigned id and its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Equality filter on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    fn matches(&self, fields: &Fields) -> bool {
        fields.get(&self.field) == Some(&self.value)
    }
}

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(field, value));
        self
    }

    pub fn filters(mut self, filters: &[Filter]) -> Self {
        self.filters.extend_from_slice(filters);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True if every filter matches the document's fields.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|f| f.matches(fields))
    }
}

/// How an upsert locates its target document.
#[derive(Debug, Clone, Copy)]
pub enum UpsertKey<'a> {
    /// A caller-chosen, immutable document id.
    Id(&'a str),
    /// The unique combination of field values (e.g. user + module + lesson).
    Fields(&'a [Filter]),
}

/// Outcome of an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    pub id: String,
    pub created: bool,
}

/// Trait for document storage backends.
///
/// Note: Implementations don't need to be Sync - the `CatalogClient` wrapper
/// serializes access through a mutex.
pub trait DocumentStore: Send {
    /// Run a query; results honour the query's order and limit.
    fn query(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Get a document by id. Returns `None` if it doesn't exist.
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Insert a document under a store-generated id and return that id.
    fn add(&self, collection: &str, fields: Fields) -> StoreResult<String>;

    /// Insert a document under a caller-chosen id.
    ///
    /// # Errors
    /// Returns `StoreError::Conflict` if the id is already taken.
    fn insert(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Merge `fields` into an existing document.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the document doesn't exist.
    fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Store-side clock used for server-assigned timestamps.
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Find-or-create with merge.
    ///
    /// Inserts `on_insert` if no document matches `key`, otherwise merges
    /// `on_update` into the first match. When inserting by `UpsertKey::Fields`,
    /// `on_insert` must itself contain the key fields.
    ///
    /// The default implementation is a plain query followed by a write and is
    /// NOT atomic: two writers racing on the same key can both take the insert
    /// branch. Stores that can do better (see `SqliteDocumentStore`) override it.
    fn upsert(
        &self,
        collection: &str,
        key: UpsertKey<'_>,
        on_insert: Fields,
        on_update: Fields,
    ) -> StoreResult<Upserted> {
        let existing = match key {
            UpsertKey::Id(id) => self.get(collection, id)?.map(|doc| doc.id),
            UpsertKey::Fields(filters) => self
                .query(&Query::collection(collection).filters(filters).limit(1))?
                .into_iter()
                .next()
                .map(|doc| doc.id),
        };

        match existing {
            Some(id) => {
                self.update(collection, &id, on_update)?;
                Ok(Upserted { id, created: false })
            }
            None => {
                let id = match key {
                    UpsertKey::Id(id) => {
                        self.insert(collection, id, on_insert)?;
                        id.to_string()
                    }
                    UpsertKey::Fields(_) => self.add(collection, on_insert)?,
                };
                Ok(Upserted { id, created: true })
            }
        }
    }
}
