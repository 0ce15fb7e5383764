//! SQLite-based document store.
//!
//! Every collection lives in one `documents` table; document bodies are JSON
//! text and filters/ordering go through `json_extract`.

use std::path::Path;

use anyhow::Context;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use uuid::Uuid;

use crate::document::{Direction, Document, DocumentStore, Fields, Query, UpsertKey, Upserted};
use crate::error::{StoreError, StoreResult};

const SCHEMA_VERSION: i32 = 1;

/// Local SQLite storage for catalog documents.
pub struct SqliteDocumentStore {
    conn: Connection,
}

impl SqliteDocumentStore {
    /// Open or create the database.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("Failed to open catalog database")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);

            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            "#,
            )
            .context("Failed to initialize schema")?;

        let version: Option<i32> = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .optional()?;
        if version.is_none() {
            self.conn
                .execute("INSERT INTO schema_version (version) VALUES (?1)", params![SCHEMA_VERSION])?;
        }

        Ok(())
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Field names are interpolated into JSON paths, so only plain identifiers pass.
fn json_path(field: &str) -> StoreResult<String> {
    let valid = !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreError::InvalidQuery(format!("Unsupported field name: {:?}", field)));
    }
    Ok(format!("'$.{}'", field))
}

fn to_sql_value(value: &Value) -> StoreResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        // json_extract reports JSON booleans as integers
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Integer(i)),
            None => Ok(SqlValue::Real(n.as_f64().unwrap_or_default())),
        },
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(StoreError::InvalidQuery(
            "Only scalar values can be used as filters".to_string(),
        )),
    }
}

fn parse_body(collection: &str, id: String, body: &str) -> StoreResult<Document> {
    let fields: Fields = serde_json::from_str(body)
        .map_err(|e| StoreError::Corrupt(format!("{}/{}: {}", collection, id, e)))?;
    Ok(Document { id, fields })
}

fn query_on(conn: &Connection, query: &Query) -> StoreResult<Vec<Document>> {
    let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?1");
    let mut values = vec![SqlValue::Text(query.collection.clone())];

    for filter in &query.filters {
        values.push(to_sql_value(&filter.value)?);
        sql.push_str(&format!(
            " AND json_extract(body, {}) = ?{}",
            json_path(&filter.field)?,
            values.len()
        ));
    }

    match &query.order_by {
        Some((field, direction)) => {
            let dir = match direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            // rowid breaks ties in insertion order
            sql.push_str(&format!(
                " ORDER BY json_extract(body, {}) {dir}, rowid {dir}",
                json_path(field)?
            ));
        }
        None => sql.push_str(" ORDER BY rowid ASC"),
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, body)| parse_body(&query.collection, id, &body))
        .collect()
}

fn get_on(conn: &Connection, collection: &str, id: &str) -> StoreResult<Option<Document>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;

    body.map(|b| parse_body(collection, id.to_string(), &b)).transpose()
}

fn insert_on(conn: &Connection, collection: &str, id: &str, fields: &Fields) -> StoreResult<()> {
    let body = serde_json::to_string(fields)?;
    conn.execute(
        "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
        params![collection, id, body],
    )?;
    Ok(())
}

fn merge_on(conn: &Connection, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
    let mut doc = get_on(conn, collection, id)?.ok_or_else(|| StoreError::not_found(collection, id))?;
    doc.fields.extend(fields);
    let body = serde_json::to_string(&doc.fields)?;
    conn.execute(
        "UPDATE documents SET body = ?3 WHERE collection = ?1 AND id = ?2",
        params![collection, id, body],
    )?;
    Ok(())
}

impl DocumentStore for SqliteDocumentStore {
    fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        query_on(&self.conn, query)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        get_on(&self.conn, collection, id)
    }

    fn add(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        insert_on(&self.conn, collection, &id, &fields)?;
        Ok(id)
    }

    fn insert(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        insert_on(&self.conn, collection, id, &fields)
    }

    fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        merge_on(&tx, collection, id, fields)?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(())
    }

    /// Runs the lookup and the write inside one IMMEDIATE transaction, so other
    /// connections to the same database cannot interleave a duplicate insert.
    fn upsert(
        &self,
        collection: &str,
        key: UpsertKey<'_>,
        on_insert: Fields,
        on_update: Fields,
    ) -> StoreResult<Upserted> {
        let tx = rusqlite::Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let existing = match key {
            UpsertKey::Id(id) => get_on(&tx, collection, id)?.map(|doc| doc.id),
            UpsertKey::Fields(filters) => {
                query_on(&tx, &Query::collection(collection).filters(filters).limit(1))?
                    .into_iter()
                    .next()
                    .map(|doc| doc.id)
            }
        };

        let upserted = match existing {
            Some(id) => {
                merge_on(&tx, collection, &id, on_update)?;
                Upserted { id, created: false }
            }
            None => {
                let id = match key {
                    UpsertKey::Id(id) => id.to_string(),
                    UpsertKey::Fields(_) => Uuid::new_v4().simple().to_string(),
                };
                insert_on(&tx, collection, &id, &on_insert)?;
                Upserted { id, created: true }
            }
        };

        tx.commit()?;
        Ok(upserted)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::document::Filter;
    use serde_json::json;
    use tempfile::tempdir;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_add_and_get() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let id = store.add("modules", fields(json!({"title": "Algebra"}))).unwrap();

        let doc = store.get("modules", &id).unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.fields["title"], "Algebra");
        assert!(store.get("lessons", &id).unwrap().is_none());
    }

    #[test]
    fn test_query_filters_bool_and_string() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store
            .add("modules", fields(json!({"subject": "Art", "isPublished": true})))
            .unwrap();
        store
            .add("modules", fields(json!({"subject": "Art", "isPublished": false})))
            .unwrap();
        store
            .add("modules", fields(json!({"subject": "Music", "isPublished": true})))
            .unwrap();

        let published = store
            .query(&Query::collection("modules").filter("isPublished", true))
            .unwrap();
        assert_eq!(published.len(), 2);

        let art = store
            .query(
                &Query::collection("modules")
                    .filter("subject", "Art")
                    .filter("isPublished", true),
            )
            .unwrap();
        assert_eq!(art.len(), 1);
    }

    #[test]
    fn test_query_order_and_limit() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        for order in [3, 1, 2] {
            store
                .add("lessons", fields(json!({"moduleId": "m1", "order": order})))
                .unwrap();
        }

        let asc = store
            .query(&Query::collection("lessons").order_by("order", Direction::Ascending))
            .unwrap();
        let orders: Vec<i64> = asc.iter().map(|d| d.fields["order"].as_i64().unwrap()).collect();
        assert_eq!(orders, vec![1, 2, 3]);

        let top = store
            .query(
                &Query::collection("lessons")
                    .order_by("order", Direction::Descending)
                    .limit(1),
            )
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].fields["order"], 3);
    }

    #[test]
    fn test_invalid_field_name_rejected() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let result = store.query(&Query::collection("modules").filter("a') OR 1=1 --", 1));
        assert!(matches!(result, Err(StoreError::InvalidQuery(_))));
    }

    #[test]
    fn test_update_merges_and_reports_missing() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let id = store
            .add("modules", fields(json!({"title": "Old", "rating": 4})))
            .unwrap();

        store
            .update("modules", &id, fields(json!({"title": "New"})))
            .unwrap();
        let doc = store.get("modules", &id).unwrap().unwrap();
        assert_eq!(doc.fields["title"], "New");
        assert_eq!(doc.fields["rating"], 4);

        let missing = store.update("modules", "nope", fields(json!({"title": "x"})));
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let id = store.add("modules", Fields::new()).unwrap();
        store.delete("modules", &id).unwrap();
        store.delete("modules", &id).unwrap();
        assert_eq!(store.count("modules").unwrap(), 0);
    }

    #[test]
    fn test_insert_conflict() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store.insert("users", "u1", Fields::new()).unwrap();
        let again = store.insert("users", "u1", Fields::new());
        assert!(matches!(again, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_upsert_by_fields_creates_once() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let key = [Filter::eq("userId", "u1"), Filter::eq("moduleId", "m1")];

        let first = store
            .upsert(
                "enrollments",
                UpsertKey::Fields(&key),
                fields(json!({"userId": "u1", "moduleId": "m1", "n": 1})),
                fields(json!({"n": 1})),
            )
            .unwrap();
        assert!(first.created);

        let second = store
            .upsert(
                "enrollments",
                UpsertKey::Fields(&key),
                fields(json!({"userId": "u1", "moduleId": "m1", "n": 1})),
                fields(json!({"n": 2})),
            )
            .unwrap();
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.count("enrollments").unwrap(), 1);

        let doc = store.get("enrollments", &first.id).unwrap().unwrap();
        assert_eq!(doc.fields["n"], 2);
    }

    #[test]
    fn test_upsert_by_id() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let created = store
            .upsert(
                "users",
                UpsertKey::Id("u1"),
                fields(json!({"name": "Asha", "createdAt": 1})),
                fields(json!({"name": "Asha"})),
            )
            .unwrap();
        assert_eq!(created, Upserted { id: "u1".into(), created: true });

        let updated = store
            .upsert(
                "users",
                UpsertKey::Id("u1"),
                fields(json!({"name": "Asha K", "createdAt": 2})),
                fields(json!({"name": "Asha K"})),
            )
            .unwrap();
        assert!(!updated.created);

        let doc = store.get("users", "u1").unwrap().unwrap();
        assert_eq!(doc.fields["name"], "Asha K");
        assert_eq!(doc.fields["createdAt"], 1);
    }

    #[test]
    fn test_corrupt_body_is_reported() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO documents (collection, id, body) VALUES ('modules', 'bad', 'not json')",
                [],
            )
            .unwrap();
        let result = store.get("modules", "bad");
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("catalog.db");
        let id = {
            let store = SqliteDocumentStore::open(&db_path).unwrap();
            store.add("modules", fields(json!({"title": "Kept"}))).unwrap()
        };

        let store = SqliteDocumentStore::open(&db_path).unwrap();
        let doc = store.get("modules", &id).unwrap().unwrap();
        assert_eq!(doc.fields["title"], "Kept");
    }
}
