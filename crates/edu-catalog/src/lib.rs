//! Catalog and progress data for Edu Portal
//!
//! Typed access to educational modules, lessons, enrollments, per-lesson
//! progress and user profiles, stored in a document store.

pub mod client;
pub mod document;
pub mod error;
pub mod memory_store;
pub mod repository;
pub mod roster;
pub mod sqlite_store;
pub mod types;

pub use client::CatalogClient;
pub use document::{Direction, Document, DocumentStore, Fields, Filter, Query, UpsertKey, Upserted};
pub use error::{CatalogError, CatalogResult, StoreError, StoreResult};
pub use memory_store::MemoryDocumentStore;
pub use repository::CatalogRepository;
pub use roster::{ModuleProgress, Roster, Student};
pub use sqlite_store::SqliteDocumentStore;
pub use types::*;
