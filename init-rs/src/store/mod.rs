pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::InitResult;
use crate::schema::{CollectionSpec, IndexSpec};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Document id field. Every collection keeps it unique.
pub const ID_FIELD: &str = "_id";
/// Name of the implicit unique index on `_id`.
pub const ID_INDEX: &str = "_id_";

/// Index as reported back by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub sparse: bool,
}

/// Target of the bootstrap: something that holds named collections of
/// JSON documents with validators and secondary indexes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Selects (and creates if needed) the database all later calls act on.
    async fn create_database(&self, name: &str) -> InitResult<()>;

    async fn list_collections(&self) -> InitResult<Vec<String>>;

    /// Fails with `CollectionExists` when the collection is already there.
    async fn create_collection(&self, spec: &CollectionSpec) -> InitResult<()>;

    /// Returns `true` when the index was created, `false` when an identical
    /// index already existed. A different index under the same name fails
    /// with `IndexConflict`.
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> InitResult<bool>;

    async fn list_indexes(&self, collection: &str) -> InitResult<Vec<IndexInfo>>;

    /// Inserts a document, enforcing the collection's validator, unique
    /// indexes and `_id` uniqueness. Returns the document's `_id`, generated
    /// when the caller left it out.
    async fn insert_one(&self, collection: &str, doc: Value) -> InitResult<String>;
}
