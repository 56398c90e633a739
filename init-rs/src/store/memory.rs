use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DocumentStore, IndexInfo, ID_FIELD, ID_INDEX};
use crate::error::{InitError, InitResult};
use crate::schema::index::normalize;
use crate::schema::{BsonType, CollectionSpec, IndexSpec, JsonSchema, ValidationError};

/// In-process document store. Enforces validators and unique/sparse
/// indexes the same way the database does, so the schema can be exercised
/// without a server (dry runs and tests).
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    database: Option<String>,
    collections: Vec<Collection>,
}

struct Collection {
    name: String,
    validator: Option<JsonSchema>,
    indexes: Vec<IndexSpec>,
    docs: Vec<Value>,
}

impl MemoryState {
    fn collection(&self, name: &str) -> InitResult<&Collection> {
        self.collections
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| InitError::CollectionNotFound(name.to_string()))
    }

    fn collection_mut(&mut self, name: &str) -> InitResult<&mut Collection> {
        self.collections
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| InitError::CollectionNotFound(name.to_string()))
    }
}

impl Collection {
    fn has_id(&self, id: &Value) -> bool {
        let id = normalize(id);
        self.docs
            .iter()
            .any(|existing| existing.get(ID_FIELD).map(normalize).as_ref() == Some(&id))
    }

    fn violates(&self, index: &IndexSpec, doc: &Value) -> bool {
        if !index.unique {
            return false;
        }
        let key = match index.key_of(doc) {
            Some(key) => key,
            None => return false,
        };
        self.docs
            .iter()
            .any(|existing| index.key_of(existing).as_ref() == Some(&key))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn database(&self) -> Option<String> {
        self.state.read().await.database.clone()
    }

    pub async fn count(&self, collection: &str) -> InitResult<usize> {
        let state = self.state.read().await;
        Ok(state.collection(collection)?.docs.len())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_database(&self, name: &str) -> InitResult<()> {
        let mut state = self.state.write().await;
        match &state.database {
            Some(current) if current != name => {
                return Err(InitError::Internal(format!(
                    "memory store already bound to database {current}"
                )));
            }
            _ => state.database = Some(name.to_string()),
        }
        Ok(())
    }

    async fn list_collections(&self) -> InitResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.collections.iter().map(|c| c.name.clone()).collect())
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> InitResult<()> {
        let mut state = self.state.write().await;
        if state.collections.iter().any(|c| c.name == spec.name) {
            return Err(InitError::CollectionExists(spec.name.clone()));
        }
        state.collections.push(Collection {
            name: spec.name.clone(),
            validator: spec.validator.clone(),
            indexes: Vec::new(),
            docs: Vec::new(),
        });
        Ok(())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> InitResult<bool> {
        let mut state = self.state.write().await;
        let coll = state.collection_mut(collection)?;
        let name = index.name();

        if let Some(existing) = coll
            .indexes
            .iter()
            .find(|i| i.name() == name || i.keys == index.keys)
        {
            if existing.same_options(index) {
                return Ok(false);
            }
            return Err(InitError::IndexConflict {
                collection: collection.to_string(),
                index: name,
            });
        }

        if index.unique {
            let mut seen: Vec<Vec<Value>> = Vec::new();
            for doc in &coll.docs {
                if let Some(key) = index.key_of(doc) {
                    if seen.contains(&key) {
                        return Err(InitError::DuplicateKey {
                            collection: collection.to_string(),
                            index: name,
                        });
                    }
                    seen.push(key);
                }
            }
        }

        coll.indexes.push(index.clone());
        Ok(true)
    }

    async fn list_indexes(&self, collection: &str) -> InitResult<Vec<IndexInfo>> {
        let state = self.state.read().await;
        let coll = state.collection(collection)?;
        Ok(coll
            .indexes
            .iter()
            .map(|i| IndexInfo {
                name: i.name(),
                unique: i.unique,
                sparse: i.sparse,
            })
            .collect())
    }

    async fn insert_one(&self, collection: &str, mut doc: Value) -> InitResult<String> {
        let mut state = self.state.write().await;
        let coll = state.collection_mut(collection)?;

        let invalid = |reason: String| InitError::Validation {
            collection: collection.to_string(),
            reason,
        };

        if let Some(validator) = &coll.validator {
            validator.validate(&doc).map_err(|e| invalid(e.to_string()))?;
        }

        if !doc.is_object() {
            let err = ValidationError::NotAnObject(BsonType::of(&doc));
            return Err(invalid(err.to_string()));
        }
        if let Some(map) = doc.as_object_mut() {
            map.entry(ID_FIELD)
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        }

        if coll.has_id(&doc[ID_FIELD]) {
            return Err(InitError::DuplicateKey {
                collection: collection.to_string(),
                index: ID_INDEX.to_string(),
            });
        }
        if let Some(index) = coll.indexes.iter().find(|i| coll.violates(i, &doc)) {
            return Err(InitError::DuplicateKey {
                collection: collection.to_string(),
                index: index.name(),
            });
        }

        let id = match &doc[ID_FIELD] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        coll.docs.push(doc);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store_with(spec: CollectionSpec) -> MemoryStore {
        let store = MemoryStore::new();
        store.create_database("test").await.unwrap();
        store.create_collection(&spec).await.unwrap();
        for index in &spec.indexes {
            store.create_index(&spec.name, index).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_create_collection_twice_fails() {
        let store = MemoryStore::new();
        let spec = CollectionSpec::new("users");
        store.create_collection(&spec).await.unwrap();
        assert!(matches!(
            store.create_collection(&spec).await,
            Err(InitError::CollectionExists(name)) if name == "users"
        ));
    }

    #[tokio::test]
    async fn test_insert_into_unknown_collection() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.insert_one("ghosts", json!({})).await,
            Err(InitError::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_non_object_document() {
        let store = store_with(CollectionSpec::new("payments")).await;
        assert!(matches!(
            store.insert_one("payments", json!("paid")).await,
            Err(InitError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_unique_compound_index() {
        let spec = CollectionSpec::new("users")
            .index(IndexSpec::asc("email").then_asc("tenantId").unique());
        let store = store_with(spec).await;

        store
            .insert_one("users", json!({ "email": "a@x.io", "tenantId": "t1" }))
            .await
            .unwrap();
        store
            .insert_one("users", json!({ "email": "a@x.io", "tenantId": "t2" }))
            .await
            .unwrap();
        let err = store
            .insert_one("users", json!({ "email": "a@x.io", "tenantId": "t1" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InitError::DuplicateKey { ref index, .. } if index == "email_1_tenantId_1"
        ));
        assert_eq!(store.count("users").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_non_sparse_unique_treats_missing_as_null() {
        let spec = CollectionSpec::new("tenants").index(IndexSpec::asc("slug").unique());
        let store = store_with(spec).await;
        store.insert_one("tenants", json!({ "name": "a" })).await.unwrap();
        assert!(store.insert_one("tenants", json!({ "name": "b" })).await.is_err());
    }

    #[tokio::test]
    async fn test_explicit_id_is_kept_and_unique() {
        let store = store_with(CollectionSpec::new("payments")).await;
        let id = store
            .insert_one("payments", json!({ "_id": "p1", "status": "paid" }))
            .await
            .unwrap();
        assert_eq!(id, "p1");

        let err = store
            .insert_one("payments", json!({ "_id": "p1", "status": "refunded" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InitError::DuplicateKey { ref index, .. } if index == "_id_"
        ));
        assert_eq!(store.count("payments").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_numeric_ids_compare_by_value() {
        let store = store_with(CollectionSpec::new("webhooklogs")).await;
        store.insert_one("webhooklogs", json!({ "_id": 7 })).await.unwrap();
        assert!(store.insert_one("webhooklogs", json!({ "_id": 7.0 })).await.is_err());
    }

    #[tokio::test]
    async fn test_unique_keys_compare_numbers_by_value() {
        let spec = CollectionSpec::new("plans")
            .index(IndexSpec::asc("stripePriceId").unique().sparse());
        let store = store_with(spec).await;
        store
            .insert_one("plans", json!({ "stripePriceId": 1 }))
            .await
            .unwrap();
        assert!(matches!(
            store.insert_one("plans", json!({ "stripePriceId": 1.0 })).await,
            Err(InitError::DuplicateKey { ref index, .. }) if index == "stripePriceId_1"
        ));
        store
            .insert_one("plans", json!({ "stripePriceId": 1.5 }))
            .await
            .unwrap();
        assert_eq!(store.count("plans").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_index_conflict() {
        let store = store_with(CollectionSpec::new("plans")).await;
        assert!(store
            .create_index("plans", &IndexSpec::asc("stripePriceId").unique().sparse())
            .await
            .unwrap());
        assert!(!store
            .create_index("plans", &IndexSpec::asc("stripePriceId").unique().sparse())
            .await
            .unwrap());
        assert!(matches!(
            store.create_index("plans", &IndexSpec::asc("stripePriceId")).await,
            Err(InitError::IndexConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_unique_index_over_existing_duplicates_fails() {
        let store = store_with(CollectionSpec::new("invoices")).await;
        for _ in 0..2 {
            store
                .insert_one("invoices", json!({ "stripeInvoiceId": "in_1" }))
                .await
                .unwrap();
        }
        assert!(matches!(
            store
                .create_index("invoices", &IndexSpec::asc("stripeInvoiceId").unique())
                .await,
            Err(InitError::DuplicateKey { .. })
        ));
        assert!(store.list_indexes("invoices").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rebinding_database_fails() {
        let store = MemoryStore::new();
        store.create_database("a").await.unwrap();
        store.create_database("a").await.unwrap();
        assert!(store.create_database("b").await.is_err());
        assert_eq!(store.database().await.as_deref(), Some("a"));
    }
}
