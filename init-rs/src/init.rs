use serde::Serialize;

use crate::error::{InitError, InitResult};
use crate::schema::DatabaseSchema;
use crate::store::postgres::{
    comment_index_sql, create_id_index_sql, create_index_sql, create_schema_sql,
    create_table_sql,
};
use crate::store::DocumentStore;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct InitReport {
    pub database: String,
    pub collections_created: Vec<String>,
    pub collections_existing: Vec<String>,
    pub indexes_created: usize,
    pub indexes_unchanged: usize,
}

/// Creates the database, every collection and every index declared in
/// `schema`. Collections that already exist are left alone and identical
/// indexes are skipped, so running twice is harmless. A conflicting index
/// definition aborts the run; nothing already applied is rolled back.
pub async fn initialize<S>(store: &S, schema: &DatabaseSchema) -> InitResult<InitReport>
where
    S: DocumentStore + ?Sized,
{
    tracing::info!(database = %schema.name, "Initializing database");
    store.create_database(&schema.name).await?;

    let existing = store.list_collections().await?;
    let mut report = InitReport {
        database: schema.name.clone(),
        ..Default::default()
    };

    for collection in &schema.collections {
        if existing.contains(&collection.name) {
            tracing::warn!(collection = %collection.name, "Collection already exists, skipping");
            report.collections_existing.push(collection.name.clone());
            continue;
        }
        match store.create_collection(collection).await {
            Ok(()) => {
                tracing::info!(
                    collection = %collection.name,
                    validator = ?collection.validator.as_ref().map(|v| v.to_document().to_string()),
                    "Created collection"
                );
                report.collections_created.push(collection.name.clone());
            }
            Err(InitError::CollectionExists(name)) => {
                tracing::warn!(collection = %name, "Collection appeared concurrently, skipping");
                report.collections_existing.push(name);
            }
            Err(e) => return Err(e),
        }
    }

    for collection in &schema.collections {
        for index in &collection.indexes {
            let created = store.create_index(&collection.name, index).await?;
            if created {
                tracing::info!(
                    collection = %collection.name,
                    index = %index.name(),
                    keys = %index.key_document(),
                    unique = index.unique,
                    sparse = index.sparse,
                    "Created index"
                );
                report.indexes_created += 1;
            } else {
                tracing::debug!(
                    collection = %collection.name,
                    index = %index.name(),
                    "Index already present"
                );
                report.indexes_unchanged += 1;
            }
        }
    }

    tracing::info!(
        database = %report.database,
        collections_created = report.collections_created.len(),
        collections_existing = report.collections_existing.len(),
        indexes_created = report.indexes_created,
        indexes_unchanged = report.indexes_unchanged,
        "Database initialization completed"
    );
    Ok(report)
}

/// The Postgres statements `initialize` issues against an empty database,
/// in order.
pub fn render_plan(schema: &DatabaseSchema) -> Vec<String> {
    let mut plan = vec![create_schema_sql(&schema.name)];
    for collection in &schema.collections {
        plan.push(create_table_sql(&schema.name, collection));
        plan.push(create_id_index_sql(&schema.name, &collection.name));
    }
    for collection in &schema.collections {
        for index in &collection.indexes {
            plan.push(create_index_sql(&schema.name, &collection.name, index));
            plan.push(comment_index_sql(&schema.name, &collection.name, index));
        }
    }
    plan
}
