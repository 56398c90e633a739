use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DocumentStore, IndexInfo, ID_FIELD, ID_INDEX};
use crate::error::{InitError, InitResult};
use crate::schema::validator::quote_literal;
use crate::schema::{BsonType, CollectionSpec, IndexSpec, ValidationError};

/// Postgres has a 63 byte limit on identifiers.
const MAX_IDENT_LEN: usize = 63;

/// Document store on Postgres. The database maps to a schema, each
/// collection to a table holding one JSONB document per row.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    database: Arc<RwLock<Option<String>>>,
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn table_ref(database: &str, collection: &str) -> String {
    format!("{}.{}", quote_ident(database), quote_ident(collection))
}

/// Physical index name. Index names are schema-wide in Postgres, so the
/// collection name is prepended.
pub fn pg_index_name(collection: &str, index: &IndexSpec) -> String {
    let mut name = format!("{}_{}", collection, index.name());
    while name.len() > MAX_IDENT_LEN {
        name.pop();
    }
    name
}

fn key_expr(field: &str) -> String {
    format!("COALESCE(doc->{}, 'null'::jsonb)", quote_literal(field))
}

pub fn create_schema_sql(database: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(database))
}

pub fn create_table_sql(database: &str, spec: &CollectionSpec) -> String {
    let mut columns = vec![
        "id UUID PRIMARY KEY".to_string(),
        "doc JSONB NOT NULL".to_string(),
        "inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()".to_string(),
        format!(
            "CONSTRAINT {} CHECK (jsonb_typeof(doc) = 'object')",
            quote_ident(&format!("{}_object", spec.name))
        ),
    ];
    if let Some(validator) = &spec.validator {
        columns.push(format!(
            "CONSTRAINT {} CHECK ({})",
            quote_ident(&format!("{}_validator", spec.name)),
            validator.check_constraint("doc")
        ));
    }
    format!(
        "CREATE TABLE {} (\n    {}\n)",
        table_ref(database, &spec.name),
        columns.join(",\n    ")
    )
}

/// Unique index on `_id`. Comes with every table and carries no comment, so
/// `list_indexes` reports declared indexes only.
pub fn create_id_index_sql(database: &str, collection: &str) -> String {
    format!(
        "CREATE UNIQUE INDEX {} ON {} ((doc->{}))",
        quote_ident(&format!("{collection}_{ID_INDEX}")),
        table_ref(database, collection),
        quote_literal(ID_FIELD)
    )
}

pub fn create_index_sql(database: &str, collection: &str, index: &IndexSpec) -> String {
    let keys: Vec<String> = index
        .keys
        .iter()
        .map(|(field, dir)| format!("({}) {}", key_expr(field), dir.as_sql()))
        .collect();

    let mut sql = format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote_ident(&pg_index_name(collection, index)),
        table_ref(database, collection),
        keys.join(", ")
    );

    if index.sparse {
        let present: Vec<String> = index
            .fields()
            .map(|field| format!("jsonb_typeof(doc->{}) <> 'null'", quote_literal(field)))
            .collect();
        sql.push_str(&format!(" WHERE ({})", present.join(" OR ")));
    }
    sql
}

/// The index comment records the declared spec so re-runs can tell an
/// identical index from a conflicting one.
pub fn comment_index_sql(database: &str, collection: &str, index: &IndexSpec) -> String {
    format!(
        "COMMENT ON INDEX {}.{} IS {}",
        quote_ident(database),
        quote_ident(&pg_index_name(collection, index)),
        quote_literal(&index.to_string())
    )
}

fn parse_index_comment(comment: &str) -> IndexInfo {
    let mut words = comment.split_whitespace();
    let name = words.next().unwrap_or_default().to_string();
    let flags: Vec<&str> = words.collect();
    IndexInfo {
        name,
        unique: flags.contains(&"unique"),
        sparse: flags.contains(&"sparse"),
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            database: Arc::new(RwLock::new(None)),
        }
    }

    async fn current_database(&self) -> InitResult<String> {
        self.database
            .read()
            .await
            .clone()
            .ok_or_else(|| InitError::Internal("no database selected".to_string()))
    }

    async fn collection_exists(&self, database: &str, collection: &str) -> InitResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2)",
        )
        .bind(database)
        .bind(collection)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn require_collection(&self, database: &str, collection: &str) -> InitResult<()> {
        if self.collection_exists(database, collection).await? {
            Ok(())
        } else {
            Err(InitError::CollectionNotFound(collection.to_string()))
        }
    }

    fn map_write_error(collection: &str, err: sqlx::Error) -> InitError {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    let prefix = format!("{collection}_");
                    let index = db_err
                        .constraint()
                        .map(|c| c.strip_prefix(&prefix).unwrap_or(c).to_string())
                        .unwrap_or_default();
                    return InitError::DuplicateKey {
                        collection: collection.to_string(),
                        index,
                    };
                }
                Some("23514") => {
                    return InitError::Validation {
                        collection: collection.to_string(),
                        reason: db_err.message().to_string(),
                    };
                }
                Some("42P07") => return InitError::CollectionExists(collection.to_string()),
                _ => {}
            }
        }
        InitError::Database(err)
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn create_database(&self, name: &str) -> InitResult<()> {
        sqlx::query(&create_schema_sql(name))
            .execute(&self.pool)
            .await?;
        *self.database.write().await = Some(name.to_string());
        Ok(())
    }

    async fn list_collections(&self) -> InitResult<Vec<String>> {
        let database = self.current_database().await?;
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables WHERE table_schema = $1 ORDER BY table_name",
        )
        .bind(&database)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> InitResult<()> {
        let database = self.current_database().await?;
        if self.collection_exists(&database, &spec.name).await? {
            return Err(InitError::CollectionExists(spec.name.clone()));
        }
        let mut tx = self.pool.begin().await?;
        sqlx::query(&create_table_sql(&database, spec))
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::map_write_error(&spec.name, e))?;
        sqlx::query(&create_id_index_sql(&database, &spec.name))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> InitResult<bool> {
        let database = self.current_database().await?;
        self.require_collection(&database, collection).await?;

        let existing: Option<Option<String>> = sqlx::query_scalar(
            r#"SELECT obj_description(format('%I.%I', schemaname, indexname)::regclass, 'pg_class')
            FROM pg_indexes WHERE schemaname = $1 AND indexname = $2"#,
        )
        .bind(&database)
        .bind(pg_index_name(collection, index))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(comment) = existing {
            if comment.as_deref() == Some(index.to_string().as_str()) {
                return Ok(false);
            }
            return Err(InitError::IndexConflict {
                collection: collection.to_string(),
                index: index.name(),
            });
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(&create_index_sql(&database, collection, index))
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::map_write_error(collection, e))?;
        sqlx::query(&comment_index_sql(&database, collection, index))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn list_indexes(&self, collection: &str) -> InitResult<Vec<IndexInfo>> {
        let database = self.current_database().await?;
        self.require_collection(&database, collection).await?;

        let comments: Vec<Option<String>> = sqlx::query_scalar(
            r#"SELECT obj_description(format('%I.%I', schemaname, indexname)::regclass, 'pg_class')
            FROM pg_indexes WHERE schemaname = $1 AND tablename = $2 ORDER BY indexname"#,
        )
        .bind(&database)
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments
            .iter()
            .flatten()
            .map(|c| parse_index_comment(c))
            .collect())
    }

    async fn insert_one(&self, collection: &str, mut doc: Value) -> InitResult<String> {
        let database = self.current_database().await?;

        if !doc.is_object() {
            let err = ValidationError::NotAnObject(BsonType::of(&doc));
            return Err(InitError::Validation {
                collection: collection.to_string(),
                reason: err.to_string(),
            });
        }

        let row_id = Uuid::new_v4();
        if let Some(map) = doc.as_object_mut() {
            map.entry(ID_FIELD)
                .or_insert_with(|| Value::String(row_id.to_string()));
        }
        let id = match &doc[ID_FIELD] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let sql = format!(
            "INSERT INTO {} (id, doc) VALUES ($1, $2)",
            table_ref(&database, collection)
        );
        let result = sqlx::query(&sql)
            .bind(row_id)
            .bind(&doc)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(id),
            Err(e) => {
                if let sqlx::Error::Database(db_err) = &e {
                    // undefined_table
                    if db_err.code().as_deref() == Some("42P01") {
                        return Err(InitError::CollectionNotFound(collection.to_string()));
                    }
                }
                Err(Self::map_write_error(collection, e))
            }
        }
    }
}
