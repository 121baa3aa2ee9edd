use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::{DocumentStore, DocumentStream, Filter, Patch, Result};

/// PostgreSQL-backed document store.
///
/// Documents live in a single JSONB `documents` table partitioned logically
/// by a `collection` column; filters compile to JSONB field comparisons.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[tracing::instrument(skip(self, doc))]
    async fn insert(&self, collection: &str, doc: Value) -> Result<()> {
        sqlx::query("INSERT INTO documents (collection, doc) VALUES ($1, $2)")
            .bind(collection)
            .bind(doc)
            .execute(&self.pool)
            .await?;
        metrics::counter!("store_documents_inserted").increment(1);
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>> {
        let (cond, binds) = filter.to_sql(2);
        let sql = format!(
            "SELECT doc FROM documents WHERE collection = $1 AND {cond} ORDER BY id ASC LIMIT 1"
        );

        let mut query = sqlx::query(&sql).bind(collection);
        for bind in binds {
            query = query.bind(bind);
        }

        let row = query.fetch_optional(&self.pool).await?;
        Ok(match row {
            Some(row) => Some(row.try_get("doc")?),
            None => None,
        })
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<DocumentStream> {
        use futures_util::stream;

        let (cond, binds) = filter.to_sql(2);
        let sql =
            format!("SELECT doc FROM documents WHERE collection = $1 AND {cond} ORDER BY id ASC");

        let mut query = sqlx::query(&sql).bind(collection);
        for bind in binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let docs: Vec<Result<Value>> = rows
            .into_iter()
            .map(|row| row.try_get("doc").map_err(Into::into))
            .collect();

        Ok(Box::pin(stream::iter(docs)))
    }

    async fn update_one(&self, collection: &str, filter: &Filter, patch: &Patch) -> Result<bool> {
        let (cond, binds) = filter.to_sql(2);
        let patch_param = 2 + binds.len();

        // `doc || patch` is a shallow top-level merge, exactly the
        // set-style semantics the services rely on.
        let sql = format!(
            "UPDATE documents SET doc = doc || ${patch_param} \
             WHERE id = ( \
                 SELECT id FROM documents \
                 WHERE collection = $1 AND {cond} \
                 ORDER BY id ASC LIMIT 1 \
             )"
        );

        let mut query = sqlx::query(&sql).bind(collection);
        for bind in binds {
            query = query.bind(bind);
        }
        query = query.bind(patch.as_object());

        let result = query.execute(&self.pool).await?;
        let updated = result.rows_affected() > 0;
        if updated {
            metrics::counter!("store_documents_updated").increment(1);
        }
        Ok(updated)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let (cond, binds) = filter.to_sql(2);
        let sql = format!("SELECT COUNT(*) FROM documents WHERE collection = $1 AND {cond}");

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(collection);
        for bind in binds {
            query = query.bind(bind);
        }

        let count = query.fetch_one(&self.pool).await?;
        Ok(count as u64)
    }
}
