use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use super::{apply_update, check_guards, Document, Filter, FilterOp, Storage, StorageError, StorageResult, WriteOp};

/// Documents live in one JSONB table keyed by `(collection, id)`.
///
/// A batch runs in a single SQL transaction. Inserts rely on the primary key
/// for uniqueness, updates and deletes lock their row with `FOR UPDATE` before
/// checking guards, so concurrent batches touching the same keys serialize and
/// the loser observes the winner's committed state.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_body(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
    ) -> StorageResult<Option<Value>> {
        let row: Option<(Json<Value>,)> = sqlx::query_as(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE"
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(classify)?;

        Ok(row.map(|(Json(body),)| body))
    }

    async fn apply(tx: &mut Transaction<'_, Postgres>, op: &WriteOp) -> StorageResult<()> {
        match op {
            WriteOp::Insert { collection, document } => {
                let inserted = sqlx::query(
                    "INSERT INTO documents (collection, id, body)
                     VALUES ($1, $2, $3)
                     ON CONFLICT (collection, id) DO NOTHING"
                )
                .bind(collection)
                .bind(&document.id)
                .bind(Json(&document.body))
                .execute(&mut **tx)
                .await
                .map_err(classify)?
                .rows_affected();

                if inserted == 0 {
                    return Err(StorageError::Conflict(format!(
                        "{}/{} already exists",
                        collection, document.id
                    )));
                }
            }
            WriteOp::Update { collection, id, guards, changes } => {
                let mut body = Self::lock_body(tx, collection, id)
                    .await?
                    .ok_or_else(|| StorageError::NotFound {
                        collection: collection.clone(),
                        id: id.clone(),
                    })?;
                apply_update(collection, id, guards, changes, &mut body)?;

                sqlx::query(
                    "UPDATE documents SET body = $3, updated_at = NOW()
                     WHERE collection = $1 AND id = $2"
                )
                .bind(collection)
                .bind(id)
                .bind(Json(&body))
                .execute(&mut **tx)
                .await
                .map_err(classify)?;
            }
            WriteOp::Delete { collection, id, guards } => {
                if let Some(body) = Self::lock_body(tx, collection, id).await? {
                    check_guards(collection, id, guards, &body)?;
                    sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                        .bind(collection)
                        .bind(id)
                        .execute(&mut **tx)
                        .await
                        .map_err(classify)?;
                }
            }
        }
        Ok(())
    }
}

/// `$1` is the collection; each filter then binds its field name and its
/// JSON value, in order.
fn select_sql(filters: &[Filter]) -> String {
    let mut q = String::from("SELECT id, body FROM documents WHERE collection = $1");
    let mut bind_idx = 2;
    for filter in filters {
        match filter.op {
            // containment so the GIN index on body applies
            FilterOp::Eq => q.push_str(&format!(
                " AND body @> jsonb_build_object(${}::text, ${}::jsonb)",
                bind_idx,
                bind_idx + 1
            )),
            FilterOp::In => q.push_str(&format!(
                " AND ${}::jsonb @> jsonb_build_array(body -> ${})",
                bind_idx + 1,
                bind_idx
            )),
        }
        bind_idx += 2;
    }
    q.push_str(" ORDER BY id");
    q
}

/// Unique violations, deadlocks and serialization failures all mean another
/// writer won the race.
fn classify(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code() {
            if matches!(code.as_ref(), "23505" | "40001" | "40P01") {
                return StorageError::Conflict(db_err.message().to_string());
            }
        }
    }
    StorageError::Database(err)
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        let row: Option<(String, Json<Value>)> = sqlx::query_as(
            "SELECT id, body FROM documents WHERE collection = $1 AND id = $2"
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, Json(body))| Document::new(id, body)))
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> StorageResult<Vec<Document>> {
        let q = select_sql(filters);

        let mut dbq = sqlx::query_as::<_, (String, Json<Value>)>(&q).bind(collection);
        for filter in filters {
            dbq = dbq.bind(filter.field.as_str()).bind(Json(&filter.value));
        }

        let rows = dbq.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(id, Json(body))| Document::new(id, body)).collect())
    }

    async fn atomic_write(&self, ops: Vec<WriteOp>) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        for op in &ops {
            if let Err(e) = Self::apply(&mut tx, op).await {
                warn!("Rolling back batch of {} operations: {}", ops.len(), e);
                let _ = tx.rollback().await;
                return Err(e);
            }
        }

        tx.commit().await.map_err(classify)?;
        debug!("Committed batch of {} operations", ops.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_query_only_binds_the_collection() {
        assert_eq!(
            select_sql(&[]),
            "SELECT id, body FROM documents WHERE collection = $1 ORDER BY id"
        );
    }

    #[test]
    fn filters_bind_field_then_value_in_order() {
        let sql = select_sql(&[
            Filter::eq("showtime_id", "s1"),
            Filter::is_in("status", ["PENDING", "CONFIRMED"]),
        ]);
        assert_eq!(
            sql,
            "SELECT id, body FROM documents WHERE collection = $1 \
             AND body @> jsonb_build_object($2::text, $3::jsonb) \
             AND $5::jsonb @> jsonb_build_array(body -> $4) \
             ORDER BY id"
        );
    }

    #[test]
    fn non_database_errors_are_not_conflicts() {
        assert!(matches!(classify(sqlx::Error::RowNotFound), StorageError::Database(_)));
        assert!(matches!(classify(sqlx::Error::PoolTimedOut), StorageError::Database(_)));
    }
}
