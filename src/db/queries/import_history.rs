//! Import history queries

use anyhow::Result;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::types::{ImportHistory, NewImportHistory};

/// Record one finished import
pub async fn insert_history(
    conn: &mut PgConnection,
    entry: &NewImportHistory,
) -> Result<ImportHistory, sqlx::Error> {
    sqlx::query_as::<_, ImportHistory>(
        r#"
        INSERT INTO import_history (
            id, filename, original_filename, total_rows, created_count,
            skipped_count, error_count, created_by, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
        RETURNING
            id, filename, original_filename, total_rows, created_count,
            skipped_count, error_count, created_by, created_at
        "#
    )
    .bind(Uuid::new_v4())
    .bind(&entry.filename)
    .bind(&entry.original_filename)
    .bind(entry.total_rows)
    .bind(entry.created_count)
    .bind(entry.skipped_count)
    .bind(entry.error_count)
    .bind(entry.created_by)
    .fetch_one(&mut *conn)
    .await
}

/// List imports, newest first
pub async fn list_history(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<ImportHistory>> {
    let items = sqlx::query_as::<_, ImportHistory>(
        r#"
        SELECT
            id, filename, original_filename, total_rows, created_count,
            skipped_count, error_count, created_by, created_at
        FROM import_history
        ORDER BY created_at DESC, id
        LIMIT $1 OFFSET $2
        "#
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(items)
}

pub async fn count_history(pool: &PgPool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM import_history")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Get one import by id
pub async fn get_history(pool: &PgPool, id: Uuid) -> Result<Option<ImportHistory>> {
    let entry = sqlx::query_as::<_, ImportHistory>(
        r#"
        SELECT
            id, filename, original_filename, total_rows, created_count,
            skipped_count, error_count, created_by, created_at
        FROM import_history
        WHERE id = $1
        "#
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(entry)
}
