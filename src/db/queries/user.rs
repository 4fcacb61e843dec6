//! User directory queries

use anyhow::Result;
use sqlx::PgPool;

use crate::types::user::DirectoryUser;

/// All users, for staff-assignment lookups during an import
pub async fn list_directory(pool: &PgPool) -> Result<Vec<DirectoryUser>> {
    let users = sqlx::query_as::<_, DirectoryUser>(
        r#"
        SELECT id, name, email, role
        FROM users
        ORDER BY name
        "#
    )
    .fetch_all(pool)
    .await?;

    Ok(users)
}

/// Get user by email (case-insensitive), used by the command-line import
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<DirectoryUser>> {
    let user = sqlx::query_as::<_, DirectoryUser>(
        r#"
        SELECT id, name, email, role
        FROM users
        WHERE lower(email) = lower($1)
        "#
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await?;

    Ok(user)
}
