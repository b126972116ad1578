//! Database module
//!
//! Connectivity and schema checks. The schema itself lives in raw SQL under
//! `migrations/`.

use sqlx::PgPool;

/// Tables the ledger cannot run without
pub const REQUIRED_TABLES: [&str; 4] = ["accounts", "transactions", "top_up_logs", "user_privileges"];

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    // The append-only guard on transactions is part of the schema contract
    let guarded: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM pg_trigger WHERE tgname = 'transactions_append_only')",
    )
    .fetch_one(pool)
    .await?;

    if !guarded {
        tracing::error!("Trigger 'transactions_append_only' is missing");
        return Ok(false);
    }

    tracing::info!("Database schema verified");
    Ok(true)
}
