use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create both databases and their schemas. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    create_relational_schema(&pool).await?;
    pool.close().await;

    let vector_pool = db::connect(&config.vector.path).await?;
    create_vector_schema(&vector_pool).await?;
    vector_pool.close().await;

    Ok(())
}

/// The five relational tables. No foreign keys: rows only ever reference
/// titles/agencies loaded in the same transaction, so integrity comes from
/// the all-or-nothing refresh rather than declared constraints.
pub async fn create_relational_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS titles (
            number INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            latest_amended_on TEXT,
            latest_issue_date TEXT,
            up_to_date_as_of TEXT,
            reserved INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agencies (
            name TEXT PRIMARY KEY,
            short_name TEXT,
            display_name TEXT,
            sortable_name TEXT,
            slug TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agency_cfr_references (
            agency_name TEXT NOT NULL,
            title INTEGER NOT NULL,
            chapter TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // A NULL chapter row holds the whole-title total.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS word_counts (
            title INTEGER NOT NULL,
            chapter TEXT,
            date TEXT,
            word_count INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_versions (
            title INTEGER NOT NULL,
            part TEXT,
            identifier TEXT,
            name TEXT,
            date TEXT,
            amendment_date TEXT,
            issue_date TEXT,
            substantive INTEGER,
            removed INTEGER,
            subpart TEXT,
            type TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_word_counts_title ON word_counts(title)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_content_versions_title ON content_versions(title)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_agency_refs_agency ON agency_cfr_references(agency_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Vector store: one row per stored chunk document plus its embedding.
/// Document ids are deterministic (`title_{T}_chapter_{C}[_chunk_{i}]`), so
/// reloads replace rather than duplicate.
pub async fn create_vector_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chapter_documents (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            chapter TEXT NOT NULL,
            word_count INTEGER NOT NULL,
            doc_type TEXT NOT NULL DEFAULT 'chapter_text',
            chunk INTEGER,
            total_chunks INTEGER,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chapter_vectors (
            doc_id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chapter_documents_title ON chapter_documents(title)")
        .execute(pool)
        .await?;

    Ok(())
}
