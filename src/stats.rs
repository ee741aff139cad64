//! Database overview: row counts per relational table plus vector-store
//! coverage. A quick check that a load did what it claimed.

use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;

    println!("eCFR Analyzer — Database Stats");
    println!("==============================");
    println!();
    println!("  Relational: {}", config.db.path.display());

    for table in [
        "titles",
        "agencies",
        "agency_cfr_references",
        "word_counts",
        "content_versions",
    ] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&pool)
            .await?;
        println!("  {:<24} {:>8} rows", table, count);
    }

    pool.close().await;

    let vector_pool = db::connect(&config.vector.path).await?;

    let docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapter_documents")
        .fetch_one(&vector_pool)
        .await?;
    let vectors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapter_vectors")
        .fetch_one(&vector_pool)
        .await?;

    println!();
    println!("  Vector store: {}", config.vector.path.display());
    println!("  {:<24} {:>8} rows", "chapter_documents", docs);
    println!(
        "  {:<24} {:>8} rows ({}% coverage)",
        "chapter_vectors",
        vectors,
        if docs > 0 { (vectors * 100) / docs } else { 0 }
    );

    vector_pool.close().await;
    Ok(())
}
