//! Relational loader: the all-or-nothing data refresh.
//!
//! One load cycle rebuilds every table from the upstream API inside a single
//! transaction: agencies and their CFR references, titles, per-chapter word
//! counts (with a NULL-chapter total row per title), and version histories.
//! Any error rolls the transaction back, leaving the tables exactly as they
//! were.
//!
//! The vector store is cleared *before* the transaction opens and is not
//! covered by it: a load that fails after the clear leaves the vector store
//! empty while the relational tables keep their previous contents.

use anyhow::{bail, Context, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::api::EcfrClient;
use crate::config::Config;
use crate::db;
use crate::index::{ChapterIndex, IndexOutcome};
use crate::migrate;
use crate::models::TitleRecord;
use crate::wordcount;

const TABLES: &[&str] = &[
    "titles",
    "agencies",
    "agency_cfr_references",
    "word_counts",
    "content_versions",
];

#[derive(Debug, Default)]
pub struct LoadCounts {
    pub agencies: u64,
    pub cfr_references: u64,
    pub titles: u64,
    pub word_count_rows: u64,
    pub content_versions: u64,
    pub index: IndexOutcome,
}

/// Run one full refresh against the configured API endpoints.
pub async fn run_load(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    let vector_pool = db::connect(&config.vector.path).await?;
    migrate::create_relational_schema(&pool).await?;
    migrate::create_vector_schema(&vector_pool).await?;

    let client = EcfrClient::new(&config.api)?;
    let index = ChapterIndex::new(&vector_pool, &config.embedding, &config.chunking);

    let result = refresh(&pool, &client, &index, config).await;

    pool.close().await;
    vector_pool.close().await;

    let counts = result?;

    println!("Final table counts:");
    println!("  titles: {} rows", counts.titles);
    println!("  agencies: {} rows", counts.agencies);
    println!("  agency_cfr_references: {} rows", counts.cfr_references);
    println!("  word_counts: {} rows", counts.word_count_rows);
    println!("  content_versions: {} rows", counts.content_versions);
    println!(
        "  indexed chapters: {} ({} chunks, {} embedded, {} skipped as too short)",
        counts.index.chapters_indexed,
        counts.index.chunks_stored,
        counts.index.chunks_embedded,
        counts.index.chapters_skipped
    );
    println!("ok");

    Ok(())
}

async fn refresh(
    pool: &SqlitePool,
    client: &EcfrClient,
    index: &ChapterIndex<'_>,
    config: &Config,
) -> Result<LoadCounts> {
    // Not transactional: see the module docs for the divergence window.
    let cleared = index.clear().await?;
    if cleared > 0 {
        println!("Deleted {} existing documents from the vector store", cleared);
    }

    if !config.embedding.is_enabled() {
        println!("Embedding provider disabled; chapter documents will be stored without vectors");
    }

    let mut tx = pool.begin().await?;

    match load_all(&mut tx, client, index, config).await {
        Ok(counts) => {
            tx.commit().await?;
            Ok(counts)
        }
        Err(e) => {
            eprintln!("Error loading data, rolling back: {}", e);
            tx.rollback().await?;
            Err(e)
        }
    }
}

async fn load_all(
    tx: &mut Transaction<'_, Sqlite>,
    client: &EcfrClient,
    index: &ChapterIndex<'_>,
    config: &Config,
) -> Result<LoadCounts> {
    let mut counts = LoadCounts::default();

    for table in TABLES {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut **tx)
            .await?;
    }

    let agencies = client.fetch_agencies().await?;
    println!("Fetched {} agencies", agencies.len());
    if agencies.is_empty() {
        bail!("agency fetch returned no data");
    }

    for agency in &agencies {
        sqlx::query(
            r#"
            INSERT INTO agencies (name, short_name, display_name, sortable_name, slug)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&agency.name)
        .bind(&agency.short_name)
        .bind(&agency.display_name)
        .bind(&agency.sortable_name)
        .bind(&agency.slug)
        .execute(&mut **tx)
        .await?;
        counts.agencies += 1;

        for reference in &agency.cfr_references {
            let Some(title) = reference.title else {
                continue;
            };
            sqlx::query(
                "INSERT INTO agency_cfr_references (agency_name, title, chapter) VALUES (?, ?, ?)",
            )
            .bind(&agency.name)
            .bind(title)
            .bind(&reference.chapter)
            .execute(&mut **tx)
            .await?;
            counts.cfr_references += 1;
        }
    }

    let titles = client.fetch_titles().await?;
    println!("Fetched {} titles", titles.len());
    if titles.is_empty() {
        bail!("title fetch returned no data");
    }

    for title in &titles {
        load_title(tx, client, index, config, title, &mut counts)
            .await
            .with_context(|| format!("loading title {}", title.number))?;
    }

    Ok(counts)
}

async fn load_title(
    tx: &mut Transaction<'_, Sqlite>,
    client: &EcfrClient,
    index: &ChapterIndex<'_>,
    config: &Config,
    title: &TitleRecord,
    counts: &mut LoadCounts,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO titles (number, name, latest_amended_on, latest_issue_date, up_to_date_as_of, reserved)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(title.number)
    .bind(&title.name)
    .bind(title.latest_amended_on)
    .bind(title.latest_issue_date)
    .bind(title.up_to_date_as_of)
    .bind(title.reserved)
    .execute(&mut **tx)
    .await?;
    counts.titles += 1;

    // Word counts need the full XML, which is only addressable by issue date.
    match title.latest_issue_date {
        Some(date) => {
            println!("Counting words for title {}...", title.number);
            match client.fetch_full_xml(title.number, date).await {
                Ok(xml) => {
                    if let Some(extraction) = wordcount::extract_title(&xml) {
                        for chapter in &extraction.chapters {
                            sqlx::query(
                                "INSERT INTO word_counts (title, chapter, date, word_count) VALUES (?, ?, ?, ?)",
                            )
                            .bind(title.number)
                            .bind(&chapter.id)
                            .bind(date)
                            .bind(chapter.word_count as i64)
                            .execute(&mut **tx)
                            .await?;
                            counts.word_count_rows += 1;
                        }

                        // NULL chapter marks the whole-title total.
                        sqlx::query(
                            "INSERT INTO word_counts (title, chapter, date, word_count) VALUES (?, NULL, ?, ?)",
                        )
                        .bind(title.number)
                        .bind(date)
                        .bind(extraction.total_words as i64)
                        .execute(&mut **tx)
                        .await?;
                        counts.word_count_rows += 1;

                        if title.number <= config.indexing.max_indexed_title {
                            let outcome = index
                                .index_title(title.number, &extraction, &config.indexing)
                                .await;
                            counts.index.absorb(outcome);
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Warning: failed to fetch XML for title {}: {}", title.number, e);
                }
            }
        }
        None => {
            println!(
                "Skipping content for title {} (no issue date)",
                title.number
            );
        }
    }

    match client.fetch_title_versions(title.number).await {
        Ok(versions) => {
            if versions.is_empty() {
                println!("No version data found for title {}", title.number);
            }
            for version in &versions {
                sqlx::query(
                    r#"
                    INSERT INTO content_versions
                        (title, part, identifier, name, date, amendment_date, issue_date,
                         substantive, removed, subpart, type)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(title.number)
                .bind(&version.part)
                .bind(&version.identifier)
                .bind(&version.name)
                .bind(version.date)
                .bind(version.amendment_date)
                .bind(version.issue_date)
                .bind(version.substantive)
                .bind(version.removed)
                .bind(&version.subpart)
                .bind(&version.version_type)
                .execute(&mut **tx)
                .await?;
                counts.content_versions += 1;
            }
        }
        Err(e) => {
            eprintln!(
                "Warning: failed to fetch versions for title {}: {}",
                title.number, e
            );
        }
    }

    Ok(())
}
