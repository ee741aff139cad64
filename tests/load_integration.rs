//! End-to-end load tests against a mock eCFR API.
//!
//! The fixture mirrors the canonical load scenario: 2 agencies, 3 titles
//! (one with two chapters, one with none, one reserved), and version
//! payloads of sizes {2, 5, 0}. Embeddings stay disabled so everything runs
//! offline; chapter documents are still stored.

use httpmock::prelude::*;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

use ecfr_analyzer::config::{
    ApiConfig, ChunkingConfig, Config, DbConfig, EmbeddingConfig, IndexingConfig,
    SimilarityConfig, VectorConfig,
};
use ecfr_analyzer::{db, load, migrate};

const ISSUE_DATE: &str = "2024-02-01";

fn test_config(server_base: &str, root: &Path) -> Config {
    Config {
        db: DbConfig {
            path: root.join("ecfr.sqlite"),
        },
        vector: VectorConfig {
            path: root.join("ecfr_vectors.sqlite"),
        },
        api: ApiConfig {
            versioner_url: format!("{}/versioner", server_base),
            admin_url: format!("{}/admin", server_base),
            timeout_secs: 5,
            max_retries: 0,
        },
        chunking: ChunkingConfig::default(),
        indexing: IndexingConfig::default(),
        similarity: SimilarityConfig::default(),
        embedding: EmbeddingConfig::default(), // provider = "disabled"
    }
}

fn agencies_payload() -> serde_json::Value {
    json!({
        "agencies": [
            {
                "name": "Department of Examples",
                "short_name": "DOE",
                "display_name": "Department of Examples",
                "sortable_name": "Examples, Department of",
                "slug": "department-of-examples",
                "cfr_references": [ { "title": 1, "chapter": "I" } ]
            },
            {
                "name": "O'Neill Review Commission",
                "short_name": null,
                "display_name": "O'Neill Review Commission",
                "sortable_name": "O'Neill Review Commission",
                "slug": "oneill-review-commission",
                "cfr_references": []
            }
        ]
    })
}

fn titles_payload() -> serde_json::Value {
    json!({
        "titles": [
            {
                "number": 1,
                "name": "General Provisions",
                "latest_amended_on": "2024-01-15",
                "latest_issue_date": ISSUE_DATE,
                "up_to_date_as_of": "2024-03-01",
                "reserved": false
            },
            {
                "number": 2,
                "name": "Grants and Agreements",
                "latest_amended_on": null,
                "latest_issue_date": ISSUE_DATE,
                "up_to_date_as_of": "2024-03-01",
                "reserved": false
            },
            {
                "number": 3,
                "name": "The President",
                "latest_amended_on": null,
                "latest_issue_date": ISSUE_DATE,
                "up_to_date_as_of": null,
                "reserved": true
            }
        ]
    })
}

/// Title 1: two chapters. Chapter I's cleaned text is 101 characters (one
/// word), just over the indexing threshold; chapter II's is exactly 100
/// (at the threshold, so skipped).
fn title_1_xml() -> String {
    let indexed_word = "b".repeat(101);
    let skipped_word = "c".repeat(100);
    format!(
        r#"<ECFR><DIV1 TYPE="TITLE" N="1">
            <DIV3 TYPE="CHAPTER" N="I"><P>{}</P></DIV3>
            <DIV3 TYPE="CHAPTER" N="II"><P>{}</P></DIV3>
        </DIV1></ECFR>"#,
        indexed_word, skipped_word
    )
}

fn title_2_xml() -> String {
    r#"<ECFR><DIV1 TYPE="TITLE" N="2"><P>a short chapterless title</P></DIV1></ECFR>"#.to_string()
}

fn title_3_xml() -> String {
    r#"<ECFR><DIV1 TYPE="TITLE" N="3"><P>reserved</P></DIV1></ECFR>"#.to_string()
}

fn version(identifier: &str, substantive: bool) -> serde_json::Value {
    json!({
        "date": "2023-05-01",
        "amendment_date": "2023-05-01",
        "issue_date": "2023-05-02",
        "identifier": identifier,
        "name": format!("§ {} Example section", identifier),
        "part": "1",
        "substantive": substantive,
        "removed": false,
        "subpart": null,
        "type": "section"
    })
}

fn versions_payload(count: usize) -> serde_json::Value {
    let versions: Vec<serde_json::Value> = (0..count)
        .map(|i| version(&format!("1.{}", i + 1), i % 2 == 0))
        .collect();
    json!({ "content_versions": versions })
}

async fn mount_lists(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/admin/agencies.json");
            then.status(200).json_body(agencies_payload());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/versioner/titles.json");
            then.status(200).json_body(titles_payload());
        })
        .await;
}

async fn mount_xml(server: &MockServer, title_number: i64, xml: String) {
    server
        .mock_async(move |when, then| {
            when.method(GET).path(format!(
                "/versioner/full/{}/title-{}.xml",
                ISSUE_DATE, title_number
            ));
            then.status(200)
                .header("content-type", "application/xml")
                .body(xml);
        })
        .await;
}

async fn mount_versions(server: &MockServer, title_number: i64, status: u16, count: usize) {
    server
        .mock_async(move |when, then| {
            when.method(GET)
                .path(format!("/versioner/versions/title-{}.json", title_number));
            if status == 200 {
                then.status(200).json_body(versions_payload(count));
            } else {
                then.status(status);
            }
        })
        .await;
}

/// The full happy-path fixture.
async fn mount_fixture(server: &MockServer) {
    mount_lists(server).await;
    mount_xml(server, 1, title_1_xml()).await;
    mount_xml(server, 2, title_2_xml()).await;
    mount_xml(server, 3, title_3_xml()).await;
    mount_versions(server, 1, 200, 2).await;
    mount_versions(server, 2, 200, 5).await;
    mount_versions(server, 3, 200, 0).await;
}

async fn table_count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn full_load_end_to_end() {
    let server = MockServer::start_async().await;
    let tmp = TempDir::new().unwrap();
    let config = test_config(&server.base_url(), tmp.path());
    mount_fixture(&server).await;

    migrate::run_migrations(&config).await.unwrap();
    load::run_load(&config).await.unwrap();

    let pool = db::connect(&config.db.path).await.unwrap();

    assert_eq!(table_count(&pool, "titles").await, 3);
    assert_eq!(table_count(&pool, "agencies").await, 2);
    assert_eq!(table_count(&pool, "agency_cfr_references").await, 1);
    // 2 chapter rows (title 1) + one total row per title
    assert_eq!(table_count(&pool, "word_counts").await, 5);
    // versions: 2 + 5 + 0
    assert_eq!(table_count(&pool, "content_versions").await, 7);

    // exactly one NULL-chapter (total) row per title
    let per_title: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT title, COUNT(*) FROM word_counts WHERE chapter IS NULL GROUP BY title",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(per_title.len(), 3);
    assert!(per_title.iter().all(|(_, n)| *n == 1));

    // quote characters in agency names survive parameterized inserts
    let quoted: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agencies WHERE name = ?")
        .bind("O'Neill Review Commission")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(quoted, 1);

    pool.close().await;

    // 101-char chapter indexed, 100-char chapter skipped (strict > threshold)
    let vector_pool = db::connect(&config.vector.path).await.unwrap();
    let doc_ids: Vec<String> = sqlx::query_scalar("SELECT id FROM chapter_documents ORDER BY id")
        .fetch_all(&vector_pool)
        .await
        .unwrap();
    assert_eq!(doc_ids, vec!["title_1_chapter_I".to_string()]);
    // embeddings disabled: documents stored without vectors
    assert_eq!(table_count(&vector_pool, "chapter_vectors").await, 0);
    vector_pool.close().await;
}

#[tokio::test]
async fn reload_replaces_rather_than_duplicates() {
    let server = MockServer::start_async().await;
    let tmp = TempDir::new().unwrap();
    let config = test_config(&server.base_url(), tmp.path());
    mount_fixture(&server).await;

    migrate::run_migrations(&config).await.unwrap();
    load::run_load(&config).await.unwrap();
    load::run_load(&config).await.unwrap();

    let pool = db::connect(&config.db.path).await.unwrap();
    assert_eq!(table_count(&pool, "titles").await, 3);
    assert_eq!(table_count(&pool, "word_counts").await, 5);
    assert_eq!(table_count(&pool, "content_versions").await, 7);
    pool.close().await;

    let vector_pool = db::connect(&config.vector.path).await.unwrap();
    assert_eq!(table_count(&vector_pool, "chapter_documents").await, 1);
    vector_pool.close().await;
}

#[tokio::test]
async fn empty_agency_list_rolls_back_relational_state() {
    let server = MockServer::start_async().await;
    let tmp = TempDir::new().unwrap();
    let config = test_config(&server.base_url(), tmp.path());

    // First, a successful load establishes the pre-state.
    mount_fixture(&server).await;
    migrate::run_migrations(&config).await.unwrap();
    load::run_load(&config).await.unwrap();

    // Now the agency endpoint goes empty; the reload must fail and leave
    // every relational table at its pre-call state.
    server.reset_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/admin/agencies.json");
            then.status(200).json_body(json!({ "agencies": [] }));
        })
        .await;

    let result = load::run_load(&config).await;
    assert!(result.is_err(), "load must fail on an empty agency list");

    let pool = db::connect(&config.db.path).await.unwrap();
    assert_eq!(table_count(&pool, "titles").await, 3);
    assert_eq!(table_count(&pool, "agencies").await, 2);
    assert_eq!(table_count(&pool, "word_counts").await, 5);
    assert_eq!(table_count(&pool, "content_versions").await, 7);
    pool.close().await;

    // The vector store was cleared before the transaction opened: the
    // documented divergence window, asserted rather than papered over.
    let vector_pool = db::connect(&config.vector.path).await.unwrap();
    assert_eq!(table_count(&vector_pool, "chapter_documents").await, 0);
    vector_pool.close().await;
}

#[tokio::test]
async fn version_fetch_failure_is_logged_and_skipped() {
    let server = MockServer::start_async().await;
    let tmp = TempDir::new().unwrap();
    let config = test_config(&server.base_url(), tmp.path());

    mount_lists(&server).await;
    mount_xml(&server, 1, title_1_xml()).await;
    mount_xml(&server, 2, title_2_xml()).await;
    mount_xml(&server, 3, title_3_xml()).await;
    mount_versions(&server, 1, 200, 2).await;
    mount_versions(&server, 2, 500, 0).await; // server error for title 2
    mount_versions(&server, 3, 200, 0).await;

    migrate::run_migrations(&config).await.unwrap();
    load::run_load(&config).await.unwrap();

    let pool = db::connect(&config.db.path).await.unwrap();
    // title 2's versions are gone; everything else still loads
    assert_eq!(table_count(&pool, "titles").await, 3);
    assert_eq!(table_count(&pool, "content_versions").await, 2);
    pool.close().await;
}

#[tokio::test]
async fn xml_fetch_failure_skips_word_counts_for_that_title() {
    let server = MockServer::start_async().await;
    let tmp = TempDir::new().unwrap();
    let config = test_config(&server.base_url(), tmp.path());

    // No XML endpoint for title 2: the mock server answers 404, a
    // non-retryable failure for that resource only.
    mount_lists(&server).await;
    mount_xml(&server, 1, title_1_xml()).await;
    mount_xml(&server, 3, title_3_xml()).await;
    mount_versions(&server, 1, 200, 0).await;
    mount_versions(&server, 2, 200, 0).await;
    mount_versions(&server, 3, 200, 0).await;

    migrate::run_migrations(&config).await.unwrap();
    load::run_load(&config).await.unwrap();

    let pool = db::connect(&config.db.path).await.unwrap();
    assert_eq!(table_count(&pool, "titles").await, 3);
    // titles 1 and 3 produce 3 + 1 rows; title 2 produces none
    assert_eq!(table_count(&pool, "word_counts").await, 4);
    let title_2_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM word_counts WHERE title = 2")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(title_2_rows, 0);
    pool.close().await;
}

#[tokio::test]
async fn init_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let config = test_config("http://127.0.0.1:1", tmp.path());

    migrate::run_migrations(&config).await.unwrap();
    migrate::run_migrations(&config).await.unwrap();

    let pool = db::connect(&config.db.path).await.unwrap();
    assert_eq!(table_count(&pool, "titles").await, 0);
    pool.close().await;
}
