//! Plain-text reporting views over the loaded data: word counts by title,
//! chapter, and agency; version-history summaries; and a structure-tree
//! inspector. These are the CLI counterparts of the downstream reporting
//! layer — no charts, just tables.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use sqlx::Row;

use crate::api::EcfrClient;
use crate::config::Config;
use crate::db;

/// Word-count report: totals per title, breakdown per chapter, and
/// optionally the per-agency aggregation over its CFR references.
pub async fn run_word_counts(config: &Config, by_agency: bool) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;

    let totals = sqlx::query(
        r#"
        SELECT t.number, t.name, wc.word_count
        FROM titles t
        LEFT JOIN word_counts wc ON wc.title = t.number AND wc.chapter IS NULL
        ORDER BY t.number
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if totals.is_empty() {
        println!("No titles loaded. Run `ecfr load` first.");
        pool.close().await;
        return Ok(());
    }

    println!("Total words by title:");
    println!("  {:<7} {:<52} {:>12}", "TITLE", "NAME", "WORDS");
    for row in &totals {
        let number: i64 = row.get("number");
        let name: String = row.get("name");
        let words: Option<i64> = row.get("word_count");
        println!(
            "  {:<7} {:<52} {:>12}",
            number,
            truncate(&name, 52),
            words.map(|w| w.to_string()).unwrap_or_else(|| "-".into())
        );
    }

    let chapters = sqlx::query(
        r#"
        SELECT title, chapter, word_count
        FROM word_counts
        WHERE chapter IS NOT NULL
        ORDER BY title, chapter
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !chapters.is_empty() {
        println!();
        println!("Words by chapter:");
        println!("  {:<7} {:<10} {:>12}", "TITLE", "CHAPTER", "WORDS");
        for row in &chapters {
            let title: i64 = row.get("title");
            let chapter: String = row.get("chapter");
            let words: i64 = row.get("word_count");
            println!("  {:<7} {:<10} {:>12}", title, chapter, words);
        }
    }

    if by_agency {
        let agencies = sqlx::query(
            r#"
            SELECT COALESCE(a.display_name, a.name) AS agency,
                   SUM(wc.word_count) AS total_words
            FROM agencies a
            JOIN agency_cfr_references r ON r.agency_name = a.name
            JOIN word_counts wc ON wc.title = r.title AND wc.chapter = r.chapter
            GROUP BY a.name
            ORDER BY total_words DESC
            "#,
        )
        .fetch_all(&pool)
        .await?;

        println!();
        println!("Words by agency:");
        println!("  {:<60} {:>12}", "AGENCY", "WORDS");
        for row in &agencies {
            let agency: String = row.get("agency");
            let words: i64 = row.get("total_words");
            println!("  {:<60} {:>12}", truncate(&agency, 60), words);
        }
    }

    pool.close().await;
    Ok(())
}

/// Version-history summary per title: total and substantive change counts
/// with the first and last recorded change dates.
pub async fn run_versions(config: &Config, title_filter: Option<i64>) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;

    let mut sql = String::from(
        r#"
        SELECT cv.title, t.name,
               COUNT(*) AS total,
               SUM(CASE WHEN cv.substantive THEN 1 ELSE 0 END) AS substantive,
               MIN(cv.date) AS first_date,
               MAX(cv.date) AS last_date
        FROM content_versions cv
        LEFT JOIN titles t ON t.number = cv.title
        "#,
    );
    if title_filter.is_some() {
        sql.push_str("WHERE cv.title = ? ");
    }
    sql.push_str("GROUP BY cv.title ORDER BY cv.title");

    let mut query = sqlx::query(&sql);
    if let Some(title) = title_filter {
        query = query.bind(title);
    }
    let rows = query.fetch_all(&pool).await?;

    if rows.is_empty() {
        println!("No version history loaded. Run `ecfr load` first.");
        pool.close().await;
        return Ok(());
    }

    println!("Content versions by title:");
    println!(
        "  {:<7} {:<36} {:>8} {:>12}   {:<10}   {:<10}",
        "TITLE", "NAME", "TOTAL", "SUBSTANTIVE", "FIRST", "LAST"
    );
    for row in &rows {
        let title: i64 = row.get("title");
        let name: Option<String> = row.get("name");
        let total: i64 = row.get("total");
        let substantive: i64 = row.get("substantive");
        let first: Option<String> = row.get("first_date");
        let last: Option<String> = row.get("last_date");
        println!(
            "  {:<7} {:<36} {:>8} {:>12}   {:<10}   {:<10}",
            title,
            truncate(name.as_deref().unwrap_or("(unknown)"), 36),
            total,
            substantive,
            first.unwrap_or_else(|| "-".into()),
            last.unwrap_or_else(|| "-".into())
        );
    }

    pool.close().await;
    Ok(())
}

/// Fetch and summarize the JSON structure tree for one title: node counts
/// per structural type under the root.
pub async fn run_structure(config: &Config, title_number: i64) -> Result<()> {
    let date = resolve_issue_date(config, title_number).await?;
    let client = EcfrClient::new(&config.api)?;
    let tree = client.fetch_title_structure(title_number, date).await?;

    let label = tree
        .get("label")
        .and_then(|l| l.as_str())
        .unwrap_or("(unlabeled)");
    println!("Structure of title {} as of {}:", title_number, date);
    println!("  root: {}", label);

    let mut counts: Vec<(String, usize)> = Vec::new();
    count_node_types(&tree, &mut counts);
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    println!("  nodes by type:");
    for (node_type, count) in &counts {
        println!("    {:<16} {:>6}", node_type, count);
    }

    Ok(())
}

/// Issue date for a title: prefer the loaded row, fall back to the API.
async fn resolve_issue_date(config: &Config, title_number: i64) -> Result<NaiveDate> {
    let pool = db::connect(&config.db.path).await?;
    let stored: Option<Option<NaiveDate>> =
        sqlx::query_scalar("SELECT latest_issue_date FROM titles WHERE number = ?")
            .bind(title_number)
            .fetch_optional(&pool)
            .await
            .unwrap_or(None);
    pool.close().await;

    if let Some(Some(date)) = stored {
        return Ok(date);
    }

    let client = EcfrClient::new(&config.api)?;
    let titles = client.fetch_titles().await?;
    let title = titles
        .iter()
        .find(|t| t.number == title_number)
        .ok_or_else(|| anyhow::anyhow!("Title {} not found", title_number))?;
    match title.latest_issue_date {
        Some(date) => Ok(date),
        None => bail!("Title {} has no issue date (reserved?)", title_number),
    }
}

fn count_node_types(node: &serde_json::Value, counts: &mut Vec<(String, usize)>) {
    if let Some(node_type) = node.get("type").and_then(|t| t.as_str()) {
        match counts.iter_mut().find(|(t, _)| t == node_type) {
            Some((_, count)) => *count += 1,
            None => counts.push((node_type.to_string(), 1)),
        }
    }
    if let Some(children) = node.get("children").and_then(|c| c.as_array()) {
        for child in children {
            count_node_types(child, counts);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_counting_walks_children() {
        let tree = serde_json::json!({
            "type": "title",
            "children": [
                { "type": "chapter", "children": [ { "type": "part" }, { "type": "part" } ] },
                { "type": "chapter" }
            ]
        });
        let mut counts = Vec::new();
        count_node_types(&tree, &mut counts);
        counts.sort();
        assert_eq!(
            counts,
            vec![
                ("chapter".to_string(), 2),
                ("part".to_string(), 2),
                ("title".to_string(), 1)
            ]
        );
    }

    #[test]
    fn truncate_preserves_short_strings() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly-10", 10), "exactly-10");
        assert!(truncate("a much longer string than allowed", 10).ends_with('…'));
    }
}
