//! Similarity scanner: cross-title near-duplicate detection.
//!
//! Every stored chapter document probes the corpus with its own embedding
//! (the stored vector *is* the embedding of its text) for up to
//! `min(neighbors_per_doc, total_docs - 1)` nearest neighbors. Same-title
//! pairs are discarded — only cross-title redundancy is interesting — and
//! (i,j)/(j,i) collapse onto one unordered pair key. Distances convert to
//! similarity via `(2 - d) / 2` (cosine distance in [0,2] maps to [1,0]),
//! and the strongest pairs are reported with both documents' full content.

use anyhow::Result;
use sqlx::Row;
use std::collections::HashSet;

use crate::config::Config;
use crate::db;
use crate::embedding;

/// One stored document with its embedding, as loaded from the vector store.
#[derive(Debug, Clone)]
pub struct ScanDoc {
    pub id: String,
    pub title: String,
    pub chapter: String,
    pub word_count: i64,
    pub content: String,
    pub vector: Vec<f32>,
}

/// One side of a reported pair.
#[derive(Debug, Clone)]
pub struct PairSide {
    pub title: String,
    pub chapter: String,
    pub word_count: i64,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct SimilarPair {
    pub similarity: f64,
    pub left: PairSide,
    pub right: PairSide,
}

/// Run the scan and print the top pairs side by side.
pub async fn run_similar(config: &Config) -> Result<()> {
    let pool = db::connect(&config.vector.path).await?;

    let rows = sqlx::query(
        r#"
        SELECT d.id, d.title, d.chapter, d.word_count, d.content, v.embedding
        FROM chapter_documents d
        LEFT JOIN chapter_vectors v ON v.doc_id = d.id
        ORDER BY d.id
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if rows.is_empty() {
        println!("No documents found in the vector store. Run `ecfr load` first.");
        pool.close().await;
        return Ok(());
    }

    let mut docs: Vec<ScanDoc> = Vec::with_capacity(rows.len());
    let mut missing_vectors = 0usize;

    for row in &rows {
        let id: String = row.get("id");
        let blob: Option<Vec<u8>> = match row.try_get("embedding") {
            Ok(blob) => blob,
            Err(e) => {
                eprintln!("Warning: could not read document {}: {}", id, e);
                continue;
            }
        };
        let Some(blob) = blob else {
            missing_vectors += 1;
            continue;
        };

        docs.push(ScanDoc {
            id,
            title: row.get("title"),
            chapter: row.get("chapter"),
            word_count: row.get("word_count"),
            content: row.get("content"),
            vector: embedding::blob_to_vec(&blob),
        });
    }

    if missing_vectors > 0 {
        eprintln!(
            "Warning: {} documents have no stored embedding and were skipped (was embedding enabled during the load?)",
            missing_vectors
        );
    }

    let pairs = scan_pairs(
        &docs,
        config.similarity.neighbors_per_doc,
        config.similarity.top_pairs,
    );

    if pairs.is_empty() {
        println!("No cross-title chapter pairs found.");
    } else {
        println!("Top {} most similar chapter pairs:", pairs.len());
        for (i, pair) in pairs.iter().enumerate() {
            println!();
            println!("{}. similarity {:.2}%", i + 1, pair.similarity * 100.0);
            print_side(&pair.left);
            print_side(&pair.right);
        }
    }

    pool.close().await;
    Ok(())
}

/// The pure pairing core: nearest neighbors per probe, cross-title filter,
/// unordered dedup, descending sort, top-N truncation.
pub fn scan_pairs(docs: &[ScanDoc], neighbors_per_doc: usize, top_pairs: usize) -> Vec<SimilarPair> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut pairs: Vec<SimilarPair> = Vec::new();

    for (i, probe) in docs.iter().enumerate() {
        // -1 excludes the probe itself
        let n_results = neighbors_per_doc.min(docs.len().saturating_sub(1));
        if n_results == 0 {
            continue;
        }

        let mut neighbors: Vec<(usize, f64)> = docs
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, other)| (j, embedding::cosine_distance(&probe.vector, &other.vector)))
            .collect();
        neighbors.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        neighbors.truncate(n_results);

        for (j, distance) in neighbors {
            let other = &docs[j];
            if probe.title == other.title {
                continue;
            }

            if !seen.insert(pair_key(probe, other)) {
                continue;
            }

            pairs.push(SimilarPair {
                similarity: embedding::similarity_from_distance(distance),
                left: side_of(probe),
                right: side_of(other),
            });
        }
    }

    pairs.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    pairs.truncate(top_pairs);
    pairs
}

/// Order-independent identity for a pair, keyed on (title, chapter) so all
/// chunks of the same chapter collapse together.
fn pair_key(a: &ScanDoc, b: &ScanDoc) -> (String, String) {
    let ka = format!("{}_{}", a.title, a.chapter);
    let kb = format!("{}_{}", b.title, b.chapter);
    if ka <= kb {
        (ka, kb)
    } else {
        (kb, ka)
    }
}

fn side_of(doc: &ScanDoc) -> PairSide {
    PairSide {
        title: doc.title.clone(),
        chapter: doc.chapter.clone(),
        word_count: doc.word_count,
        content: doc.content.clone(),
    }
}

const EXCERPT_CHARS: usize = 2000;

fn print_side(side: &PairSide) {
    println!(
        "   Title {}, Chapter {} (word count {})",
        side.title, side.chapter, side.word_count
    );
    let excerpt: String = side.content.chars().take(EXCERPT_CHARS).collect();
    if side.content.chars().count() > EXCERPT_CHARS {
        println!("   {}...", excerpt);
    } else {
        println!("   {}", excerpt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, chapter: &str, vector: Vec<f32>) -> ScanDoc {
        ScanDoc {
            id: id.to_string(),
            title: title.to_string(),
            chapter: chapter.to_string(),
            word_count: 10,
            content: format!("content of {}", id),
            vector,
        }
    }

    #[test]
    fn same_title_pairs_excluded() {
        let docs = vec![
            doc("a", "5", "I", vec![1.0, 0.0]),
            doc("b", "5", "II", vec![1.0, 0.0]),
        ];
        let pairs = scan_pairs(&docs, 10, 5);
        assert!(pairs.is_empty());
    }

    #[test]
    fn cross_title_pair_reported_once() {
        // identical vectors, different titles: both probes find each other,
        // but the unordered key collapses them into one pair
        let docs = vec![
            doc("a", "1", "I", vec![1.0, 0.0]),
            doc("b", "2", "I", vec![1.0, 0.0]),
        ];
        let pairs = scan_pairs(&docs, 10, 5);
        assert_eq!(pairs.len(), 1);
        assert!((pairs[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn chunks_of_same_chapter_collapse() {
        let docs = vec![
            doc("t1_c1_chunk_1", "1", "I", vec![1.0, 0.0]),
            doc("t1_c1_chunk_2", "1", "I", vec![0.99, 0.01]),
            doc("t2_c2", "2", "II", vec![1.0, 0.0]),
        ];
        let pairs = scan_pairs(&docs, 10, 5);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn pairs_sorted_descending_and_truncated() {
        // vectors at increasing angles from [1,0]: similarity to "a" decays
        let docs = vec![
            doc("a", "1", "I", vec![1.0, 0.0]),
            doc("b", "2", "I", vec![1.0, 0.05]),
            doc("c", "3", "I", vec![1.0, 0.5]),
            doc("d", "4", "I", vec![0.0, 1.0]),
        ];
        let pairs = scan_pairs(&docs, 10, 3);
        assert_eq!(pairs.len(), 3);
        for window in pairs.windows(2) {
            assert!(window[0].similarity >= window[1].similarity);
        }
    }

    #[test]
    fn no_duplicate_unordered_pairs() {
        let docs = vec![
            doc("a", "1", "I", vec![1.0, 0.0]),
            doc("b", "2", "I", vec![1.0, 0.1]),
            doc("c", "3", "I", vec![1.0, 0.2]),
        ];
        let pairs = scan_pairs(&docs, 10, 10);
        let mut keys: Vec<(String, String)> = Vec::new();
        for pair in &pairs {
            let ka = format!("{}_{}", pair.left.title, pair.left.chapter);
            let kb = format!("{}_{}", pair.right.title, pair.right.chapter);
            let key = if ka <= kb { (ka, kb) } else { (kb, ka) };
            assert!(!keys.contains(&key), "duplicate pair {:?}", key);
            keys.push(key);
        }
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn single_document_produces_no_pairs() {
        let docs = vec![doc("a", "1", "I", vec![1.0, 0.0])];
        assert!(scan_pairs(&docs, 10, 5).is_empty());
    }

    #[test]
    fn neighbor_budget_limits_candidates() {
        // probe "a" may only look at its single nearest neighbor; the far
        // document still surfaces through its own probe of "b"
        let docs = vec![
            doc("a", "1", "I", vec![1.0, 0.0]),
            doc("b", "2", "I", vec![1.0, 0.01]),
            doc("c", "3", "I", vec![0.5, 1.0]),
        ];
        let pairs = scan_pairs(&docs, 1, 10);
        // a-b (from a's probe), b-a already seen, c's nearest is b -> c-b
        assert_eq!(pairs.len(), 2);
    }
}
