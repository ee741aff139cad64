//! Corpus indexer: writes chunked chapter text into the vector store.
//!
//! Each load cycle starts with [`ChapterIndex::clear`] (full replace, not
//! incremental), then [`ChapterIndex::index_title`] stores every accepted
//! chapter: chunk, derive deterministic document ids, insert document rows,
//! and embed inline. Embedding is best-effort — document rows survive an
//! embedding failure, and a failure on one chapter never aborts its
//! siblings.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, EmbeddingConfig, IndexingConfig};
use crate::embedding;
use crate::models::{ChapterText, TitleExtraction};

pub struct ChapterIndex<'a> {
    pool: &'a SqlitePool,
    embedding: &'a EmbeddingConfig,
    chunking: &'a ChunkingConfig,
}

/// Counters reported back to the loader for its summary output.
#[derive(Debug, Default)]
pub struct IndexOutcome {
    pub chapters_indexed: usize,
    pub chapters_skipped: usize,
    pub chunks_stored: usize,
    pub chunks_embedded: usize,
}

impl IndexOutcome {
    pub fn absorb(&mut self, other: IndexOutcome) {
        self.chapters_indexed += other.chapters_indexed;
        self.chapters_skipped += other.chapters_skipped;
        self.chunks_stored += other.chunks_stored;
        self.chunks_embedded += other.chunks_embedded;
    }
}

impl<'a> ChapterIndex<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        embedding: &'a EmbeddingConfig,
        chunking: &'a ChunkingConfig,
    ) -> Self {
        Self {
            pool,
            embedding,
            chunking,
        }
    }

    /// Delete every stored document and vector. Returns the number of
    /// documents removed.
    pub async fn clear(&self) -> Result<u64> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapter_documents")
            .fetch_one(self.pool)
            .await?;

        sqlx::query("DELETE FROM chapter_vectors")
            .execute(self.pool)
            .await?;
        sqlx::query("DELETE FROM chapter_documents")
            .execute(self.pool)
            .await?;

        Ok(existing as u64)
    }

    /// Store every chapter of `extraction` that clears the minimum-length
    /// threshold. Short chapters are logged and skipped; a storage failure
    /// on one chapter is logged and the rest continue.
    pub async fn index_title(
        &self,
        title_number: i64,
        extraction: &TitleExtraction,
        rules: &IndexingConfig,
    ) -> IndexOutcome {
        let mut outcome = IndexOutcome::default();

        for chapter in &extraction.chapters {
            let char_len = chapter.text.chars().count();
            if char_len <= rules.min_chapter_chars {
                println!(
                    "Skipping chapter {} of title {} - too short ({} chars)",
                    chapter.id, title_number, char_len
                );
                outcome.chapters_skipped += 1;
                continue;
            }

            match self.store_chapter(title_number, chapter).await {
                Ok((stored, embedded)) => {
                    outcome.chapters_indexed += 1;
                    outcome.chunks_stored += stored;
                    outcome.chunks_embedded += embedded;
                }
                Err(e) => {
                    eprintln!(
                        "Warning: failed to index chapter {} of title {}: {}",
                        chapter.id, title_number, e
                    );
                }
            }
        }

        outcome
    }

    /// Insert one chapter's chunk documents, then embed them inline.
    /// Returns (chunks stored, chunks embedded).
    async fn store_chapter(&self, title_number: i64, chapter: &ChapterText) -> Result<(usize, usize)> {
        let chunks = chunk_text(&chapter.text, self.chunking.max_chunk_size);
        let total_chunks = chunks.len();

        for (i, chunk) in chunks.iter().enumerate() {
            let id = doc_id(title_number, &chapter.id, i, total_chunks);
            let hash = format!("{:x}", Sha256::digest(chunk.as_bytes()));

            // chunk metadata is attached only when the text was split
            let (chunk_no, total) = if total_chunks > 1 {
                (Some((i + 1) as i64), Some(total_chunks as i64))
            } else {
                (None, None)
            };

            // OR REPLACE: reloads reuse the same deterministic ids
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO chapter_documents
                    (id, title, chapter, word_count, doc_type, chunk, total_chunks, content, content_hash)
                VALUES (?, ?, ?, ?, 'chapter_text', ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(title_number.to_string())
            .bind(&chapter.id)
            .bind(chapter.word_count as i64)
            .bind(chunk_no)
            .bind(total)
            .bind(chunk)
            .bind(&hash)
            .execute(self.pool)
            .await?;
        }

        let embedded = if self.embedding.is_enabled() {
            self.embed_chunks(title_number, chapter, &chunks).await
        } else {
            0
        };

        Ok((total_chunks, embedded))
    }

    /// Inline embedding, non-fatal: a failed batch is logged and the
    /// document rows stand without vectors.
    async fn embed_chunks(
        &self,
        title_number: i64,
        chapter: &ChapterText,
        chunks: &[String],
    ) -> usize {
        let provider = match embedding::create_provider(self.embedding) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Warning: embedding provider unavailable: {}", e);
                return 0;
            }
        };

        let total_chunks = chunks.len();
        let mut embedded = 0usize;

        for (batch_start, batch) in chunks
            .chunks(self.embedding.batch_size)
            .enumerate()
            .map(|(b, batch)| (b * self.embedding.batch_size, batch))
        {
            match embedding::embed_texts(self.embedding, batch).await {
                Ok(vectors) => {
                    for (offset, vector) in vectors.iter().enumerate() {
                        let id = doc_id(
                            title_number,
                            &chapter.id,
                            batch_start + offset,
                            total_chunks,
                        );
                        let blob = embedding::vec_to_blob(vector);
                        let insert = sqlx::query(
                            r#"
                            INSERT OR REPLACE INTO chapter_vectors (doc_id, model, dims, embedding)
                            VALUES (?, ?, ?, ?)
                            "#,
                        )
                        .bind(&id)
                        .bind(provider.model_name())
                        .bind(provider.dims() as i64)
                        .bind(&blob)
                        .execute(self.pool)
                        .await;

                        match insert {
                            Ok(_) => embedded += 1,
                            Err(e) => eprintln!("Warning: failed to store vector {}: {}", id, e),
                        }
                    }
                }
                Err(e) => {
                    eprintln!(
                        "Warning: embedding failed for chapter {} of title {}: {}",
                        chapter.id, title_number, e
                    );
                }
            }
        }

        embedded
    }
}

/// Deterministic document id: `title_{T}_chapter_{C}`, with a 1-based
/// `_chunk_{i}` suffix only when the chapter text was split.
fn doc_id(title_number: i64, chapter: &str, chunk_index: usize, total_chunks: usize) -> String {
    let mut id = format!("title_{}_chapter_{}", title_number, chapter);
    if total_chunks > 1 {
        id.push_str(&format!("_chunk_{}", chunk_index + 1));
    }
    id
}
