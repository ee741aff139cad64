//! Core data models for the eCFR pipeline.
//!
//! The `*Record` types mirror the JSON payloads served by the eCFR
//! versioner/admin APIs; everything else flows between the extractor,
//! indexer, and loader.

use chrono::NaiveDate;
use serde::Deserialize;

/// Envelope of `GET /titles.json`.
#[derive(Debug, Deserialize)]
pub struct TitlesResponse {
    pub titles: Vec<TitleRecord>,
}

/// One title as returned by the versioner API.
#[derive(Debug, Clone, Deserialize)]
pub struct TitleRecord {
    pub number: i64,
    pub name: String,
    pub latest_amended_on: Option<NaiveDate>,
    pub latest_issue_date: Option<NaiveDate>,
    pub up_to_date_as_of: Option<NaiveDate>,
    #[serde(default)]
    pub reserved: bool,
}

/// Envelope of `GET /agencies.json`.
#[derive(Debug, Deserialize)]
pub struct AgenciesResponse {
    pub agencies: Vec<AgencyRecord>,
}

/// One agency as returned by the admin API, with its nested CFR references.
#[derive(Debug, Clone, Deserialize)]
pub struct AgencyRecord {
    pub name: String,
    pub short_name: Option<String>,
    pub display_name: Option<String>,
    pub sortable_name: Option<String>,
    pub slug: Option<String>,
    #[serde(default)]
    pub cfr_references: Vec<CfrReference>,
}

/// A (title, chapter) pair owned by an agency.
#[derive(Debug, Clone, Deserialize)]
pub struct CfrReference {
    pub title: Option<i64>,
    pub chapter: Option<String>,
}

/// Envelope of `GET /versions/title-{n}.json`.
#[derive(Debug, Deserialize)]
pub struct VersionsResponse {
    #[serde(default)]
    pub content_versions: Vec<ContentVersionRecord>,
}

/// One historical change event for a part of a title.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentVersionRecord {
    pub part: Option<String>,
    pub identifier: Option<String>,
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
    pub amendment_date: Option<NaiveDate>,
    pub issue_date: Option<NaiveDate>,
    pub substantive: Option<bool>,
    pub removed: Option<bool>,
    pub subpart: Option<String>,
    #[serde(rename = "type")]
    pub version_type: Option<String>,
}

/// One chapter's extracted text and word count.
#[derive(Debug, Clone)]
pub struct ChapterText {
    /// Chapter identifier from the `N` attribute (e.g. `I`, `V`).
    pub id: String,
    /// Whitespace-normalized chapter text.
    pub text: String,
    pub word_count: u64,
}

/// Result of extracting one title's XML: per-chapter counts plus the
/// whole-document total. The total is computed over every text node in the
/// tree, independent of the chapter sum.
#[derive(Debug, Clone, Default)]
pub struct TitleExtraction {
    pub chapters: Vec<ChapterText>,
    pub total_words: u64,
}
