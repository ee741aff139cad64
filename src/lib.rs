//! # eCFR Analyzer
//!
//! An ingestion and analysis pipeline for the Electronic Code of Federal
//! Regulations. The `ecfr` CLI pulls titles, agencies, word counts, and
//! version histories from the public eCFR API into SQLite, indexes chapter
//! text into an embedded vector store, and reports word-count, revision,
//! and cross-title redundancy views.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────────┐
//! │  eCFR API    │──▶│    Loader     │──▶│ SQLite (tables)  │
//! │ titles/      │   │ XML extract   │   ├─────────────────┤
//! │ agencies/... │   │ chunk + embed │──▶│ SQLite (vectors) │
//! └──────────────┘   └───────────────┘   └────────┬────────┘
//!                                                 │
//!                               ┌─────────────────┤
//!                               ▼                 ▼
//!                        ┌────────────┐    ┌────────────┐
//!                        │  reports   │    │  similar   │
//!                        │ (counts,   │    │ (near-dup  │
//!                        │  versions) │    │  scanner)  │
//!                        └────────────┘    └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ecfr init                        # create both databases
//! ecfr load                        # full refresh from the API
//! ecfr stats                       # what got loaded
//! ecfr report word-counts          # totals by title/chapter
//! ecfr similar                     # cross-title near-duplicates
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | API payload and pipeline types |
//! | [`api`] | eCFR HTTP client with timeout/retry |
//! | [`wordcount`] | XML structural extractor |
//! | [`chunk`] | Word-boundary text chunking |
//! | [`embedding`] | Embedding providers and vector utilities |
//! | [`index`] | Vector-store corpus indexer |
//! | [`load`] | Transactional relational refresh |
//! | [`similar`] | Cross-title similarity scanner |
//! | [`report`] | Word-count and version reports |
//! | [`stats`] | Database overview |
//! | [`db`] | Database connections |
//! | [`migrate`] | Schema migrations |

pub mod api;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod index;
pub mod load;
pub mod migrate;
pub mod models;
pub mod report;
pub mod similar;
pub mod stats;
pub mod wordcount;
