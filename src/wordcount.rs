//! XML structural extractor for full-title regulatory documents.
//!
//! A single streaming pass over the title XML collects, for every element
//! tagged `TYPE="CHAPTER"` (any element name, any nesting depth), the
//! whitespace-joined text of all its descendants, and counts
//! whitespace-delimited tokens. The whole-document total is counted over
//! every text node independently, so it need not equal the sum of the
//! chapter counts when chapters don't cover the full document.

use anyhow::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::models::{ChapterText, TitleExtraction};

/// Extract chapter texts and word counts from a title's XML.
///
/// Parse failures are reported to stderr and yield `None`; they never
/// propagate to the caller. A well-formed document with zero chapters
/// yields an extraction with an empty chapter list and only the total.
pub fn extract_title(xml: &str) -> Option<TitleExtraction> {
    match parse_title(xml) {
        Ok(extraction) => Some(extraction),
        Err(e) => {
            eprintln!("Error parsing title XML: {}", e);
            None
        }
    }
}

struct OpenChapter {
    id: String,
    depth: usize,
    text: String,
}

fn parse_title(xml: &str) -> Result<TitleExtraction> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth: usize = 0;
    let mut open: Vec<OpenChapter> = Vec::new();
    let mut chapters: Vec<ChapterText> = Vec::new();
    let mut total_words: u64 = 0;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if let Some(id) = chapter_id(&e)? {
                    open.push(OpenChapter {
                        id,
                        depth,
                        text: String::new(),
                    });
                }
            }
            Event::Empty(e) => {
                if let Some(id) = chapter_id(&e)? {
                    chapters.push(ChapterText {
                        id,
                        text: String::new(),
                        word_count: 0,
                    });
                }
            }
            Event::End(_) => {
                if open.last().is_some_and(|c| c.depth == depth) {
                    let done = open.pop().expect("non-empty open-chapter stack");
                    chapters.push(finish_chapter(done));
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                append_text(&mut open, &mut total_words, &text);
            }
            Event::CData(t) => {
                let raw = t.into_inner();
                let text = String::from_utf8_lossy(&raw).into_owned();
                append_text(&mut open, &mut total_words, &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(TitleExtraction {
        chapters,
        total_words,
    })
}

/// Returns the chapter id when `e` carries `TYPE="CHAPTER"`; the id is the
/// `N` attribute (empty when absent).
fn chapter_id(e: &BytesStart) -> Result<Option<String>> {
    let is_chapter = e
        .try_get_attribute("TYPE")?
        .map(|a| a.value.as_ref() == b"CHAPTER")
        .unwrap_or(false);
    if !is_chapter {
        return Ok(None);
    }

    let id = match e.try_get_attribute("N")? {
        Some(a) => a.unescape_value()?.into_owned(),
        None => String::new(),
    };
    Ok(Some(id))
}

/// A text node counts toward the document total and toward every chapter
/// currently open (so nested chapters each see it).
fn append_text(open: &mut [OpenChapter], total_words: &mut u64, text: &str) {
    *total_words += text.split_whitespace().count() as u64;
    for chapter in open.iter_mut() {
        if !chapter.text.is_empty() {
            chapter.text.push(' ');
        }
        chapter.text.push_str(text);
    }
}

fn finish_chapter(chapter: OpenChapter) -> ChapterText {
    let cleaned = chapter
        .text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let word_count = cleaned.split_whitespace().count() as u64;
    ChapterText {
        id: chapter.id,
        text: cleaned,
        word_count,
    }
}
