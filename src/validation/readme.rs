//! Readme capture and description auto-derivation
//!
//! The readme is stored verbatim as bytes; absence is valid. When no
//! manifest description is supplied and auto-generation is enabled, a
//! description is derived from the first readme paragraph that reads like
//! prose: long enough to mean something, short enough to display, and free
//! of URLs and email addresses.

use crate::core::error::ExtractError;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::path::Path;

/// Recognized readme filenames, in precedence order
pub const README_FILENAMES: &[&str] = &["README.md", "readme.md", "README"];

/// Paragraphs longer than this are skipped outright
const MAX_PARAGRAPH_CHARS: usize = 512;

/// Paragraphs with fewer words than this are skipped
const MIN_WORD_COUNT: usize = 6;

/// Paragraphs shorter than this are skipped
const MIN_CHAR_COUNT: usize = 20;

/// Sentence accumulation stops before exceeding this length
const MAX_DESCRIPTION_CHARS: usize = 300;

lazy_static! {
    static ref URL_TOKEN: Regex = Regex::new(r"(?i)(https?://|www\.)").unwrap();
    static ref EMAIL_TOKEN: Regex =
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap();
}

/// Read the readme of a context directory verbatim, if one exists
pub fn read_readme(dir: &Path) -> Result<Option<Vec<u8>>, ExtractError> {
    for filename in README_FILENAMES {
        let path = dir.join(filename);
        if path.is_file() {
            debug!("readme found: {}", path.display());
            let content = std::fs::read(&path).map_err(|e| ExtractError::Filesystem {
                message: format!("{}: {}", path.display(), e),
            })?;
            return Ok(Some(content));
        }
    }
    Ok(None)
}

/// Derive a display description from readme prose
///
/// Each non-empty line is a candidate paragraph. The first paragraph that
/// passes the filters contributes consecutive sentences until the combined
/// length would exceed the cap; the accumulated text is returned trimmed.
pub fn derive_description(readme: &str) -> Option<String> {
    for paragraph in readme.lines().map(str::trim) {
        if paragraph.is_empty() || paragraph.starts_with('#') {
            continue;
        }
        let char_count = paragraph.chars().count();
        if char_count > MAX_PARAGRAPH_CHARS || char_count < MIN_CHAR_COUNT {
            continue;
        }
        if paragraph.split_whitespace().count() < MIN_WORD_COUNT {
            continue;
        }
        if URL_TOKEN.is_match(paragraph) || EMAIL_TOKEN.is_match(paragraph) {
            continue;
        }

        let description = accumulate_sentences(paragraph);
        if !description.is_empty() {
            return Some(description);
        }
    }
    None
}

fn accumulate_sentences(paragraph: &str) -> String {
    let mut description = String::new();
    for sentence in paragraph.split(". ") {
        let candidate = if description.is_empty() {
            sentence.to_string()
        } else {
            format!("{}. {}", description, sentence)
        };
        if candidate.chars().count() > MAX_DESCRIPTION_CHARS {
            break;
        }
        description = candidate;
    }
    description.trim().to_string()
}
