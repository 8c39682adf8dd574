//! Pulls one JSON document out of free-form model output.
//!
//! Models wrap JSON in markdown fences, prepend chatter, append sign-offs and
//! sometimes stop mid-document. [`normalize`] tolerates all of that and,
//! when it cannot recover a document, returns [`ExtractionFailed`] carrying
//! the untouched model text.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("model did not return valid JSON: {reason}")]
pub struct ExtractionFailed {
    /// Model output exactly as received.
    pub raw_text: String,
    /// Substring handed to the JSON parser, when one was found.
    pub attempted: Option<String>,
    pub reason: String,
}

pub type ExtractedJson = Result<Value, ExtractionFailed>;

fn fence_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json|JSON)?").expect("valid fence regex"))
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?sm)```(?:json|JSON)?[ \t]*\r?\n(.*?)^[ \t]*```").expect("valid block regex")
    })
}

pub fn normalize(raw: &str) -> ExtractedJson {
    if let Some(value) = first_fenced_document(raw) {
        return Ok(value);
    }

    let cleaned = strip_fences(raw);
    let candidate = match find_balanced(&cleaned) {
        Scan::Found(slice) => slice,
        Scan::Unterminated => {
            return Err(ExtractionFailed {
                raw_text: raw.to_string(),
                attempted: None,
                reason: "JSON document is truncated: brackets never balance".into(),
            })
        }
        Scan::NoOpening => cleaned.as_str(),
    };

    if candidate.is_empty() {
        return Err(ExtractionFailed {
            raw_text: raw.to_string(),
            attempted: None,
            reason: "model output is empty".into(),
        });
    }

    serde_json::from_str(candidate).map_err(|err| ExtractionFailed {
        raw_text: raw.to_string(),
        attempted: Some(candidate.to_string()),
        reason: err.to_string(),
    })
}

/// Removes every fence marker, with or without the `json` tag.
pub fn strip_fences(raw: &str) -> String {
    fence_marker().replace_all(raw, "").trim().to_string()
}

/// Only a block whose opening marker ends its line and whose closing marker
/// starts one counts; inline spans are left to the bracket scan.
fn first_fenced_document(raw: &str) -> Option<Value> {
    let body = fenced_block().captures(raw)?.get(1)?.as_str().trim();
    if body.is_empty() {
        return None;
    }
    serde_json::from_str(body).ok()
}

#[derive(Debug, PartialEq, Eq)]
enum Scan<'a> {
    Found(&'a str),
    Unterminated,
    NoOpening,
}

/// Locates the first `{` or `[` and returns the span up to its matching
/// closer. Only the opener's own bracket pair is counted; anything inside a
/// double-quoted string (escapes honoured) is ignored.
fn find_balanced(text: &str) -> Scan<'_> {
    let bytes = text.as_bytes();
    let Some(start) = bytes.iter().position(|b| matches!(b, b'{' | b'[')) else {
        return Scan::NoOpening;
    };
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        if byte == b'"' {
            in_string = true;
        } else if byte == open {
            depth += 1;
        } else if byte == close {
            depth -= 1;
            if depth == 0 {
                // Delimiters are ASCII, so both ends sit on char boundaries.
                return Scan::Found(&text[start..start + offset + 1]);
            }
        }
    }
    Scan::Unterminated
}
