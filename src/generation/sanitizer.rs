//! Cleaning and repair of raw model output into a JSON object
//!
//! Each stage handles one independent failure mode and is a no-op when that
//! mode is absent:
//! 1. surrounding whitespace
//! 2. markdown code fences (bare or language-tagged)
//! 3. prose before/after the object (slice to the first balanced `{...}`)
//! 4. strict parse
//! 5. repair pass: `//` line comments, trailing commas, blank lines
//!
//! If the repaired text still fails, the error of the first strict parse is
//! reported together with the cleaned candidate.

use crate::error::MalformedResponse;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// A parsed persona: a loosely-typed JSON object whose schema belongs to the prompt
pub type PersonaRecord = Map<String, Value>;

const FENCE: &str = "```";

/// Turn raw model text into a JSON object, repairing common defects
pub fn sanitize(raw: &str) -> Result<PersonaRecord, MalformedResponse> {
    let unfenced = strip_code_fence(raw.trim());
    let candidate = extract_object(unfenced);

    let strict_error = match parse_object(candidate) {
        Ok(record) => return Ok(record),
        Err(e) => e,
    };

    let repaired = repair(candidate);
    match parse_object(&repaired) {
        Ok(record) => {
            log::warn!("Auto-fixed JSON formatting issues in model response");
            Ok(record)
        }
        Err(_) => Err(MalformedResponse {
            line: strict_error.line(),
            column: strict_error.column(),
            message: strict_error.to_string(),
            candidate: candidate.to_string(),
        }),
    }
}

fn parse_object(text: &str) -> Result<PersonaRecord, serde_json::Error> {
    serde_json::from_str::<PersonaRecord>(text)
}

/// Remove a leading ```` ``` ```` or ```` ```lang ```` opener and a trailing ```` ``` ````
fn strip_code_fence(text: &str) -> &str {
    let mut text = text;
    if let Some(rest) = text.strip_prefix(FENCE) {
        // Drop a language tag such as `json` directly after the opener
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        text = &rest[tag_len..];
    }
    if let Some(rest) = text.trim_end().strip_suffix(FENCE) {
        text = rest;
    }
    text.trim()
}

/// Slice from the first `{` to the `}` that closes it.
///
/// Braces inside string literals are not counted. Without a closing brace
/// (truncated output) the slice runs to the end of the text; without any
/// `{` the text is returned unchanged.
fn extract_object(text: &str) -> &str {
    let start = match text.find('{') {
        Some(start) => start,
        None => return text,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return &text[start..start + offset + 1];
                }
            }
            _ => {}
        }
    }

    &text[start..]
}

/// Second-chance fixes for text that failed strict parsing
fn repair(candidate: &str) -> String {
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();

    let trailing_comma = TRAILING_COMMA.get_or_init(|| Regex::new(r",(\s*[}\]])").unwrap());
    let blank_lines = BLANK_LINES.get_or_init(|| Regex::new(r"\n\s*\n").unwrap());

    let without_comments = strip_line_comments(candidate);
    let without_commas = trailing_comma.replace_all(&without_comments, "$1");
    blank_lines.replace_all(&without_commas, "\n").into_owned()
}

/// Remove `//` comments running to end of line.
///
/// `//` inside a string literal (e.g. a URL) is kept; only comments
/// outside strings are dropped.
fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                // Strings never span lines in valid JSON; resync after a broken one
                '\n' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }

    out
}
