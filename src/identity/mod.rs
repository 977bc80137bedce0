//! Hierarchical identity model (Study -> Series -> Instance) and the query
//! shape used by QIDO-RS searches, plus the wildcard/fuzzy/range matching
//! rules shared by every storage backend.

use std::collections::{HashMap, HashSet};

/// A DICOM UID used as a Study/Series/Instance key. Equality is byte-exact;
/// the type only exists to keep the three levels from being mixed up at
/// call sites, not to validate DICOM UID syntax.
pub type StudyKey = String;
pub type SeriesKey = String;
pub type InstanceKey = String;

/// Loose sanity check for diagnostics only. Never used to reject a request:
/// the router and storage layer treat UIDs as opaque strings per spec.
pub fn is_plausible_uid(s: &str) -> bool {
    !s.is_empty() && s.len() <= 64 && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Query parameters recognised by QIDO-RS search operations (spec §3/§4.1).
#[derive(Debug, Clone, Default)]
pub struct StorageQuery {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub study_date: Option<DateRange>,
    pub study_time: Option<DateRange>,
    pub accession_number: Option<String>,
    pub modality: Option<String>,
    pub modalities_in_study: Option<HashSet<String>>,
    pub study_instance_uid: Option<String>,
    pub series_instance_uid: Option<String>,
    pub sop_instance_uid: Option<String>,
    pub study_description: Option<String>,
    pub series_description: Option<String>,
    pub series_number: Option<String>,
    pub instance_number: Option<String>,
    pub referring_physician_name: Option<String>,
    pub offset: usize,
    pub limit: usize,
    pub fuzzy_matching: bool,
    pub custom: HashMap<String, String>,
}

impl StorageQuery {
    pub fn new() -> Self {
        Self {
            offset: 0,
            limit: 100,
            ..Default::default()
        }
    }
}

/// An inclusive `[start, end]` range over `YYYYMMDD`/`HHMMSS`-style strings,
/// or a single value when start == end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn single(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            start: value.clone(),
            end: value,
        }
    }

    /// Parses the DICOM range syntax `VALUE`, `START-`, `-END`, `START-END`.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('-') {
            Some((start, end)) => Self {
                start: start.to_string(),
                end: if end.is_empty() {
                    "99999999".to_string()
                } else {
                    end.to_string()
                },
            },
            None => Self::single(raw),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        value >= self.start.as_str() && value <= self.end.as_str()
    }
}

/// Case-insensitive `*`/`?` wildcard matching, anchored to the full string.
/// `\*` and `\?` match the literal characters. Falls back to a
/// case-insensitive substring test when `fuzzy` is set (wildcards in
/// `pattern` are stripped first).
pub fn wildcard_match(pattern: &str, value: &str, fuzzy: bool) -> bool {
    if fuzzy {
        let stripped: String = strip_wildcards(pattern);
        return value
            .to_lowercase()
            .contains(&stripped.to_lowercase());
    }
    let value = value.to_lowercase();
    let pattern = pattern.to_lowercase();
    regex_match(&compile_wildcard(&pattern), &value)
}

fn strip_wildcards(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '*' || next == '?' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
            out.push(c);
        } else if c != '*' && c != '?' {
            out.push(c);
        }
    }
    out
}

/// A tiny glob token stream, compiled once per call. `*` matches any run
/// (including empty), `?` matches exactly one character, everything else is
/// literal. `\*`/`\?` escape the wildcard characters.
#[derive(Debug, Clone)]
enum Token {
    Literal(char),
    Any,
    AnyRun,
}

fn compile_wildcard(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(&next) = chars.peek() {
                    if next == '*' || next == '?' {
                        tokens.push(Token::Literal(next));
                        chars.next();
                        continue;
                    }
                }
                tokens.push(Token::Literal(c));
            }
            '*' => tokens.push(Token::AnyRun),
            '?' => tokens.push(Token::Any),
            other => tokens.push(Token::Literal(other)),
        }
    }
    tokens
}

fn regex_match(tokens: &[Token], value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    matches_from(tokens, &chars, 0, 0)
}

fn matches_from(tokens: &[Token], value: &[char], ti: usize, vi: usize) -> bool {
    if ti == tokens.len() {
        return vi == value.len();
    }
    match &tokens[ti] {
        Token::Literal(c) => {
            vi < value.len() && value[vi] == *c && matches_from(tokens, value, ti + 1, vi + 1)
        }
        Token::Any => vi < value.len() && matches_from(tokens, value, ti + 1, vi + 1),
        Token::AnyRun => {
            for skip in 0..=(value.len() - vi) {
                if matches_from(tokens, value, ti + 1, vi + skip) {
                    return true;
                }
            }
            false
        }
    }
}

/// Passes when the stored set and the query set share at least one element.
pub fn set_intersects(query: &HashSet<String>, stored: &HashSet<String>) -> bool {
    query.iter().any(|q| stored.contains(q))
}
