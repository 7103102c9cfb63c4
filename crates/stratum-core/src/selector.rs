//! Path selectors
//!
//! The resolver only needs a boolean predicate over normalized,
//! slash-separated relative paths. [`GlobSelector`] is the default dialect:
//! `glob` patterns where `*` stays inside one path segment and `**` spans
//! directories, plus three conveniences common in lint configs:
//!
//! - brace alternation: `**/*.{ts,tsx}` (nested groups allowed)
//! - directory selectors: `**/dist/` selects everything below `dist`
//! - a leading `./` or `/` anchors at the root and is dropped

use glob::{MatchOptions, Pattern};
use std::fmt;
use thiserror::Error;

/// Longest selector accepted, in bytes
pub const MAX_PATTERN_LEN: usize = 1024;

/// Upper bound on alternatives produced by brace expansion
pub const MAX_BRACE_EXPANSIONS: usize = 256;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Capability the resolver matches paths through
pub trait Selector: Send + Sync + fmt::Debug {
    /// Whether `path` is selected
    fn matches(&self, path: &str) -> bool;

    /// Source text, for diagnostics
    fn pattern(&self) -> &str;
}

/// Selector compilation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector '{pattern}': {message}")]
pub struct SelectorError {
    pub pattern: String,
    pub message: String,
}

impl SelectorError {
    fn new(pattern: &str, message: impl Into<String>) -> Self {
        Self {
            pattern: pattern.to_string(),
            message: message.into(),
        }
    }
}

/// Glob-backed selector
#[derive(Debug, Clone)]
pub struct GlobSelector {
    source: String,
    alternatives: Vec<Pattern>,
}

impl GlobSelector {
    /// Compile a selector pattern
    pub fn new(pattern: &str) -> Result<Self, SelectorError> {
        if pattern.trim().is_empty() {
            return Err(SelectorError::new(pattern, "empty selector"));
        }
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(SelectorError::new(
                pattern,
                format!("selector longer than {MAX_PATTERN_LEN} bytes"),
            ));
        }

        let anchored = pattern
            .strip_prefix("./")
            .or_else(|| pattern.strip_prefix('/'))
            .unwrap_or(pattern);

        let mut expanded = Vec::new();
        expand_braces(anchored, &mut expanded).map_err(|message| SelectorError::new(pattern, message))?;

        let alternatives = expanded
            .iter()
            .map(|alternative| {
                let glob = if alternative.ends_with('/') {
                    format!("{alternative}**")
                } else {
                    alternative.clone()
                };
                Pattern::new(&glob).map_err(|e| SelectorError::new(pattern, e.msg))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: pattern.to_string(),
            alternatives,
        })
    }

    /// Number of compiled alternatives after brace expansion
    pub fn alternatives(&self) -> usize {
        self.alternatives.len()
    }
}

impl Selector for GlobSelector {
    fn matches(&self, path: &str) -> bool {
        self.alternatives
            .iter()
            .any(|alternative| alternative.matches_with(path, MATCH_OPTIONS))
    }

    fn pattern(&self) -> &str {
        &self.source
    }
}

/// Expand `{a,b}` groups into separate patterns.
///
/// Groups without a top-level comma are kept literally, as is any text
/// inside `[...]` character classes.
fn expand_braces(pattern: &str, out: &mut Vec<String>) -> Result<(), String> {
    let Some((open, close, branches)) = find_brace_group(pattern)? else {
        out.push(pattern.to_string());
        return Ok(());
    };

    let (prefix, suffix) = (&pattern[..open], &pattern[close + 1..]);
    for branch in branches {
        expand_braces(&format!("{prefix}{branch}{suffix}"), out)?;
        if out.len() > MAX_BRACE_EXPANSIONS {
            return Err(format!(
                "brace expansion produces more than {MAX_BRACE_EXPANSIONS} alternatives"
            ));
        }
    }
    Ok(())
}

/// Locate the first brace group that contains a top-level comma.
/// Returns the byte offsets of `{` and `}` and the split branches.
fn find_brace_group(pattern: &str) -> Result<Option<(usize, usize, Vec<&str>)>, String> {
    let bytes = pattern.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'[' => i = skip_class(bytes, i),
            b'{' => {
                let open = i;
                let mut depth = 0usize;
                let mut commas = Vec::new();
                let mut j = open;
                let close = loop {
                    if j >= bytes.len() {
                        return Err("unbalanced '{' in selector".to_string());
                    }
                    match bytes[j] {
                        b'[' => {
                            j = skip_class(bytes, j);
                            continue;
                        }
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                break j;
                            }
                        }
                        b',' if depth == 1 => commas.push(j),
                        _ => {}
                    }
                    j += 1;
                };

                if commas.is_empty() {
                    i = close + 1;
                    continue;
                }

                let mut branches = Vec::with_capacity(commas.len() + 1);
                let mut start = open + 1;
                for comma in commas {
                    branches.push(&pattern[start..comma]);
                    start = comma + 1;
                }
                branches.push(&pattern[start..close]);
                return Ok(Some((open, close, branches)));
            }
            _ => i += 1,
        }
    }

    Ok(None)
}

/// Skip past a `[...]` class starting at `start`; an unterminated `[` is
/// left for the glob compiler to report.
fn skip_class(bytes: &[u8], start: usize) -> usize {
    // `[]]` and `[!]]` treat the first `]` as a literal member
    let mut j = start + 1;
    if j < bytes.len() && bytes[j] == b'!' {
        j += 1;
    }
    if j < bytes.len() && bytes[j] == b']' {
        j += 1;
    }
    while j < bytes.len() {
        if bytes[j] == b']' {
            return j + 1;
        }
        j += 1;
    }
    start + 1
}
