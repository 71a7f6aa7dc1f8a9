//! Wildcard route matching for client-side access control.
//!
//! `*` matches within one path segment and `?` is a single non-separator
//! character. A `**` that forms a whole segment matches zero or more segments;
//! anywhere else it behaves like `*`. Patterns match the whole route.

use crate::utils::error::{Result, SessionError};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    regex: Regex,
}

impl UrlPattern {
    pub fn compile(pattern: &str) -> Result<Self> {
        let segments: Vec<&str> = pattern.split('/').collect();
        let last = segments.len() - 1;

        let mut expr = String::with_capacity(pattern.len() + 16);
        expr.push('^');
        let mut after_globstar = false;
        for (i, segment) in segments.iter().enumerate() {
            let globstar = *segment == "**";
            if globstar && i == last {
                // a trailing globstar also matches its parent
                expr.push_str(if i == 0 || after_globstar { ".*" } else { "(?:/.*)?" });
                break;
            }
            if i > 0 && !after_globstar {
                expr.push('/');
            }
            if globstar {
                expr.push_str("(?:[^/]*/)*");
            } else {
                push_segment(&mut expr, segment);
            }
            after_globstar = globstar;
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|source| SessionError::PatternError {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Translates one path segment; any run of `*` inside a segment stays within it.
fn push_segment(expr: &mut String, segment: &str) {
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                expr.push_str("[^/]*");
            }
            '?' => expr.push_str("[^/]"),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
}

pub fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<UrlPattern>> {
    patterns
        .iter()
        .map(|p| UrlPattern::compile(p.as_ref()))
        .collect()
}

pub fn has_access(patterns: &[UrlPattern], url: &str) -> bool {
    patterns.iter().any(|p| p.matches(url))
}
