//! Two-strategy keyword parser for the legacy `keywords_text` field.
//!
//! Historical rows hold either a flat delimiter-separated list
//! (`"Python, SQL; Docker"`) or a bracketed array (`["Python", "SQL"]`,
//! sometimes `['Python', 'SQL']`). [`detect_format`] picks a strategy; a
//! structured value that fails to parse is re-read as a flat list.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use keyweave_core::{Error, Result};

/// Delimiters separating tokens in the flat format.
pub const FLAT_DELIMITERS: &[char] = &[',', ';', '\n'];

/// Object keys recognised inside structured arrays, in lookup order.
const OBJECT_KEYWORD_KEYS: &[&str] = &["keyword", "text", "name"];

/// The format a value was actually parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Delimited,
    StructuredArray,
}

/// Caller's declared format, or auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatHint {
    #[default]
    Auto,
    Delimited,
    StructuredArray,
}

/// Ordered raw tokens plus how they were obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKeywords {
    pub tokens: Vec<String>,
    pub format: SourceFormat,
    /// True when structured parsing failed and the flat strategy was used.
    pub fell_back: bool,
}

impl ParsedKeywords {
    fn empty() -> Self {
        Self {
            tokens: Vec::new(),
            format: SourceFormat::Delimited,
            fell_back: false,
        }
    }
}

/// Detection rule: a value whose first non-blank character is `[` is structured.
pub fn detect_format(raw: &str) -> SourceFormat {
    if raw.trim_start().starts_with('[') {
        SourceFormat::StructuredArray
    } else {
        SourceFormat::Delimited
    }
}

/// Parses keyword text with explicit fallback order:
/// JSON array → lenient bracket list → flat delimited.
#[derive(Debug, Clone)]
pub struct KeywordParser {
    max_keyword_len: usize,
}

impl Default for KeywordParser {
    fn default() -> Self {
        Self::new(100)
    }
}

impl KeywordParser {
    pub fn new(max_keyword_len: usize) -> Self {
        Self { max_keyword_len }
    }

    pub fn max_keyword_len(&self) -> usize {
        self.max_keyword_len
    }

    /// Parse a raw value into ordered, trimmed, non-empty tokens.
    ///
    /// Null or blank input yields an empty sequence. The only error is
    /// [`Error::MalformedInput`], raised when a token is too long or carries
    /// control characters.
    pub fn parse(&self, raw: Option<&str>, hint: FormatHint) -> Result<ParsedKeywords> {
        let trimmed = match raw.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(ParsedKeywords::empty()),
        };

        let format = match hint {
            FormatHint::Auto => detect_format(trimmed),
            FormatHint::Delimited => SourceFormat::Delimited,
            FormatHint::StructuredArray => SourceFormat::StructuredArray,
        };

        let parsed = match format {
            SourceFormat::Delimited => ParsedKeywords {
                tokens: split_delimited(trimmed),
                format,
                fell_back: false,
            },
            SourceFormat::StructuredArray => {
                match parse_json_array(trimmed).or_else(|| parse_bracket_list(trimmed)) {
                    Some(tokens) => ParsedKeywords {
                        tokens,
                        format,
                        fell_back: false,
                    },
                    None => {
                        debug!("Structured keyword value did not parse, falling back to flat list");
                        ParsedKeywords {
                            tokens: split_delimited(trimmed),
                            format: SourceFormat::Delimited,
                            fell_back: true,
                        }
                    }
                }
            }
        };

        self.validate(&parsed.tokens)?;
        Ok(parsed)
    }

    fn validate(&self, tokens: &[String]) -> Result<()> {
        for token in tokens {
            let len = token.chars().count();
            if len > self.max_keyword_len {
                return Err(Error::MalformedInput(format!(
                    "keyword of {} chars exceeds limit of {}",
                    len, self.max_keyword_len
                )));
            }
            if token.chars().any(|c| c.is_control() && !c.is_whitespace()) {
                return Err(Error::MalformedInput(format!(
                    "keyword {:?} contains control characters",
                    token
                )));
            }
        }
        Ok(())
    }
}

/// Flat strategy: split on [`FLAT_DELIMITERS`], trim, drop empties.
pub fn split_delimited(raw: &str) -> Vec<String> {
    raw.split(FLAT_DELIMITERS)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_json_array(raw: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let Value::Array(items) = value else {
        return None;
    };
    let mut tokens = Vec::with_capacity(items.len());
    for item in &items {
        collect_json_tokens(item, &mut tokens)?;
    }
    Some(tokens)
}

/// Returns `None` for element shapes that carry no keyword.
fn collect_json_tokens(value: &Value, out: &mut Vec<String>) -> Option<()> {
    match value {
        Value::Null => {}
        Value::String(s) => push_trimmed(s, out),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => {
            for item in items {
                collect_json_tokens(item, out)?;
            }
        }
        Value::Object(map) => {
            let text = OBJECT_KEYWORD_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))?;
            push_trimmed(text, out);
        }
    }
    Some(())
}

/// Lenient strategy for `[a, 'b', "c"]` style values that are not JSON.
fn parse_bracket_list(raw: &str) -> Option<Vec<String>> {
    let inner = raw.strip_prefix('[')?.strip_suffix(']')?;
    if inner.contains(['[', ']', '{', '}']) {
        return None;
    }
    let tokens = inner
        .split(FLAT_DELIMITERS)
        .map(|piece| strip_quotes(piece.trim()).trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    Some(tokens)
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn push_trimmed(s: &str, out: &mut Vec<String>) {
    let t = s.trim();
    if !t.is_empty() {
        out.push(t.to_string());
    }
}
