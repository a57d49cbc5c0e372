use glob::{MatchOptions, Pattern};
use regex::{Regex, RegexBuilder};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::{SearchError, SearchResult};

/// How a file name pattern is interpreted.
///
/// Stored as `0` (regex) or `1` (glob). Loading also accepts the names
/// understood by `FromStr`, and any other number means glob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatternSyntax {
    /// Extended regular expression, unanchored
    Regex,
    /// Shell wildcards (`*`, `?`, `[...]`)
    #[default]
    Glob,
}

impl fmt::Display for PatternSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternSyntax::Regex => write!(f, "regex"),
            PatternSyntax::Glob => write!(f, "glob"),
        }
    }
}

impl FromStr for PatternSyntax {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "regex" | "re" => Ok(PatternSyntax::Regex),
            "glob" | "fnmatch" | "wildcard" => Ok(PatternSyntax::Glob),
            other => Err(SearchError::config_error(format!(
                "Unknown pattern syntax: {}",
                other
            ))),
        }
    }
}

impl PatternSyntax {
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            PatternSyntax::Regex
        } else {
            PatternSyntax::Glob
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PatternSyntax::Regex => 0,
            PatternSyntax::Glob => 1,
        }
    }
}

impl Serialize for PatternSyntax {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

struct SyntaxVisitor;

impl<'de> Visitor<'de> for SyntaxVisitor {
    type Value = PatternSyntax;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a syntax code (0 or 1) or name (regex, glob)")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(PatternSyntax::from_code(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(if v == 0 {
            PatternSyntax::Regex
        } else {
            PatternSyntax::Glob
        })
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for PatternSyntax {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SyntaxVisitor)
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    Glob {
        pattern: Pattern,
        options: MatchOptions,
    },
}

/// A compiled file name filter
#[derive(Debug, Clone)]
pub struct Filter {
    source: String,
    syntax: PatternSyntax,
    matcher: Matcher,
}

impl Filter {
    /// Compiles `pattern` once. A regex that does not parse fails with
    /// `InvalidPattern`; globs follow `fnmatch` and accept any text.
    pub fn new(pattern: &str, match_case: bool, syntax: PatternSyntax) -> SearchResult<Self> {
        let matcher = match syntax {
            PatternSyntax::Regex => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(!match_case)
                    .build()
                    .map_err(|e| SearchError::invalid_pattern(format!("{}: {}", pattern, e)))?;
                Matcher::Regex(regex)
            }
            PatternSyntax::Glob => {
                let compiled = Pattern::new(&fnmatch_pattern(pattern))
                    .map_err(|e| SearchError::invalid_pattern(format!("{}: {}", pattern, e)))?;
                Matcher::Glob {
                    pattern: compiled,
                    options: MatchOptions {
                        case_sensitive: match_case,
                        require_literal_separator: false,
                        require_literal_leading_dot: false,
                    },
                }
            }
        };

        Ok(Self {
            source: pattern.to_string(),
            syntax,
            matcher,
        })
    }

    /// Tests a single file name (not a path)
    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(regex) => regex.is_match(name),
            Matcher::Glob { pattern, options } => pattern.matches_with(name, *options),
        }
    }

    pub fn syntax(&self) -> PatternSyntax {
        self.syntax
    }

    pub fn pattern(&self) -> &str {
        &self.source
    }
}

/// Rewrites a shell wildcard pattern so `glob::Pattern` reads it the way
/// `fnmatch` does. Runs of `*` collapse into one, `[^` negates like `[!`,
/// and a `[` that is never closed stands for itself.
fn fnmatch_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push('*');
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
            }
            '[' => match bracket_end(&chars, i) {
                Some(end) => {
                    out.push('[');
                    let mut j = i + 1;
                    if chars[j] == '^' {
                        out.push('!');
                        j += 1;
                    }
                    out.extend(&chars[j..=end]);
                    i = end;
                }
                None => out.push_str("[[]"),
            },
            c => out.push(c),
        }
        i += 1;
    }
    out
}

/// Index of the `]` closing the bracket expression opened at `start`
fn bracket_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if matches!(chars.get(j), Some('!') | Some('^')) {
        j += 1;
    }
    // a leading `]` is a member, not the end
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}
