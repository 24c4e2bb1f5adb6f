//! Compile-once regex wrapper for `pattern` and `patternProperties`.

use regex::Regex;

/// A schema-supplied pattern, compiled once at schema-compile time.
///
/// Patterns are unanchored searches, matching the JSON Schema recommendation.
/// A pattern that failed to compile is kept with its source text but matches
/// nothing; the compiler records the parser error separately.
#[derive(Debug, Clone)]
pub struct Matcher {
    source: String,
    compiled: Option<Regex>,
}

impl Matcher {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let compiled = Regex::new(pattern)?;
        Ok(Matcher {
            source: pattern.to_string(),
            compiled: Some(compiled),
        })
    }

    /// A matcher that rejects every string. Used when the schema carried an
    /// invalid pattern: the node is still inserted, but it matches nothing.
    pub fn rejecting(pattern: &str) -> Self {
        Matcher {
            source: pattern.to_string(),
            compiled: None,
        }
    }

    pub fn is_match(&self, value: &str) -> bool {
        match &self.compiled {
            Some(regex) => regex.is_match(value),
            None => false,
        }
    }

    /// The original pattern text, for diagnostics and pointer computation.
    pub fn source(&self) -> &str {
        &self.source
    }
}
