//! Path pattern matching for regex routes.
//!
//! # Design Decisions
//! - Patterns must match the whole path, not a substring
//! - Compiled once at registration; matching is allocation-free

use regex::Regex;

/// A compiled regex that only matches complete paths.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    /// Compile `pattern`, anchoring it at both ends.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as registered, without anchors.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_whole_path_only() {
        let pattern = PathPattern::new(r"/users/\d+").unwrap();
        assert!(pattern.matches("/users/42"));
        assert!(!pattern.matches("/users/42/posts"));
        assert!(!pattern.matches("/api/users/42"));
    }

    #[test]
    fn alternation_is_anchored_as_a_group() {
        let pattern = PathPattern::new("/a|/b").unwrap();
        assert!(pattern.matches("/a"));
        assert!(pattern.matches("/b"));
        assert!(!pattern.matches("/ab"));
        assert!(!pattern.matches("x/b"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(PathPattern::new("/(unclosed").is_err());
    }
}
