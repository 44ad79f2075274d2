//! # KeyPath Model
//!
//! Canonical representation of a dotted address into nested mappings.
//!
//! A keypath has two equivalent surface forms: a separator-joined string
//! (`"a.b.c"`, separator configurable) and an explicit list of segments.
//! Splitting and rejoining is lossless for any segment that does not contain
//! the separator; empty segments are rejected.

use errors::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Default segment separator for string-form keypaths.
pub const DEFAULT_SEPARATOR: char = '.';

/// An ordered, non-empty sequence of string segments addressing a value
/// inside a nested mapping.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Provides the address type used by every accessor and container operation.
///
/// ## Usage
/// ```rust
/// use config::KeyPath;
///
/// let path = KeyPath::parse("providers.postgres.host").unwrap();
/// assert_eq!(path.segments(), ["providers", "postgres", "host"]);
/// assert_eq!(path.to_string(), "providers.postgres.host");
/// ```
///
/// ## Invariants
/// - At least one segment, every segment non-empty
/// - `Display` joins with the separator the path was built with
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
    separator: char
}

impl KeyPath {
    /// Parse a keypath from its string form using the default `.` separator.
    pub fn parse(path: &str) -> Result<Self, ConfigError> {
        Self::parse_with_separator(path, DEFAULT_SEPARATOR)
    }

    /// Parse a keypath from its string form with an explicit separator.
    pub fn parse_with_separator(path: &str, separator: char) -> Result<Self, ConfigError> {
        if path.is_empty() {
            return Err(ConfigError::InvalidKeyPath {
                path: path.to_string(),
                reason: "empty path".to_string()
            });
        }

        let segments: Vec<String> = path.split(separator).map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::InvalidKeyPath {
                path: path.to_string(),
                reason: "empty segment".to_string()
            });
        }

        Ok(Self {
            segments,
            separator
        })
    }

    /// Build a keypath from explicit segments.
    ///
    /// Segments containing the separator are accepted here; such paths are
    /// addressable but their string form is not round-trippable.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(ConfigError::InvalidKeyPath {
                path: String::new(),
                reason: "no segments".to_string()
            });
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::InvalidKeyPath {
                path: segments.join(&DEFAULT_SEPARATOR.to_string()),
                reason: "empty segment".to_string()
            });
        }

        Ok(Self {
            segments,
            separator: DEFAULT_SEPARATOR
        })
    }

    /// The path's segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Separator used by the string form.
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Final segment (the leaf key).
    pub fn leaf(&self) -> &str {
        self.segments
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// All but the final segment, or `None` for a single-segment path.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            separator: self.separator
        })
    }

    /// Extend the path by one segment.
    pub fn join(&self, segment: &str) -> Result<Self, ConfigError> {
        if segment.is_empty() {
            return Err(ConfigError::InvalidKeyPath {
                path: self.to_string(),
                reason: "empty segment".to_string()
            });
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self {
            segments,
            separator: self.separator
        })
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.segments.join(&self.separator.to_string());
        f.write_str(&joined)
    }
}

impl FromStr for KeyPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let path = KeyPath::parse("a.b.c").unwrap();
        assert_eq!(path.segments(), ["a", "b", "c"]);
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_parse_single_segment() {
        let path = KeyPath::parse("root").unwrap();
        assert_eq!(path.segments(), ["root"]);
        assert_eq!(path.leaf(), "root");
        assert!(path.parent().is_none());
    }

    #[test]
    fn test_parse_rejects_empty_path() {
        assert!(matches!(
            KeyPath::parse(""),
            Err(ConfigError::InvalidKeyPath { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_empty_segment() {
        assert!(KeyPath::parse("a..c").is_err());
        assert!(KeyPath::parse(".a").is_err());
        assert!(KeyPath::parse("a.").is_err());
    }

    #[test]
    fn test_split_rejoin_lossless() {
        for raw in ["a", "a.b", "providers.postgres.host", "x.y.z.w"] {
            let path = KeyPath::parse(raw).unwrap();
            assert_eq!(path.to_string(), raw);
        }
    }

    #[test]
    fn test_custom_separator() {
        // A doubled separator means an empty segment, which is rejected.
        assert!(KeyPath::parse_with_separator("a__b__c", '_').is_err());

        let path = KeyPath::parse_with_separator("a/b/c", '/').unwrap();
        assert_eq!(path.segments(), ["a", "b", "c"]);
        assert_eq!(path.to_string(), "a/b/c");
    }

    #[test]
    fn test_from_segments() {
        let path = KeyPath::from_segments(["a", "b"]).unwrap();
        assert_eq!(path.to_string(), "a.b");
        assert!(KeyPath::from_segments(Vec::<String>::new()).is_err());
        assert!(KeyPath::from_segments(["a", ""]).is_err());
    }

    #[test]
    fn test_parent_and_leaf() {
        let path = KeyPath::parse("a.b.c").unwrap();
        assert_eq!(path.leaf(), "c");
        assert_eq!(path.parent().unwrap().to_string(), "a.b");
    }

    #[test]
    fn test_join() {
        let path = KeyPath::parse("a.b").unwrap();
        assert_eq!(path.join("c").unwrap().to_string(), "a.b.c");
        assert!(path.join("").is_err());
    }

    #[test]
    fn test_from_str() {
        let path: KeyPath = "a.b".parse().unwrap();
        assert_eq!(path.segments(), ["a", "b"]);
    }
}
