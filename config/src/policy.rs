//! # Merge and Normalize Policies
//!
//! Decision objects consulted by the state container and the source
//! normalizers. The container never owns branching logic that duplicates
//! what the policy decides.

use crate::accessor::Mapping;
use serde_json::Value;

/// Behavioral policy for a [`crate::state::ConfigState`].
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Decides whether an override value is accepted, which merge depth is the
/// default, how missing-path reads behave, and whether writes may create
/// intermediate mappings.
///
/// ## Fields
/// - `allow_override_on_null`: accept `null` override values (default: false)
/// - `deep_merge_default`: merge depth when a call does not specify one
///   (default: deep)
/// - `strict_missing_path`: reads of missing paths fail instead of returning
///   `None` (default: false)
/// - `auto_create_intermediate`: overrides may create missing intermediate
///   mappings (default: true)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    pub allow_override_on_null: bool,
    pub deep_merge_default: bool,
    pub strict_missing_path: bool,
    pub auto_create_intermediate: bool
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            allow_override_on_null: false,
            deep_merge_default: true,
            strict_missing_path: false,
            auto_create_intermediate: true
        }
    }
}

impl MergePolicy {
    /// Whether an override carrying `value` should proceed.
    pub fn should_override(&self, value: &Value) -> bool {
        !value.is_null() || self.allow_override_on_null
    }
}

/// Key-name normalization applied by source normalizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStyle {
    /// Keep keys exactly as the source spelled them.
    #[default]
    Preserve,
    /// Lowercase keys.
    Lowercase,
    /// Lowercase keys and map `-`, ` ` and camelCase humps to `_`.
    SnakeCase
}

impl KeyStyle {
    pub fn apply(&self, key: &str) -> String {
        match self {
            KeyStyle::Preserve => key.to_string(),
            KeyStyle::Lowercase => key.to_lowercase(),
            KeyStyle::SnakeCase => to_snake_case(key)
        }
    }
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut prev_lower = false;
    for ch in key.chars() {
        if ch == '-' || ch == ' ' {
            out.push('_');
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// Per-source-kind normalization policy.
///
/// Base sources preserve blank values: a typed default of `0` or `""` is
/// meaningful. Override sources drop them: a blank entry in an override dict
/// means "no override", not "override to blank".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizePolicy {
    pub key_style: KeyStyle,
    pub drop_blanks: bool,
    pub resolve_before_merge: bool
}

impl NormalizePolicy {
    /// Blank-preserving defaults for base (typed-default) sources.
    pub fn base_defaults() -> Self {
        Self {
            key_style: KeyStyle::Preserve,
            drop_blanks: false,
            resolve_before_merge: false
        }
    }

    /// Blank-dropping defaults for override dict sources.
    pub fn override_defaults() -> Self {
        Self {
            key_style: KeyStyle::Preserve,
            drop_blanks: true,
            resolve_before_merge: false
        }
    }

    /// File-backed override sources additionally pre-resolve references
    /// against their own mapping before merging.
    pub fn file_defaults() -> Self {
        Self {
            key_style: KeyStyle::Preserve,
            drop_blanks: true,
            resolve_before_merge: true
        }
    }
}

/// Per-source-kind merge policy: merge depth and overwrite permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMergePolicy {
    pub deep: bool,
    pub overwrite: bool
}

impl SourceMergePolicy {
    /// Bases accumulate defaults and never clobber earlier bases.
    pub fn base_defaults() -> Self {
        Self {
            deep: true,
            overwrite: false
        }
    }

    /// Overrides deep-merge with overwrite enabled.
    pub fn override_defaults() -> Self {
        Self {
            deep: true,
            overwrite: true
        }
    }

    /// Environment inputs deep-merge unconditionally.
    pub fn environment_defaults() -> Self {
        Self {
            deep: true,
            overwrite: true
        }
    }
}

/// Whether a value counts as blank: `null`, `""`, `0`, `0.0`, or an empty
/// collection.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => {
            n.as_i64() == Some(0) || n.as_u64() == Some(0) || n.as_f64() == Some(0.0)
        }
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) => false
    }
}

/// Recursively remove blank values from a mapping.
///
/// A nested mapping emptied by the removal is itself treated as blank.
pub fn drop_blank_values(map: &mut Mapping) {
    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        let remove = match map.get_mut(&key) {
            Some(Value::Object(inner)) => {
                drop_blank_values(inner);
                inner.is_empty()
            }
            Some(value) => is_blank(value),
            None => false
        };
        if remove {
            map.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_should_override_rejects_null_by_default() {
        let policy = MergePolicy::default();
        assert!(!policy.should_override(&Value::Null));
        assert!(policy.should_override(&json!("x")));
        assert!(policy.should_override(&json!(0)));
    }

    #[test]
    fn test_should_override_null_when_allowed() {
        let policy = MergePolicy {
            allow_override_on_null: true,
            ..Default::default()
        };
        assert!(policy.should_override(&Value::Null));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!(0)));
        assert!(is_blank(&json!(0.0)));
        assert!(is_blank(&json!([])));
        assert!(is_blank(&json!({})));

        assert!(!is_blank(&json!(false)));
        assert!(!is_blank(&json!("0")));
        assert!(!is_blank(&json!(1)));
        assert!(!is_blank(&json!([0])));
    }

    #[test]
    fn test_drop_blank_values_recursive() {
        let mut map = match json!({
            "keep": 1,
            "blank": "",
            "zero": 0,
            "nested": { "empty": null, "also": "" },
            "mixed": { "keep": "x", "drop": 0 }
        }) {
            Value::Object(map) => map,
            _ => unreachable!()
        };

        drop_blank_values(&mut map);

        assert_eq!(
            Value::Object(map),
            json!({ "keep": 1, "mixed": { "keep": "x" } })
        );
    }

    #[test]
    fn test_key_style() {
        assert_eq!(KeyStyle::Preserve.apply("MaxWidth"), "MaxWidth");
        assert_eq!(KeyStyle::Lowercase.apply("MaxWidth"), "maxwidth");
        assert_eq!(KeyStyle::SnakeCase.apply("MaxWidth"), "max_width");
        assert_eq!(KeyStyle::SnakeCase.apply("max-width"), "max_width");
        assert_eq!(KeyStyle::SnakeCase.apply("timeout seconds"), "timeout_seconds");
    }

    #[test]
    fn test_source_merge_policies() {
        assert!(!SourceMergePolicy::base_defaults().overwrite);
        assert!(SourceMergePolicy::override_defaults().overwrite);
        assert!(SourceMergePolicy::environment_defaults().deep);
    }
}
