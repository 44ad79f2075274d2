//! # Configuration File Loading
//!
//! Turns a file path into a raw nested mapping.
//!
//! Supports automatic format detection based on file extension: TOML, YAML
//! and JSON, plus dotenv-style `KEY=VALUE` files for the environment phase.

use crate::accessor::Mapping;
use serde_json::Value;
use std::path::Path;

/// File parsing error.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),

    #[error("Top level of {0} is not a mapping")]
    NotAMapping(String),

    #[error("Invalid KEY=VALUE entry at line {line}")]
    InvalidEnvLine { line: usize }
}

/// Load a raw mapping from a TOML file.
pub fn parse_toml(path: &Path) -> Result<Mapping, ParseError> {
    let contents = read(path)?;
    let value: toml::Value =
        toml::from_str(&contents).map_err(|e| ParseError::TomlParse(e.to_string()))?;
    as_mapping(toml_to_json(value), path)
}

/// Load a raw mapping from a YAML file.
pub fn parse_yaml(path: &Path) -> Result<Mapping, ParseError> {
    let contents = read(path)?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&contents).map_err(|e| ParseError::YamlParse(e.to_string()))?;
    as_mapping(yaml_to_json(value), path)
}

/// Load a raw mapping from a JSON file.
pub fn parse_json(path: &Path) -> Result<Mapping, ParseError> {
    let contents = read(path)?;
    let value: Value =
        serde_json::from_str(&contents).map_err(|e| ParseError::JsonParse(e.to_string()))?;
    as_mapping(value, path)
}

/// Load a raw mapping from a file with format auto-detection.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Resolves a file-backed source into a nested mapping, detecting the format
/// from the extension.
///
/// ## Supported Formats
/// - `.toml`: TOML format
/// - `.yaml` / `.yml`: YAML format
/// - `.json`: JSON format
///
/// ## Error Handling
/// Returns `ParseError` for a missing file, missing or unsupported
/// extension, a parse failure of the detected format, or a file whose top
/// level is not a mapping.
pub fn parse_file(path: &Path) -> Result<Mapping, ParseError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ParseError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => parse_toml(path),
        "yaml" | "yml" => parse_yaml(path),
        "json" => parse_json(path),
        other => Err(ParseError::UnsupportedFormat(other.to_string()))
    }
}

/// Parse a dotenv-style file into ordered `KEY=VALUE` pairs.
///
/// Blank lines and `#` comments are skipped; surrounding single or double
/// quotes on the value are stripped. Raw line contents are never echoed in
/// errors.
pub fn parse_env_file(path: &Path) -> Result<Vec<(String, String)>, ParseError> {
    let contents = read(path)?;
    let mut pairs = Vec::new();

    for (index, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ParseError::InvalidEnvLine { line: index + 1 });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::InvalidEnvLine { line: index + 1 });
        }
        pairs.push((key.to_string(), unquote(value.trim()).to_string()));
    }

    Ok(pairs)
}

fn read(path: &Path) -> Result<String, ParseError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ParseError::FileNotFound(path.display().to_string()))
        }
        Err(e) => Err(ParseError::Io(e))
    }
}

fn as_mapping(value: Value, path: &Path) -> Result<Mapping, ParseError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAMapping(path.display().to_string()))
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        )
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)
    }
}

// Non-string YAML keys are stringified; key ordering is not load-bearing.
fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_toml() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("toml");
        fs::write(
            &path,
            r#"
[app]
host = "testhost"
port = 5433
ratio = 0.5
"#,
        )
        .unwrap();

        let map = parse_toml(&path).unwrap();
        assert_eq!(
            Value::Object(map),
            json!({ "app": { "host": "testhost", "port": 5433, "ratio": 0.5 } })
        );
    }

    #[test]
    fn test_parse_yaml() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yaml");
        fs::write(
            &path,
            r#"
app:
  host: testhost
  port: 5433
  tags: [a, b]
"#,
        )
        .unwrap();

        let map = parse_yaml(&path).unwrap();
        assert_eq!(
            Value::Object(map),
            json!({ "app": { "host": "testhost", "port": 5433, "tags": ["a", "b"] } })
        );
    }

    #[test]
    fn test_parse_json() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("json");
        fs::write(&path, r#"{ "app": { "host": "testhost" } }"#).unwrap();

        let map = parse_json(&path).unwrap();
        assert_eq!(map["app"]["host"], json!("testhost"));
    }

    #[test]
    fn test_parse_file_auto_detect() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yml");
        fs::write(&path, "app:\n  host: autohost\n").unwrap();

        let map = parse_file(&path).unwrap();
        assert_eq!(map["app"]["host"], json!("autohost"));
    }

    #[test]
    fn test_parse_file_no_extension() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("");
        fs::write(&path, "").unwrap();

        assert!(matches!(parse_file(&path), Err(ParseError::NoExtension)));
    }

    #[test]
    fn test_parse_file_unsupported() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("ini");
        fs::write(&path, "").unwrap();

        assert!(matches!(
            parse_file(&path),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_parse_file_not_found() {
        let result = parse_file(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ParseError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_toml_invalid() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("toml");
        fs::write(&path, "[invalid\n").unwrap();

        assert!(matches!(parse_toml(&path), Err(ParseError::TomlParse(_))));
    }

    #[test]
    fn test_parse_yaml_invalid() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yaml");
        fs::write(&path, "invalid: [unmatched\n").unwrap();

        assert!(matches!(parse_yaml(&path), Err(ParseError::YamlParse(_))));
    }

    #[test]
    fn test_parse_yaml_non_mapping_top_level() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yaml");
        fs::write(&path, "- just\n- a\n- list\n").unwrap();

        assert!(matches!(parse_yaml(&path), Err(ParseError::NotAMapping(_))));
    }

    #[test]
    fn test_parse_env_file() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("env");
        fs::write(
            &path,
            "# comment\nTIMEOUT=20\nNAME=\"quoted value\"\n\nEMPTY=\n",
        )
        .unwrap();

        let pairs = parse_env_file(&path).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("TIMEOUT".to_string(), "20".to_string()),
                ("NAME".to_string(), "quoted value".to_string()),
                ("EMPTY".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_parse_env_file_invalid_line() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("env");
        fs::write(&path, "JUST_A_WORD\n").unwrap();

        assert!(matches!(
            parse_env_file(&path),
            Err(ParseError::InvalidEnvLine { line: 1 })
        ));
    }
}
