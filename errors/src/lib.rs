//! # Stratum Errors
//!
//! Shared error taxonomy for the layered configuration engine.
//!
//! - Uses `thiserror` for structured error definitions
//! - Provides `Display` and `Error` trait implementations
//! - Every failure carries the originating source identifier, section or
//!   keypath so misconfiguration is diagnosable without inspecting internals

use std::fmt;
use thiserror::Error;

/// Phase of the loader pipeline in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Base,
    Override,
    Environment
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadPhase::Base => "base",
            LoadPhase::Override => "override",
            LoadPhase::Environment => "environment"
        };
        f.write_str(name)
    }
}

/// Keypath-level and container-level errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid keypath '{path}': {reason}")]
    InvalidKeyPath { path: String, reason: String },

    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    #[error("Section not found: {section}")]
    SectionNotFound { section: String }
}

/// A normalize step failed for a given source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to parse source {source_id} (section {section:?}): {reason}")]
    Parse {
        source_id: String,
        section: Option<String>,
        reason: String
    },

    #[error("Source {source_id} (section {section:?}) did not produce a mapping")]
    NotAMapping {
        source_id: String,
        section: Option<String>
    },

    #[error("Failed to extract fields from typed source {source_id}: {reason}")]
    Extract { source_id: String, reason: String }
}

/// Variable resolution hit a cycle or an unresolvable strict reference.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Cyclic reference '{reference}' (chain: {chain:?})")]
    Cycle {
        reference: String,
        chain: Vec<String>
    },

    #[error("Reference '{reference}' exceeded maximum resolution depth {max_depth}")]
    DepthExceeded {
        reference: String,
        max_depth: usize
    },

    #[error("Unresolvable reference '{reference}'")]
    Unresolved { reference: String }
}

/// Typed re-hydration failed.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Section {section:?} does not match the target schema: {reason}")]
    Shape {
        section: Option<String>,
        reason: String
    },

    #[error("Validation failed for section {section:?}: {fields:?}")]
    Schema {
        section: Option<String>,
        fields: Vec<String>
    }
}

/// A merge phase failed; loader construction is all-or-nothing.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("{phase} phase failed for source {source_id}: {source}")]
    Source {
        phase: LoadPhase,
        source_id: String,
        #[source]
        source: SourceError
    },

    #[error("Conflicting base values for path '{path}' in section '{section}'")]
    BaseConflict { section: String, path: String },

    #[error("{phase} phase failed: {source}")]
    State {
        phase: LoadPhase,
        #[source]
        source: ConfigError
    },

    #[error("Variable resolution failed: {source}")]
    Resolution {
        #[from]
        source: ResolutionError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_phase_display() {
        assert_eq!(LoadPhase::Base.to_string(), "base");
        assert_eq!(LoadPhase::Override.to_string(), "override");
        assert_eq!(LoadPhase::Environment.to_string(), "environment");
    }

    #[test]
    fn test_load_error_messages_name_phase_and_source() {
        let error = ConfigLoadError::Source {
            phase: LoadPhase::Override,
            source_id: "dict[app]".to_string(),
            source: SourceError::NotAMapping {
                source_id: "dict[app]".to_string(),
                section: Some("app".to_string())
            }
        };
        let message = error.to_string();
        assert!(message.contains("override"));
        assert!(message.contains("dict[app]"));
    }

    #[test]
    fn test_resolution_error_converts() {
        let error: ConfigLoadError = ResolutionError::Unresolved {
            reference: "missing".to_string()
        }
        .into();
        assert!(matches!(error, ConfigLoadError::Resolution { .. }));
    }
}
