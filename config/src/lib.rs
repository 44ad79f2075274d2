//! # Configuration System
//!
//! Layered configuration merge-and-resolve engine.
//!
//! This crate provides:
//! - Dot-separated keypaths addressing values in nested mappings
//! - A policy-gated state container over one merged mapping
//! - Source normalizers for typed defaults, dicts and config files
//! - A three-phase loader (base, then overrides, then environment)
//! - Post-merge variable resolution (`${ref}` and `{{context}}` forms)
//! - Typed re-hydration with schema validation
//!
//! # Best Practices
//!
//! - Uses `validator` crate for typed-section validation
//! - Loader construction is all-or-nothing; no partially-merged state
//! - Environment inputs never silently clobber application sections
//! - Provides clear error messages for invalid configuration

pub mod accessor;
pub mod file_loader;
pub mod keypath;
pub mod loader;
pub mod policy;
pub mod resolver;
pub mod source;
pub mod state;

pub use accessor::Mapping;
pub use file_loader::{parse_env_file, parse_file, parse_json, parse_toml, parse_yaml, ParseError};
pub use keypath::{KeyPath, DEFAULT_SEPARATOR};
pub use loader::{ConfigLoader, ConfigLoaderBuilder, EnvSelect};
pub use policy::{
    drop_blank_values, is_blank, KeyStyle, MergePolicy, NormalizePolicy, SourceMergePolicy,
};
pub use resolver::{resolve_mapping, ResolverOptions};
pub use source::{SourceDescriptor, SourceKind};
pub use state::ConfigState;
pub use validator::Validate;
