//! # Configuration Sources
//!
//! A source descriptor pairs a raw source with an optional target section.
//!
//! The raw source is a closed tagged union resolved once at descriptor
//! construction time: a typed object (field mapping extracted via serde), a
//! plain dict, or a file identifier resolved through the file loader. Each
//! kind carries its own normalization defaults, so the merge logic never
//! inspects runtime types.

use crate::accessor::Mapping;
use crate::file_loader;
use crate::policy::{self, KeyStyle, NormalizePolicy};
use crate::resolver::{self, ResolverOptions};
use errors::{LoadPhase, SourceError};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// The three source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Typed,
    Dict,
    File
}

#[derive(Debug, Clone, PartialEq)]
enum RawSource {
    /// Field mapping extracted from a typed object at construction.
    Typed(Mapping),
    /// A plain nested mapping.
    Dict(Mapping),
    /// A file identifier, resolved through the file loader at normalize time.
    File(PathBuf)
}

/// One configuration source plus its optional target section.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Carries everything the loader needs to normalize and merge one source:
/// the raw data (or where to find it), the section to nest it under, and a
/// stable identifier for diagnostics.
///
/// ## Usage
/// ```rust
/// use config::SourceDescriptor;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct AppDefaults { timeout: u64, max_width: u32 }
///
/// let base = SourceDescriptor::typed(&AppDefaults { timeout: 5, max_width: 0 }, Some("app"))
///     .unwrap();
/// assert_eq!(base.section(), Some("app"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    raw: RawSource,
    section: Option<String>,
    id: String
}

impl SourceDescriptor {
    /// Descriptor for a typed-default object.
    ///
    /// The field mapping is extracted via serde here, once; a value that does
    /// not serialize to a mapping is rejected up front.
    pub fn typed<T: Serialize>(value: &T, section: Option<&str>) -> Result<Self, SourceError> {
        let id = std::any::type_name::<T>().to_string();
        let extracted = serde_json::to_value(value).map_err(|e| SourceError::Extract {
            source_id: id.clone(),
            reason: e.to_string()
        })?;
        match extracted {
            Value::Object(map) => Ok(Self {
                raw: RawSource::Typed(map),
                section: section.map(str::to_string),
                id
            }),
            _ => Err(SourceError::NotAMapping {
                source_id: id,
                section: section.map(str::to_string)
            })
        }
    }

    /// Descriptor for a plain nested mapping.
    pub fn dict(map: Mapping, section: Option<&str>) -> Self {
        let id = match section {
            Some(s) => format!("dict[{s}]"),
            None => "dict".to_string()
        };
        Self {
            raw: RawSource::Dict(map),
            section: section.map(str::to_string),
            id
        }
    }

    /// Descriptor for a file-backed source.
    pub fn file(path: impl AsRef<Path>, section: Option<&str>) -> Self {
        let path = path.as_ref().to_path_buf();
        let id = path.display().to_string();
        Self {
            raw: RawSource::File(path),
            section: section.map(str::to_string),
            id
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self.raw {
            RawSource::Typed(_) => SourceKind::Typed,
            RawSource::Dict(_) => SourceKind::Dict,
            RawSource::File(_) => SourceKind::File
        }
    }

    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    /// Stable identifier used in logs and errors.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The normalize policy this source kind uses in the given phase.
    ///
    /// Base phase is blank-preserving for every kind: blank is meaningful
    /// for typed defaults. Override phase drops blanks, and file-backed
    /// overrides additionally pre-resolve self-references.
    pub fn normalize_policy_for(&self, phase: LoadPhase) -> NormalizePolicy {
        match phase {
            LoadPhase::Base => NormalizePolicy::base_defaults(),
            _ => match self.kind() {
                SourceKind::File => NormalizePolicy::file_defaults(),
                SourceKind::Typed | SourceKind::Dict => NormalizePolicy::override_defaults()
            }
        }
    }

    /// Convert the raw source into a nested mapping under the target
    /// section, applying the given normalization policy.
    ///
    /// Malformed raw input surfaces a [`SourceError`] carrying the source
    /// identifier and section; an empty mapping is never silently
    /// substituted.
    pub fn normalize(&self, policy: &NormalizePolicy) -> Result<Mapping, SourceError> {
        let mut map = match &self.raw {
            RawSource::Typed(map) | RawSource::Dict(map) => map.clone(),
            RawSource::File(path) => {
                file_loader::parse_file(path).map_err(|e| SourceError::Parse {
                    source_id: self.id.clone(),
                    section: self.section.clone(),
                    reason: e.to_string()
                })?
            }
        };

        if policy.key_style != KeyStyle::Preserve {
            map = normalize_keys(map, policy.key_style);
        }

        if policy.resolve_before_merge {
            // Resolution scoped to this source's own mapping, so relative
            // references inside a file see values from the same file before
            // the source is merged into the larger state. Unresolvable
            // references stay literal for the final pass.
            let options = ResolverOptions {
                strict: false,
                ..Default::default()
            };
            resolver::resolve_mapping(&mut map, &options, &Mapping::new()).map_err(|e| {
                SourceError::Parse {
                    source_id: self.id.clone(),
                    section: self.section.clone(),
                    reason: e.to_string()
                }
            })?;
        }

        if policy.drop_blanks {
            policy::drop_blank_values(&mut map);
        }

        match &self.section {
            Some(section) => {
                let mut wrapped = Mapping::new();
                wrapped.insert(section.clone(), Value::Object(map));
                Ok(wrapped)
            }
            None => Ok(map)
        }
    }
}

fn normalize_keys(map: Mapping, style: KeyStyle) -> Mapping {
    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Object(inner) => Value::Object(normalize_keys(inner, style)),
                other => other
            };
            (style.apply(&key), value)
        })
        .collect()
}
