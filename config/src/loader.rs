//! # Config Loader
//!
//! Composes base sources, then override sources, then environment inputs,
//! in a fixed three-phase order, applying the correct per-source merge
//! policy at each phase, and holds the resulting state.
//!
//! # Precedence Order
//! 1. Base sources (typed defaults, blank-preserving, earliest wins)
//! 2. Override sources (blank-dropping, in list order, latest wins)
//! 3. Environment inputs (folded into a reserved section, files then
//!    process snapshot then literals)
//!
//! Construction is all-or-nothing: a normalize or merge failure in any one
//! source aborts with [`ConfigLoadError`] and no partially-merged state is
//! exposed.

use crate::accessor::Mapping;
use crate::file_loader;
use crate::keypath::KeyPath;
use crate::policy::{MergePolicy, SourceMergePolicy};
use crate::resolver::{self, ResolverOptions};
use crate::source::SourceDescriptor;
use crate::state::{ConfigState, MergeMode};
use errors::{ConfigError, ConfigLoadError, LoadPhase, SourceError, ValidationError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use validator::Validate;

/// Which process-environment entries the environment phase imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSelect {
    /// Import the whole process environment.
    All,
    /// Import only the named keys, skipping unset ones.
    Keys(Vec<String>)
}

/// Builder for [`ConfigLoader`].
///
/// Source order is significant: within each phase, later entries take
/// precedence over earlier ones for the same path (base phase excepted,
/// where the earliest base wins).
#[derive(Debug, Clone)]
pub struct ConfigLoaderBuilder {
    bases: Vec<SourceDescriptor>,
    overrides: Vec<SourceDescriptor>,
    env_files: Vec<PathBuf>,
    env_literals: Vec<String>,
    env_process: Option<EnvSelect>,
    env_section: String,
    context: Mapping,
    resolver: ResolverOptions,
    merge_policy: MergePolicy,
    strict_base_conflicts: bool
}

impl Default for ConfigLoaderBuilder {
    fn default() -> Self {
        Self {
            bases: Vec::new(),
            overrides: Vec::new(),
            env_files: Vec::new(),
            env_literals: Vec::new(),
            env_process: None,
            env_section: "env".to_string(),
            context: Mapping::new(),
            resolver: ResolverOptions::default(),
            merge_policy: MergePolicy::default(),
            strict_base_conflicts: false
        }
    }
}

impl ConfigLoaderBuilder {
    /// Append a base (typed-default) source.
    pub fn base(mut self, source: SourceDescriptor) -> Self {
        self.bases.push(source);
        self
    }

    /// Append an override source.
    pub fn override_source(mut self, source: SourceDescriptor) -> Self {
        self.overrides.push(source);
        self
    }

    /// Append a `KEY=VALUE` environment literal.
    pub fn env_literal(mut self, literal: impl Into<String>) -> Self {
        self.env_literals.push(literal.into());
        self
    }

    /// Append a dotenv-style environment file.
    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_files.push(path.into());
        self
    }

    /// Import the whole process environment (snapshot taken at load time).
    pub fn env_process_all(mut self) -> Self {
        self.env_process = Some(EnvSelect::All);
        self
    }

    /// Import only the named process-environment keys.
    pub fn env_process_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_process = Some(EnvSelect::Keys(
            keys.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Reserved top-level section for environment inputs (default `"env"`).
    pub fn env_section(mut self, section: impl Into<String>) -> Self {
        self.env_section = section.into();
        self
    }

    /// Context mapping for `{{var}}` placeholders.
    pub fn context(mut self, context: Mapping) -> Self {
        self.context = context;
        self
    }

    /// Fail resolution on unresolvable references.
    pub fn strict_resolution(mut self, strict: bool) -> Self {
        self.resolver.strict = strict;
        self
    }

    /// Separator for `${a__b}`-style keypath references.
    pub fn resolver_keypath_separator(mut self, separator: impl Into<String>) -> Self {
        self.resolver.keypath_separator = separator.into();
        self
    }

    /// Abort loading when two base sources disagree on the same leaf path,
    /// instead of keeping the earliest and warning.
    pub fn strict_base_conflicts(mut self, strict: bool) -> Self {
        self.strict_base_conflicts = strict;
        self
    }

    /// Merge policy for the resulting state container.
    pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Run the three merge phases and the resolution pass.
    pub fn load(self) -> Result<ConfigLoader, ConfigLoadError> {
        let state = build_state(&self)?;
        Ok(ConfigLoader {
            inputs: self,
            state
        })
    }
}

/// The merge orchestrator and the process's configuration state.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Owns one fully merged, resolved configuration state and the source lists
/// it was built from. Runtime overrides go through the policy-gated state
/// container; a reload re-runs the phases against a fresh state and swaps it
/// in only on success.
///
/// ## Usage
/// ```rust
/// use config::{ConfigLoader, SourceDescriptor};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct AppDefaults { timeout: u64 }
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let loader = ConfigLoader::builder()
///         .base(SourceDescriptor::typed(&AppDefaults { timeout: 5 }, Some("app"))?)
///         .env_literal("RUN_MODE=dev")
///         .load()?;
///     let app = loader.to_mapping(Some("app"))?;
///     assert_eq!(app["timeout"], 5);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    inputs: ConfigLoaderBuilder,
    state: ConfigState
}

impl ConfigLoader {
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::default()
    }

    /// The live state container.
    pub fn state(&self) -> &ConfigState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ConfigState {
        &mut self.state
    }

    /// Snapshot export, optionally scoped to one top-level section.
    pub fn to_mapping(&self, section: Option<&str>) -> Result<Mapping, ConfigError> {
        match section {
            None => Ok(self.state.data().clone()),
            Some(name) => match self.state.data().get(name) {
                Some(Value::Object(map)) => Ok(map.clone()),
                _ => Err(ConfigError::SectionNotFound {
                    section: name.to_string()
                })
            }
        }
    }

    /// Re-validate the (sectioned) mapping into a typed object.
    pub fn to_typed<T>(&self, section: Option<&str>) -> Result<T, ValidationError>
    where
        T: DeserializeOwned + Validate,
    {
        let mapping = self.to_mapping(section).map_err(|e| ValidationError::Shape {
            section: section.map(str::to_string),
            reason: e.to_string()
        })?;

        let typed: T =
            serde_json::from_value(Value::Object(mapping)).map_err(|e| ValidationError::Shape {
                section: section.map(str::to_string),
                reason: e.to_string()
            })?;

        typed.validate().map_err(|errors| ValidationError::Schema {
            section: section.map(str::to_string),
            fields: flatten_validation_errors(&errors)
        })?;

        Ok(typed)
    }

    /// Runtime single-value override, delegating to the state container.
    pub fn override_value(&mut self, path: &KeyPath, value: Value) -> Result<bool, ConfigError> {
        self.state.override_value(path, value)
    }

    /// Policy-gated read of one keypath.
    pub fn get(&self, path: &KeyPath) -> Result<Option<&Value>, ConfigError> {
        self.state.get(path)
    }

    /// Re-run the three phases from the retained source lists.
    ///
    /// The existing state stays untouched unless the rebuild succeeds.
    pub fn reload(&mut self) -> Result<(), ConfigLoadError> {
        let state = build_state(&self.inputs)?;
        self.state = state;
        Ok(())
    }
}

fn build_state(inputs: &ConfigLoaderBuilder) -> Result<ConfigState, ConfigLoadError> {
    let mut state = ConfigState::with_policy(inputs.merge_policy);

    apply_base_phase(&mut state, inputs)?;
    apply_override_phase(&mut state, inputs)?;
    apply_environment_phase(&mut state, inputs)?;

    resolver::resolve_mapping(state.data_mut(), &inputs.resolver, &inputs.context)?;

    Ok(state)
}

/// Base phase: accumulate defaults, do not overwrite.
///
/// An absent section is a shallow insert; a present one is a default-filling
/// deep merge where the earliest base wins. Differing leaf values between
/// bases are surfaced, not silently resolved away.
fn apply_base_phase(
    state: &mut ConfigState,
    inputs: &ConfigLoaderBuilder,
) -> Result<(), ConfigLoadError> {
    let merge = SourceMergePolicy::base_defaults();
    for source in &inputs.bases {
        let normalized = normalize_source(source, LoadPhase::Base)?;
        let mode = if merge.overwrite {
            MergeMode::Overwrite
        } else {
            MergeMode::KeepExisting
        };

        let deep = match source.section() {
            Some(section) => state.data().contains_key(section) && merge.deep,
            None => merge.deep
        };

        let report = state
            .merge_with_report(normalized, None, mode, deep)
            .map_err(|e| ConfigLoadError::State {
                phase: LoadPhase::Base,
                source: e
            })?;

        if !report.conflicts.is_empty() {
            if inputs.strict_base_conflicts {
                let path = report.conflicts[0].clone();
                let section = source.section().unwrap_or("<root>").to_string();
                return Err(ConfigLoadError::BaseConflict { section, path });
            }
            for path in &report.conflicts {
                tracing::warn!(
                    "Base sources disagree on '{}'; keeping the earliest value (source {})",
                    path,
                    source.id()
                );
            }
        }

        if !report.changes.is_empty() {
            tracing::info!("Configuration from {}: {:?}", source.id(), report.changes);
        }
    }
    Ok(())
}

/// Override phase: deep merge with overwrite into existing sections, plain
/// insert for sections no prior source defined.
fn apply_override_phase(
    state: &mut ConfigState,
    inputs: &ConfigLoaderBuilder,
) -> Result<(), ConfigLoadError> {
    let merge = SourceMergePolicy::override_defaults();
    for source in &inputs.overrides {
        let normalized = normalize_source(source, LoadPhase::Override)?;

        let deep = match source.section() {
            Some(section) => state.data().contains_key(section) && merge.deep,
            None => merge.deep
        };

        let report = state
            .merge_with_report(normalized, None, MergeMode::Overwrite, deep)
            .map_err(|e| ConfigLoadError::State {
                phase: LoadPhase::Override,
                source: e
            })?;

        if !report.changes.is_empty() {
            tracing::info!("Configuration from {}: {:?}", source.id(), report.changes);
        }
    }
    Ok(())
}

/// Environment phase: fold every environment input into the reserved
/// section via unconditional deep merge.
///
/// Within the phase, files apply first, then the process snapshot, then
/// literals, so an explicit literal always wins.
fn apply_environment_phase(
    state: &mut ConfigState,
    inputs: &ConfigLoaderBuilder,
) -> Result<(), ConfigLoadError> {
    let mut env_map = Mapping::new();

    for path in &inputs.env_files {
        let pairs = file_loader::parse_env_file(path).map_err(|e| ConfigLoadError::Source {
            phase: LoadPhase::Environment,
            source_id: path.display().to_string(),
            source: SourceError::Parse {
                source_id: path.display().to_string(),
                section: Some(inputs.env_section.clone()),
                reason: e.to_string()
            }
        })?;
        for (key, value) in pairs {
            env_map.insert(key, Value::String(value));
        }
    }

    match &inputs.env_process {
        Some(EnvSelect::All) => {
            for (key, value) in std::env::vars() {
                env_map.insert(key, Value::String(value));
            }
        }
        Some(EnvSelect::Keys(keys)) => {
            for key in keys {
                if let Ok(value) = std::env::var(key) {
                    env_map.insert(key.clone(), Value::String(value));
                }
            }
        }
        None => {}
    }

    for literal in &inputs.env_literals {
        let Some((key, value)) = literal.split_once('=') else {
            return Err(ConfigLoadError::Source {
                phase: LoadPhase::Environment,
                source_id: "literal".to_string(),
                source: SourceError::Parse {
                    source_id: "literal".to_string(),
                    section: Some(inputs.env_section.clone()),
                    reason: "expected KEY=VALUE".to_string()
                }
            });
        };
        env_map.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
    }

    if env_map.is_empty() {
        return Ok(());
    }

    let merge = SourceMergePolicy::environment_defaults();
    let mut wrapped = Mapping::new();
    wrapped.insert(inputs.env_section.clone(), Value::Object(env_map));

    let report = state
        .merge_with_report(wrapped, None, MergeMode::Overwrite, merge.deep)
        .map_err(|e| ConfigLoadError::State {
            phase: LoadPhase::Environment,
            source: e
        })?;

    if !report.changes.is_empty() {
        tracing::info!("Configuration from environment: {:?}", report.changes);
    }
    Ok(())
}

fn normalize_source(
    source: &SourceDescriptor,
    phase: LoadPhase,
) -> Result<Mapping, ConfigLoadError> {
    let policy = source.normalize_policy_for(phase);
    source
        .normalize(&policy)
        .map_err(|e| ConfigLoadError::Source {
            phase,
            source_id: source.id().to_string(),
            source: e
        })
}

fn flatten_validation_errors(errors: &validator::ValidationErrors) -> Vec<String> {
    let mut fields: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors
                .iter()
                .map(|e| format!("{field}: {}", e.code))
                .collect::<Vec<_>>()
        })
        .collect();
    fields.sort();
    fields
}
