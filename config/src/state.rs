//! # KeyPath Container
//!
//! An owned nested mapping plus a [`MergePolicy`], exposing
//! override/merge/get operations that delegate behavioral decisions to the
//! policy.
//!
//! The container has no lifecycle beyond ordinary object lifetime: its only
//! transition is mapping content, gated uniformly by policy on each call.
//! Every mutating call either fully succeeds or leaves the mapping unchanged.

use crate::accessor::{self, Mapping};
use crate::keypath::KeyPath;
use crate::policy::MergePolicy;
use errors::ConfigError;
use serde_json::Value;

/// How conflicting keys are resolved during a deep merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergeMode {
    /// Patch wins on every conflict.
    Overwrite,
    /// Existing values win; differing patch leaves are recorded as conflicts.
    KeepExisting
}

/// Keypaths written and conflicts skipped by a merge, for change logging.
#[derive(Debug, Default)]
pub(crate) struct MergeReport {
    pub changes: Vec<String>,
    pub conflicts: Vec<String>
}

/// Nested mapping owned together with the merge policy that gates access to
/// it.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Holds one process's merged configuration state. All reads and writes go
/// through policy-consulting operations; no operation silently diverges from
/// policy.
///
/// ## Usage
/// ```rust
/// use config::{ConfigState, KeyPath};
/// use serde_json::json;
///
/// let mut state = ConfigState::new();
/// let path = KeyPath::parse("app.timeout").unwrap();
/// state.override_value(&path, json!(30)).unwrap();
/// assert_eq!(state.get(&path).unwrap(), Some(&json!(30)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigState {
    data: Mapping,
    policy: MergePolicy
}

impl ConfigState {
    /// Create an empty container with the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container from an initial mapping.
    pub fn from_mapping(data: Mapping) -> Self {
        Self {
            data,
            policy: MergePolicy::default()
        }
    }

    /// Create an empty container with an explicit policy.
    pub fn with_policy(policy: MergePolicy) -> Self {
        Self {
            data: Mapping::new(),
            policy
        }
    }

    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    /// Swap the policy; affects subsequent operations only.
    pub fn set_policy(&mut self, policy: MergePolicy) {
        self.policy = policy;
    }

    /// Read-only view of the owned mapping.
    pub fn data(&self) -> &Mapping {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut Mapping {
        &mut self.data
    }

    /// Consume the container, yielding the owned mapping.
    pub fn into_mapping(self) -> Mapping {
        self.data
    }

    /// Policy-gated single-value override.
    ///
    /// Returns `Ok(true)` if the value landed, `Ok(false)` if the policy
    /// rejected it (a deliberate no-op, logged at debug level). With
    /// `auto_create_intermediate` disabled, a missing parent path fails with
    /// [`ConfigError::PathNotFound`] before anything is written.
    pub fn override_value(&mut self, path: &KeyPath, value: Value) -> Result<bool, ConfigError> {
        if !self.policy.should_override(&value) {
            tracing::debug!("Override of '{}' rejected by policy (null value)", path);
            return Ok(false);
        }

        if !self.policy.auto_create_intermediate {
            if let Some(parent) = path.parent() {
                if !accessor::exists(&self.data, &parent) {
                    return Err(ConfigError::PathNotFound {
                        path: parent.to_string()
                    });
                }
            }
        }

        accessor::set(&mut self.data, path, value);
        Ok(true)
    }

    /// Merge `patch` at `at_path` (root if unspecified).
    ///
    /// Effective depth is `deep` when given, otherwise the policy default.
    /// Deep merge recursively merges mapping-valued keys, keeping existing
    /// sub-mapping keys not present in the patch; on a key where one side is
    /// a mapping and the other is not, the patch wins. Shallow merge replaces
    /// top-level keys without recursing.
    pub fn merge(
        &mut self,
        patch: Mapping,
        at_path: Option<&KeyPath>,
        deep: Option<bool>,
    ) -> Result<(), ConfigError> {
        let deep = deep.unwrap_or(self.policy.deep_merge_default);
        self.merge_with_report(patch, at_path, MergeMode::Overwrite, deep)?;
        Ok(())
    }

    /// Merge with change and conflict reporting, for the loader's per-source
    /// logging.
    pub(crate) fn merge_with_report(
        &mut self,
        patch: Mapping,
        at_path: Option<&KeyPath>,
        mode: MergeMode,
        deep: bool,
    ) -> Result<MergeReport, ConfigError> {
        let mut report = MergeReport::default();

        let target = match at_path {
            None => &mut self.data,
            Some(path) => {
                if !self.policy.auto_create_intermediate && !accessor::exists(&self.data, path) {
                    return Err(ConfigError::PathNotFound {
                        path: path.to_string()
                    });
                }
                let slot = accessor::ensure(&mut self.data, path, || Value::Object(Mapping::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Mapping::new());
                }
                match slot {
                    Value::Object(inner) => inner,
                    _ => unreachable!("slot was just made an object")
                }
            }
        };

        let prefix = at_path.map(|p| format!("{p}.")).unwrap_or_default();
        if deep {
            deep_merge_into(target, patch, mode, &prefix, &mut report);
        } else {
            shallow_merge_into(target, patch, mode, &prefix, &mut report);
        }
        Ok(report)
    }

    /// Traverse to `path`.
    ///
    /// With `strict_missing_path` set, a missing path fails with
    /// [`ConfigError::PathNotFound`]; otherwise it reads as `None`.
    pub fn get(&self, path: &KeyPath) -> Result<Option<&Value>, ConfigError> {
        match accessor::get(&self.data, path) {
            Some(value) => Ok(Some(value)),
            None if self.policy.strict_missing_path => Err(ConfigError::PathNotFound {
                path: path.to_string()
            }),
            None => Ok(None)
        }
    }

    pub fn set(&mut self, path: &KeyPath, value: Value) {
        accessor::set(&mut self.data, path, value);
    }

    pub fn exists(&self, path: &KeyPath) -> bool {
        accessor::exists(&self.data, path)
    }

    pub fn delete(&mut self, path: &KeyPath, ignore_missing: bool) -> Result<(), ConfigError> {
        accessor::delete(&mut self.data, path, ignore_missing)
    }

    pub fn ensure<F>(&mut self, path: &KeyPath, default_factory: F) -> &mut Value
    where
        F: FnOnce() -> Value,
    {
        accessor::ensure(&mut self.data, path, default_factory)
    }
}

fn deep_merge_into(
    dest: &mut Mapping,
    patch: Mapping,
    mode: MergeMode,
    prefix: &str,
    report: &mut MergeReport,
) {
    for (key, value) in patch {
        let path = format!("{prefix}{key}");
        match dest.get_mut(&key) {
            Some(Value::Object(existing)) => {
                if let Value::Object(inner) = value {
                    let child_prefix = format!("{path}.");
                    deep_merge_into(existing, inner, mode, &child_prefix, report);
                } else {
                    replace_leaf(dest, key, value, mode, &path, report);
                }
            }
            Some(_) => replace_leaf(dest, key, value, mode, &path, report),
            None => {
                report.changes.push(describe_change(&path, &value));
                dest.insert(key, value);
            }
        }
    }
}

fn shallow_merge_into(
    dest: &mut Mapping,
    patch: Mapping,
    mode: MergeMode,
    prefix: &str,
    report: &mut MergeReport,
) {
    for (key, value) in patch {
        let path = format!("{prefix}{key}");
        if dest.contains_key(&key) {
            replace_leaf(dest, key, value, mode, &path, report);
        } else {
            report.changes.push(describe_change(&path, &value));
            dest.insert(key, value);
        }
    }
}

fn replace_leaf(
    dest: &mut Mapping,
    key: String,
    value: Value,
    mode: MergeMode,
    path: &str,
    report: &mut MergeReport,
) {
    let differs = dest.get(&key) != Some(&value);
    match mode {
        MergeMode::Overwrite => {
            if differs {
                report.changes.push(describe_change(path, &value));
                dest.insert(key, value);
            }
        }
        MergeMode::KeepExisting => {
            if differs {
                report.conflicts.push(path.to_string());
            }
        }
    }
}

const SECRET_KEY_MARKERS: [&str; 5] = ["password", "token", "secret", "api_key", "passphrase"];

fn describe_change(path: &str, value: &Value) -> String {
    let leaf = path.rsplit('.').next().unwrap_or(path).to_lowercase();
    if SECRET_KEY_MARKERS.iter().any(|m| leaf.contains(m)) {
        return format!("{path} = ***");
    }
    match value {
        Value::String(s) => format!("{path} = {s}"),
        other => format!("{path} = {other}")
    }
}
