//! # Variable Resolver
//!
//! Post-merge pass that rewrites string values containing reference
//! patterns.
//!
//! Supported forms, highest to lowest priority:
//! 1. Keypath reference `${a__b__c:default}` against the merged mapping
//! 2. Simple key reference `${key:default}` against the merged mapping
//! 3. Environment variable reference `${ENV_VAR:default}`
//! 4. Context placeholder `{{var}}` from a caller-supplied context mapping
//!
//! A resolved value may itself contain another reference; expansion recurses
//! with an explicit visited chain and depth bound, so a cyclic reference
//! fails with [`ResolutionError`] instead of looping.

use crate::accessor::Mapping;
use errors::ResolutionError;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static DOLLAR_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid reference pattern"));
static FULL_DOLLAR_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{([^}]+)\}$").expect("valid reference pattern"));
static CONTEXT_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("valid context pattern"));
static FULL_CONTEXT_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{\{\s*([A-Za-z0-9_]+)\s*\}\}$").expect("valid context pattern")
});

/// Resolution behavior knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Separator marking a `${...}` body as a keypath reference.
    pub keypath_separator: String,
    /// Fail on unresolvable references instead of leaving them literal.
    pub strict: bool,
    /// Bound on recursive expansion.
    pub max_depth: usize
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            keypath_separator: "__".to_string(),
            strict: false,
            max_depth: 16
        }
    }
}

/// Resolve every string leaf of `map` in place.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Runs the reference-rewriting pass over an already-merged mapping.
/// Resolution reads a snapshot of the mapping, so rewrite order cannot
/// influence lookups and resolving an already-resolved mapping is a no-op.
pub fn resolve_mapping(
    map: &mut Mapping,
    options: &ResolverOptions,
    context: &Mapping,
) -> Result<(), ResolutionError> {
    let scope = map.clone();
    for value in map.values_mut() {
        resolve_value(value, &scope, options, context)?;
    }
    Ok(())
}

fn resolve_value(
    value: &mut Value,
    scope: &Mapping,
    options: &ResolverOptions,
    context: &Mapping,
) -> Result<(), ResolutionError> {
    match value {
        Value::String(s) => {
            let mut chain = Vec::new();
            *value = resolve_string(s, scope, options, context, &mut chain)?;
        }
        Value::Object(inner) => {
            for child in inner.values_mut() {
                resolve_value(child, scope, options, context)?;
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                resolve_value(child, scope, options, context)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Resolve one string value, following nested references.
///
/// A whole-string reference substitutes the referenced value with its type
/// intact; an embedded reference stringifies it.
fn resolve_string(
    input: &str,
    scope: &Mapping,
    options: &ResolverOptions,
    context: &Mapping,
    chain: &mut Vec<String>,
) -> Result<Value, ResolutionError> {
    if chain.len() >= options.max_depth {
        return Err(ResolutionError::DepthExceeded {
            reference: input.to_string(),
            max_depth: options.max_depth
        });
    }

    if let Some(caps) = FULL_DOLLAR_REF.captures(input) {
        let body = &caps[1];
        return match resolve_reference(body, scope, options, context, chain)? {
            Some(value) => Ok(value),
            None if options.strict => Err(ResolutionError::Unresolved {
                reference: input.to_string()
            }),
            None => Ok(Value::String(input.to_string()))
        };
    }

    if let Some(caps) = FULL_CONTEXT_REF.captures(input) {
        let name = &caps[1];
        return match context.get(name) {
            Some(value) => Ok(value.clone()),
            None if options.strict => Err(ResolutionError::Unresolved {
                reference: input.to_string()
            }),
            None => Ok(Value::String(input.to_string()))
        };
    }

    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;
    for caps in DOLLAR_REF.captures_iter(input) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let body = &caps[1];
        output.push_str(&input[cursor..whole.0]);
        match resolve_reference(body, scope, options, context, chain)? {
            Some(value) => output.push_str(&stringify(&value)),
            None if options.strict => {
                return Err(ResolutionError::Unresolved {
                    reference: body.to_string()
                });
            }
            None => output.push_str(&input[whole.0..whole.1])
        }
        cursor = whole.1;
    }
    output.push_str(&input[cursor..]);

    let with_context = replace_context_refs(&output, options, context)?;
    Ok(Value::String(with_context))
}

fn replace_context_refs(
    input: &str,
    options: &ResolverOptions,
    context: &Mapping,
) -> Result<String, ResolutionError> {
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;
    for caps in CONTEXT_REF.captures_iter(input) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let name = &caps[1];
        output.push_str(&input[cursor..whole.0]);
        match context.get(name) {
            Some(value) => output.push_str(&stringify(value)),
            None if options.strict => {
                return Err(ResolutionError::Unresolved {
                    reference: name.to_string()
                });
            }
            None => output.push_str(&input[whole.0..whole.1])
        }
        cursor = whole.1;
    }
    output.push_str(&input[cursor..]);
    Ok(output)
}

/// Resolve a `${...}` body: keypath, then top-level key, then process env,
/// then the declared default. `Ok(None)` means unresolvable.
///
/// Whichever branch produces a string, nested references in it are expanded
/// through the same chain, so environment- and default-derived values get
/// the same recursion and cycle detection as scope values.
fn resolve_reference(
    body: &str,
    scope: &Mapping,
    options: &ResolverOptions,
    context: &Mapping,
    chain: &mut Vec<String>,
) -> Result<Option<Value>, ResolutionError> {
    let (name, default) = match body.split_once(':') {
        Some((name, default)) => (name, Some(default)),
        None => (body, None)
    };

    if chain.iter().any(|seen| seen == name) {
        return Err(ResolutionError::Cycle {
            reference: name.to_string(),
            chain: chain.clone()
        });
    }

    if let Some(found) = lookup(name, scope, options) {
        if let Value::String(inner) = &found {
            return expand_nested(name, inner, scope, options, context, chain).map(Some);
        }
        return Ok(Some(found));
    }

    if let Ok(env_value) = std::env::var(name) {
        return expand_nested(name, &env_value, scope, options, context, chain).map(Some);
    }

    match default {
        Some(d) => expand_nested(name, d, scope, options, context, chain).map(Some),
        None => Ok(None)
    }
}

fn expand_nested(
    name: &str,
    raw: &str,
    scope: &Mapping,
    options: &ResolverOptions,
    context: &Mapping,
    chain: &mut Vec<String>,
) -> Result<Value, ResolutionError> {
    chain.push(name.to_string());
    let resolved = resolve_string(raw, scope, options, context, chain)?;
    chain.pop();
    Ok(resolved)
}

/// Keypath-form names try the traversal first, then fall back to a literal
/// top-level key spelled with the separator in it.
fn lookup(name: &str, scope: &Mapping, options: &ResolverOptions) -> Option<Value> {
    if !options.keypath_separator.is_empty() && name.contains(&options.keypath_separator) {
        if let Some(found) = lookup_keypath(name, scope, &options.keypath_separator) {
            return Some(found);
        }
    }
    scope.get(name).cloned()
}

fn lookup_keypath(name: &str, scope: &Mapping, separator: &str) -> Option<Value> {
    let mut current = scope;
    let mut segments = name.split(separator).peekable();
    while let Some(segment) = segments.next() {
        let value = current.get(segment)?;
        if segments.peek().is_none() {
            return Some(value.clone());
        }
        current = value.as_object()?;
    }
    None
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        composite => serde_json::to_string(composite).unwrap_or_default()
    }
}
