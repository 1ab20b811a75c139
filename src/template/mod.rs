//! Template resolution for step parameter values.
//!
//! Parameter values may embed placeholders of the form `{{ reference }}`,
//! where the reference is a dotted path whose head names one of:
//!
//! - a prior step (the path indexes into that step's output mapping),
//! - the `env` namespace (`{{ env.NAME }}`, flat string values),
//! - a global workflow parameter.
//!
//! Completed steps shadow global parameters of the same name; `env` is a
//! reserved head segment.
//!
//! A value that is exactly one placeholder substitutes the referenced value
//! with its original type; placeholders embedded in a larger string
//! substitute the stringified value. Unresolved references are a hard
//! failure, never a silent empty substitution.
//!
//! # Example
//!
//! ```yaml
//! parameters:
//!   project_id: "{{ env.PROJECT_ID }}"
//!   count: "{{ batch_size }}"
//!   annotations: "{{ pull.annotations }}"
//! ```

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{LabelflowError, Result};
use crate::workflow::schema::ValueMap;

/// A segment of a parsed template string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text.
    Literal(String),
    /// Placeholder reference: `{{ reference }}`.
    Placeholder(Reference),
}

/// A dotted reference inside a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Path segments; the head names a step, `env`, or a global parameter.
    pub parts: Vec<String>,
}

impl Reference {
    /// The head segment of the reference.
    pub fn head(&self) -> &str {
        &self.parts[0]
    }

    /// The path after the head segment.
    pub fn path(&self) -> &[String] {
        &self.parts[1..]
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

/// Parse a string containing `{{ reference }}` placeholders.
///
/// A `{{` without a matching `}}` is kept as literal text, as is a
/// placeholder with an empty reference.
pub fn parse_template(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        let Some(end) = rest[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + end;

        let inner = rest[start + 2..end].trim();
        if inner.is_empty() {
            // Keep `{{ }}` as literal text.
            push_literal(&mut segments, &rest[..end + 2]);
            rest = &rest[end + 2..];
            continue;
        }

        push_literal(&mut segments, &rest[..start]);
        segments.push(Segment::Placeholder(Reference {
            parts: inner.split('.').map(|p| p.trim().to_string()).collect(),
        }));
        rest = &rest[end + 2..];
    }

    push_literal(&mut segments, rest);
    segments
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Literal(existing)) = segments.last_mut() {
        existing.push_str(text);
    } else {
        segments.push(Segment::Literal(text.to_string()));
    }
}

/// Check if a string contains any placeholder.
pub fn has_placeholders(input: &str) -> bool {
    parse_template(input)
        .iter()
        .any(|seg| matches!(seg, Segment::Placeholder(_)))
}

/// Extract all references from a template string.
pub fn extract_references(input: &str) -> Vec<Reference> {
    parse_template(input)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Placeholder(reference) => Some(reference),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Output of a completed step, as seen by the resolver.
#[derive(Debug, Clone)]
pub enum StepOutput {
    /// The handler's real output mapping.
    Real(ValueMap),
    /// Dry-run stand-in: any path into it resolves to a synthetic value.
    Placeholder,
}

/// Substitution context for one step's parameter resolution.
///
/// The execution engine owns the completed-output map and only exposes
/// steps that have already finished, so the resolver never needs to
/// re-validate graph ancestry.
#[derive(Debug)]
pub struct TemplateContext<'a> {
    /// Global workflow parameters.
    pub globals: &'a ValueMap,
    /// Environment snapshot, reachable under the `env.` namespace.
    pub env: &'a HashMap<String, String>,
    /// Outputs of already-completed steps, keyed by step name.
    pub steps: &'a HashMap<String, StepOutput>,
}

impl<'a> TemplateContext<'a> {
    /// Resolve a reference to a concrete value.
    pub fn resolve(&self, reference: &Reference) -> Result<Value> {
        let head = reference.head();

        if head == "env" {
            return self.resolve_env(reference);
        }

        if let Some(output) = self.steps.get(head) {
            return match output {
                StepOutput::Real(map) => {
                    navigate(&Value::Object(map.clone()), reference.path(), reference)
                }
                StepOutput::Placeholder => {
                    Ok(Value::String(format!("<dry-run:{}>", reference)))
                }
            };
        }

        if let Some(value) = self.globals.get(head) {
            return navigate(value, reference.path(), reference);
        }

        Err(unresolved(
            reference,
            format!("no completed step, env value, or parameter named '{}'", head),
        ))
    }

    fn resolve_env(&self, reference: &Reference) -> Result<Value> {
        match reference.path() {
            [name] => self
                .env
                .get(name)
                .map(|v| Value::String(v.clone()))
                .ok_or_else(|| {
                    unresolved(reference, format!("environment value '{}' is not set", name))
                }),
            [] => Err(unresolved(
                reference,
                "'env' requires a value name, e.g. {{ env.PROJECT_ID }}".to_string(),
            )),
            _ => Err(unresolved(
                reference,
                "environment values are flat, nested paths are not allowed".to_string(),
            )),
        }
    }
}

/// Walk a dotted path into a value (mappings by key, sequences by index).
fn navigate(value: &Value, path: &[String], reference: &Reference) -> Result<Value> {
    let mut current = value;

    for part in path {
        current = match current {
            Value::Object(map) => map.get(part).ok_or_else(|| {
                unresolved(reference, format!("no field '{}' at that path", part))
            })?,
            Value::Array(items) => {
                let idx: usize = part.parse().map_err(|_| {
                    unresolved(
                        reference,
                        format!("'{}' is not a valid sequence index", part),
                    )
                })?;
                items.get(idx).ok_or_else(|| {
                    unresolved(reference, format!("sequence index {} out of bounds", idx))
                })?
            }
            _ => {
                return Err(unresolved(
                    reference,
                    format!("cannot index into a scalar with '{}'", part),
                ))
            }
        };
    }

    Ok(current.clone())
}

fn unresolved(reference: &Reference, message: String) -> LabelflowError {
    LabelflowError::UnresolvedReference {
        reference: reference.to_string(),
        message,
    }
}

/// Resolve all placeholders in a value, recursively.
///
/// Mappings and sequences are resolved element-wise; non-string scalars
/// pass through unchanged and type-preserved.
pub fn resolve_value(value: &Value, context: &TemplateContext<'_>) -> Result<Value> {
    match value {
        Value::String(s) => resolve_string(s, context),
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                resolved.insert(key.clone(), resolve_value(val, context)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => {
            let resolved = items
                .iter()
                .map(|item| resolve_value(item, context))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(resolved))
        }
        other => Ok(other.clone()),
    }
}

/// Resolve a single string value.
///
/// A whole-string placeholder substitutes the referenced value with its
/// original type; anything else produces a string.
pub fn resolve_string(input: &str, context: &TemplateContext<'_>) -> Result<Value> {
    let segments = parse_template(input);

    if let [Segment::Placeholder(reference)] = segments.as_slice() {
        return context.resolve(reference);
    }

    let mut result = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => result.push_str(&text),
            Segment::Placeholder(reference) => {
                result.push_str(&stringify(&context.resolve(&reference)?));
            }
        }
    }

    Ok(Value::String(result))
}

/// Resolve every value in a step's parameter mapping.
pub fn resolve_parameters(parameters: &ValueMap, context: &TemplateContext<'_>) -> Result<ValueMap> {
    let mut resolved = serde_json::Map::with_capacity(parameters.len());
    for (key, value) in parameters {
        resolved.insert(key.clone(), resolve_value(value, context)?);
    }
    Ok(resolved)
}

/// Stringify a value for embedding inside a larger string.
///
/// Strings embed as-is; compound values embed as compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        compound => serde_json::to_string(compound).unwrap_or_default(),
    }
}
