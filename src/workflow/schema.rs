//! Workflow schema definitions.
//!
//! This module contains the struct definitions that map to the workflow
//! file format. A workflow is a named list of steps; each step invokes
//! either an agent (pluggable labeling capability) or a built-in action
//! (data exchange with the labeling platform) and may depend on other
//! steps by name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter and output mappings are JSON-shaped, whatever the file format.
pub type ValueMap = Map<String, Value>;

/// Root workflow definition, immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name (for display and logging).
    pub name: String,

    /// Workflow description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Global parameters, referenceable from step parameters.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: ValueMap,

    /// Steps in declaration order. Declaration order is a tie-break hint
    /// for the execution plan, not the authoritative order.
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

impl WorkflowDefinition {
    /// Look up a step by name.
    pub fn step(&self, name: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Which class of capability a step invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    /// Pluggable user-supplied capability (sampling, discovery, validation).
    Agent,
    /// Built-in platform action (push/pull against the labeling service).
    Action,
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerKind::Agent => write!(f, "agent"),
            HandlerKind::Action => write!(f, "action"),
        }
    }
}

/// Reference to the capability a step invokes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerRef {
    pub kind: HandlerKind,
    pub name: String,
}

impl std::fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// One named unit of work in a workflow.
///
/// The serialized form uses mutually exclusive `agent:` / `action:` keys:
///
/// ```yaml
/// - name: sample
///   agent: intelligent_sampler
///   parameters:
///     count: "{{ batch_size }}"
///   depends_on: [pull]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "StepSpecRaw", into = "StepSpecRaw")]
pub struct StepSpec {
    /// Step name, unique within the workflow.
    pub name: String,

    /// The capability this step invokes.
    pub handler: HandlerRef,

    /// Step parameters; values may be literals or template expressions.
    pub parameters: ValueMap,

    /// Names of steps that must complete before this one.
    pub depends_on: Vec<String>,
}

/// Serialized mirror of [`StepSpec`] with the `agent:`/`action:` keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StepSpecRaw {
    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    agent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    parameters: ValueMap,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
}

impl TryFrom<StepSpecRaw> for StepSpec {
    type Error = String;

    fn try_from(raw: StepSpecRaw) -> Result<Self, Self::Error> {
        let handler = match (raw.agent, raw.action) {
            (Some(agent), None) => HandlerRef {
                kind: HandlerKind::Agent,
                name: agent,
            },
            (None, Some(action)) => HandlerRef {
                kind: HandlerKind::Action,
                name: action,
            },
            (Some(_), Some(_)) => {
                return Err(format!(
                    "step '{}' declares both 'agent' and 'action'",
                    raw.name
                ))
            }
            (None, None) => {
                return Err(format!(
                    "step '{}' must declare either 'agent' or 'action'",
                    raw.name
                ))
            }
        };

        Ok(StepSpec {
            name: raw.name,
            handler,
            parameters: raw.parameters,
            depends_on: raw.depends_on,
        })
    }
}

impl From<StepSpec> for StepSpecRaw {
    fn from(step: StepSpec) -> Self {
        let (agent, action) = match step.handler.kind {
            HandlerKind::Agent => (Some(step.handler.name), None),
            HandlerKind::Action => (None, Some(step.handler.name)),
        };

        StepSpecRaw {
            name: step.name,
            agent,
            action,
            parameters: step.parameters,
            depends_on: step.depends_on,
        }
    }
}
