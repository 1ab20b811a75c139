//! Handler registry and dispatch.
//!
//! A handler is the capability a step invokes: an *agent* (pluggable
//! labeling/validation logic supplied by the caller) or an *action*
//! (built-in data exchange with the labeling platform). The registry is an
//! open name-to-capability table per kind, resolved at run start; the
//! dispatcher performs no business logic itself.

pub mod actions;

use std::collections::HashMap;

use crate::error::{LabelflowError, Result};
use crate::workflow::schema::{HandlerKind, HandlerRef, ValueMap};

pub use actions::{register_labellerr_actions, LabellerrClient, PULL_ACTION, PUSH_ACTION};

/// An invocable step capability.
///
/// Handlers receive fully resolved parameters and return a structured
/// output mapping, opaque to the engine. Failures surface as `anyhow`
/// errors and are wrapped by the engine with step context.
pub trait Handler: Send + Sync {
    /// Fail-fast parameter check, called before [`Handler::call`].
    ///
    /// The default accepts anything; handlers with required parameters
    /// override this to fail with a descriptive error rather than deep
    /// inside the capability.
    fn validate(&self, _parameters: &ValueMap) -> anyhow::Result<()> {
        Ok(())
    }

    /// Invoke the capability with resolved parameters.
    fn call(&self, parameters: &ValueMap) -> anyhow::Result<ValueMap>;
}

impl<F> Handler for F
where
    F: Fn(&ValueMap) -> anyhow::Result<ValueMap> + Send + Sync,
{
    fn call(&self, parameters: &ValueMap) -> anyhow::Result<ValueMap> {
        self(parameters)
    }
}

/// Registry of named capabilities, keyed by kind and name.
#[derive(Default)]
pub struct HandlerRegistry {
    agents: HashMap<String, Box<dyn Handler>>,
    actions: HashMap<String, Box<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent capability under the given name.
    pub fn register_agent(&mut self, name: impl Into<String>, handler: impl Handler + 'static) {
        self.agents.insert(name.into(), Box::new(handler));
    }

    /// Register an action capability under the given name.
    pub fn register_action(&mut self, name: impl Into<String>, handler: impl Handler + 'static) {
        self.actions.insert(name.into(), Box::new(handler));
    }

    /// Check whether a handler exists for the given reference.
    pub fn contains(&self, handler: &HandlerRef) -> bool {
        self.table(handler.kind).contains_key(&handler.name)
    }

    /// Look up a handler, failing with [`LabelflowError::UnknownHandler`]
    /// if absent.
    pub fn get(&self, handler: &HandlerRef) -> Result<&dyn Handler> {
        self.table(handler.kind)
            .get(&handler.name)
            .map(|h| h.as_ref())
            .ok_or_else(|| LabelflowError::UnknownHandler {
                kind: handler.kind.to_string(),
                name: handler.name.clone(),
            })
    }

    /// Look up and invoke a handler: validation hook first, then the call.
    pub fn dispatch(&self, handler: &HandlerRef, parameters: &ValueMap) -> Result<ValueMap> {
        let capability = self.get(handler)?;
        capability.validate(parameters)?;
        Ok(capability.call(parameters)?)
    }

    fn table(&self, kind: HandlerKind) -> &HashMap<String, Box<dyn Handler>> {
        match kind {
            HandlerKind::Agent => &self.agents,
            HandlerKind::Action => &self.actions,
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
