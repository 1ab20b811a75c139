//! Pre-flight workflow validation.
//!
//! Statically detectable problems (duplicate step names, unknown
//! dependencies, cycles, handlers missing from the registry) abort a run
//! before any step executes, rather than failing midway.

use tracing::debug;

use crate::error::{LabelflowError, Result};
use crate::handlers::HandlerRegistry;
use crate::runner::graph::DependencyGraph;
use crate::workflow::schema::WorkflowDefinition;

/// Validate a workflow against a handler registry.
///
/// Returns the dependency graph so the engine does not rebuild it.
pub fn preflight(
    workflow: &WorkflowDefinition,
    registry: &HandlerRegistry,
) -> Result<DependencyGraph> {
    if workflow.name.trim().is_empty() {
        return Err(LabelflowError::WorkflowValidation {
            message: "workflow name must not be empty".to_string(),
        });
    }

    // Rejects duplicate step names and unknown dependencies.
    let graph = DependencyGraph::from_steps(&workflow.steps)?;

    if let Some(cycle) = graph.find_cycle() {
        return Err(LabelflowError::CircularDependency {
            cycle: cycle.join(" -> "),
        });
    }

    for step in &workflow.steps {
        if !registry.contains(&step.handler) {
            return Err(LabelflowError::UnknownHandler {
                kind: step.handler.kind.to_string(),
                name: step.handler.name.clone(),
            });
        }
    }

    debug!(workflow = %workflow.name, steps = workflow.steps.len(), "Pre-flight validation passed");
    Ok(graph)
}
