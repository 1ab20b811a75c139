//! Workflow execution engine.
//!
//! Walks the execution plan produced by the dependency graph, resolves
//! each step's parameters against {global parameters, environment,
//! completed outputs}, dispatches to the step's handler, and accumulates
//! a results map keyed by step name.
//!
//! Per-step errors (unresolved references, handler failures) mark the
//! step failed and propagate skips to its transitive dependents; they
//! never raise out of [`WorkflowRunner::run`]. Only pre-flight validation
//! failures do.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::handlers::HandlerRegistry;
use crate::template::{resolve_parameters, StepOutput, TemplateContext};
use crate::workflow::schema::{StepSpec, ValueMap, WorkflowDefinition};
use crate::workflow::validator::preflight;

/// Terminal status of a step within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Handler returned normally (or the step passed dry-run resolution).
    Success,
    /// Parameter resolution or the handler failed.
    Failed,
    /// Not invoked because a (transitive) dependency failed, or the run
    /// was aborted by an earlier failure.
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// What went wrong in a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    /// A template placeholder could not be resolved; the handler was
    /// never dispatched.
    UnresolvedReference,
    /// The handler (or its validation hook) reported a failure.
    HandlerFailed,
}

/// Structured error recorded on a failed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepError {
    pub kind: StepErrorKind,
    pub message: String,
}

/// Result of one step, immutable once recorded.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Step name.
    pub name: String,
    /// Terminal status.
    pub status: StepStatus,
    /// Handler output, opaque to the engine. Empty unless `status` is
    /// `Success`.
    pub output: ValueMap,
    /// Present iff `status` is `Failed`.
    pub error: Option<StepError>,
    /// Time spent resolving and dispatching the step.
    #[serde(skip)]
    pub duration: Duration,
}

impl StepResult {
    fn success(name: &str, output: ValueMap, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Success,
            output,
            error: None,
            duration,
        }
    }

    fn failure(name: &str, kind: StepErrorKind, message: String, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Failed,
            output: ValueMap::new(),
            error: Some(StepError { kind, message }),
            duration,
        }
    }

    fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Skipped,
            output: ValueMap::new(),
            error: None,
            duration: Duration::ZERO,
        }
    }
}

/// What happens to the rest of the plan when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Skip the failed step's transitive dependents; independent steps
    /// continue to execute.
    #[default]
    SkipDependents,
    /// Skip every not-yet-started step after the first failure.
    AbortRun,
}

/// Options for running a workflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Resolve every step's data flow without invoking any handler.
    pub dry_run: bool,
    /// Failure propagation rule.
    pub failure_policy: FailurePolicy,
}

/// Aggregate result of one `run()` invocation.
#[derive(Debug)]
pub struct RunResult {
    /// Workflow name.
    pub workflow: String,
    /// Per-step results, keyed by step name.
    pub results: HashMap<String, StepResult>,
    /// The execution plan that was followed.
    pub order: Vec<String>,
    /// Total run duration.
    pub duration: Duration,
    /// True iff no step failed.
    pub success: bool,
}

impl RunResult {
    /// Look up one step's result.
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.results.get(name)
    }

    /// Step results in plan order.
    pub fn in_order(&self) -> impl Iterator<Item = &StepResult> {
        self.order.iter().filter_map(|name| self.results.get(name))
    }
}

/// Run a workflow against an environment snapshot and handler registry.
///
/// This is the sole entry point for external callers. Raises only for
/// pre-flight validation failures; any workflow that passes pre-flight
/// yields a [`RunResult`].
pub fn run_workflow(
    workflow: &WorkflowDefinition,
    environment: &HashMap<String, String>,
    registry: &HandlerRegistry,
    options: &RunOptions,
) -> Result<RunResult> {
    WorkflowRunner::new(workflow, registry).run(environment, options)
}

/// Orchestrates the execution of one workflow.
pub struct WorkflowRunner<'a> {
    workflow: &'a WorkflowDefinition,
    registry: &'a HandlerRegistry,
}

impl<'a> WorkflowRunner<'a> {
    /// Create a runner for the given workflow and registry.
    pub fn new(workflow: &'a WorkflowDefinition, registry: &'a HandlerRegistry) -> Self {
        Self { workflow, registry }
    }

    /// Execute the workflow.
    pub fn run(
        &self,
        environment: &HashMap<String, String>,
        options: &RunOptions,
    ) -> Result<RunResult> {
        let start = Instant::now();

        let graph = preflight(self.workflow, self.registry)?;
        let plan = graph.execution_order()?;

        info!(
            workflow = %self.workflow.name,
            steps = plan.len(),
            dry_run = options.dry_run,
            "Starting workflow"
        );

        let mut results: HashMap<String, StepResult> = HashMap::with_capacity(plan.len());
        // Completed outputs, exposed to later steps' template resolution.
        let mut outputs: HashMap<String, StepOutput> = HashMap::new();
        // Steps whose dependents must be skipped: failed steps plus the
        // skips they propagated.
        let mut blocked: HashSet<String> = HashSet::new();
        let mut any_failed = false;

        for step_name in &plan {
            // The plan only contains names from the validated graph.
            let step = self
                .workflow
                .step(step_name)
                .expect("plan step missing from workflow");

            let abort = any_failed && options.failure_policy == FailurePolicy::AbortRun;
            let dependency_blocked = step.depends_on.iter().any(|dep| blocked.contains(dep));

            if abort || dependency_blocked {
                debug!(step = %step_name, "Skipping step");
                blocked.insert(step_name.clone());
                results.insert(step_name.clone(), StepResult::skipped(step_name));
                continue;
            }

            let result = self.execute_step(step, environment, &outputs, options);

            match result.status {
                StepStatus::Success => {
                    info!(step = %step_name, "Step completed");
                    let output = if options.dry_run {
                        StepOutput::Placeholder
                    } else {
                        StepOutput::Real(result.output.clone())
                    };
                    outputs.insert(step_name.clone(), output);
                }
                StepStatus::Failed => {
                    let detail = result.error.as_ref().map(|e| e.message.as_str());
                    warn!(step = %step_name, error = detail, "Step failed");
                    blocked.insert(step_name.clone());
                    any_failed = true;
                }
                StepStatus::Skipped => unreachable!("execute_step never skips"),
            }

            results.insert(step_name.clone(), result);
        }

        let success = !any_failed;
        info!(
            workflow = %self.workflow.name,
            success,
            "Workflow finished"
        );

        Ok(RunResult {
            workflow: self.workflow.name.clone(),
            results,
            order: plan,
            duration: start.elapsed(),
            success,
        })
    }

    /// Resolve one step's parameters and dispatch it.
    fn execute_step(
        &self,
        step: &StepSpec,
        environment: &HashMap<String, String>,
        outputs: &HashMap<String, StepOutput>,
        options: &RunOptions,
    ) -> StepResult {
        let step_start = Instant::now();

        let context = TemplateContext {
            globals: &self.workflow.parameters,
            env: environment,
            steps: outputs,
        };

        let parameters = match resolve_parameters(&step.parameters, &context) {
            Ok(parameters) => parameters,
            Err(e) => {
                return StepResult::failure(
                    &step.name,
                    StepErrorKind::UnresolvedReference,
                    e.to_string(),
                    step_start.elapsed(),
                );
            }
        };

        if options.dry_run {
            let mut output = ValueMap::new();
            output.insert("dry_run".to_string(), json!(true));
            output.insert("handler".to_string(), json!(step.handler.to_string()));
            return StepResult::success(&step.name, output, step_start.elapsed());
        }

        debug!(step = %step.name, handler = %step.handler, "Dispatching step");
        match self.registry.dispatch(&step.handler, &parameters) {
            Ok(output) => StepResult::success(&step.name, output, step_start.elapsed()),
            Err(e) => {
                let error = crate::error::LabelflowError::HandlerFailed {
                    step: step.name.clone(),
                    handler: step.handler.name.clone(),
                    message: e.to_string(),
                };
                StepResult::failure(
                    &step.name,
                    StepErrorKind::HandlerFailed,
                    error.to_string(),
                    step_start.elapsed(),
                )
            }
        }
    }
}
