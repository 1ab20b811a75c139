//! Step execution orchestration and dependency management.

pub mod engine;
pub mod graph;

pub use engine::{
    run_workflow, FailurePolicy, RunOptions, RunResult, StepError, StepErrorKind, StepResult,
    StepStatus, WorkflowRunner,
};
pub use graph::DependencyGraph;
