//! Command-line interface.
//!
//! The CLI drives workflow validation and dry runs against workflow
//! files. Real execution needs concrete agent capabilities and a
//! configured platform client, which are supplied by applications
//! embedding labelflow as a library; the CLI therefore builds a stub
//! registry that satisfies pre-flight handler lookup but is never
//! invoked.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::{LabelflowError, Result};
use crate::handlers::HandlerRegistry;
use crate::runner::{run_workflow, DependencyGraph, RunOptions, RunResult, StepStatus};
use crate::workflow::schema::{ValueMap, WorkflowDefinition};
use crate::workflow::{load_workflow, preflight};

/// Labelflow - workflow orchestration for data-labeling pipelines.
#[derive(Debug, Parser)]
#[command(name = "labelflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a workflow (dry-run resolves data flow without invoking handlers)
    Run(RunArgs),

    /// Validate a workflow file without executing it
    Validate(ValidateArgs),

    /// Print the deterministic execution plan for a workflow
    Plan(PlanArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Path to the workflow file (YAML or JSON)
    pub workflow: PathBuf,

    /// Resolve data flow for every step without invoking any handler
    #[arg(long)]
    pub dry_run: bool,

    /// Failure policy: skip_dependents or abort
    #[arg(long, default_value = "skip_dependents")]
    pub failure_policy: String,
}

/// Arguments for the `validate` command.
#[derive(Debug, clap::Args)]
pub struct ValidateArgs {
    /// Path to the workflow file (YAML or JSON)
    pub workflow: PathBuf,
}

/// Arguments for the `plan` command.
#[derive(Debug, clap::Args)]
pub struct PlanArgs {
    /// Path to the workflow file (YAML or JSON)
    pub workflow: PathBuf,
}

/// Dispatch a parsed command line. Returns the process exit code.
pub fn dispatch(cli: &Cli) -> i32 {
    let outcome = match &cli.command {
        Commands::Run(args) => run_command(args),
        Commands::Validate(args) => validate_command(args),
        Commands::Plan(args) => plan_command(args),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn run_command(args: &RunArgs) -> Result<i32> {
    if !args.dry_run {
        return Err(LabelflowError::WorkflowValidation {
            message: "real execution requires an embedding application that supplies \
                      agent capabilities and a platform client; use --dry-run to \
                      validate data flow"
                .to_string(),
        });
    }

    let workflow = load_workflow(&args.workflow)?;
    let registry = stub_registry(&workflow);
    let environment: HashMap<String, String> = std::env::vars().collect();

    let options = RunOptions {
        dry_run: true,
        failure_policy: parse_failure_policy(&args.failure_policy)?,
    };

    let result = run_workflow(&workflow, &environment, &registry, &options)?;
    print_run_result(&result);

    Ok(if result.success { 0 } else { 1 })
}

fn validate_command(args: &ValidateArgs) -> Result<i32> {
    let workflow = load_workflow(&args.workflow)?;
    let registry = stub_registry(&workflow);
    preflight(&workflow, &registry)?;

    println!(
        "Workflow '{}' is valid ({} steps)",
        workflow.name,
        workflow.steps.len()
    );
    Ok(0)
}

fn plan_command(args: &PlanArgs) -> Result<i32> {
    let workflow = load_workflow(&args.workflow)?;
    let graph = DependencyGraph::from_steps(&workflow.steps)?;
    let plan = graph.execution_order()?;

    for (index, name) in plan.iter().enumerate() {
        let step = workflow.step(name).expect("plan step missing from workflow");
        println!("{}. {} ({})", index + 1, name, step.handler);
    }
    Ok(0)
}

fn parse_failure_policy(value: &str) -> Result<crate::runner::FailurePolicy> {
    match value {
        "skip_dependents" => Ok(crate::runner::FailurePolicy::SkipDependents),
        "abort" => Ok(crate::runner::FailurePolicy::AbortRun),
        other => Err(LabelflowError::WorkflowValidation {
            message: format!(
                "unknown failure policy '{}' (expected 'skip_dependents' or 'abort')",
                other
            ),
        }),
    }
}

/// Registry with a stand-in for every handler the workflow declares.
///
/// Satisfies pre-flight lookup; dry-run never invokes the stand-ins.
fn stub_registry(workflow: &WorkflowDefinition) -> HandlerRegistry {
    fn never_called(_: &ValueMap) -> anyhow::Result<ValueMap> {
        anyhow::bail!("stub handler invoked outside dry-run")
    }

    let mut registry = HandlerRegistry::new();
    for step in &workflow.steps {
        match step.handler.kind {
            crate::workflow::HandlerKind::Agent => {
                registry.register_agent(step.handler.name.clone(), never_called)
            }
            crate::workflow::HandlerKind::Action => {
                registry.register_action(step.handler.name.clone(), never_called)
            }
        }
    }
    registry
}

fn print_run_result(result: &RunResult) {
    for step in result.in_order() {
        let marker = match step.status {
            StepStatus::Success => "ok",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "skipped",
        };
        match &step.error {
            Some(error) => println!("{:<8} {} - {}", marker, step.name, error.message),
            None => println!("{:<8} {}", marker, step.name),
        }
    }
    println!(
        "Workflow '{}' {}",
        result.workflow,
        if result.success { "succeeded" } else { "failed" }
    );
}
