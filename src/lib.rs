//! Labelflow - workflow orchestration for data-labeling pipelines.
//!
//! A workflow is a list of named steps with explicit dependencies. Each
//! step invokes an *agent* (a pluggable capability that inspects, labels,
//! or validates data) or an *action* (built-in data exchange with the
//! labeling platform). The engine resolves a deterministic execution
//! order, expands `{{ reference }}` placeholders in step parameters
//! against upstream outputs, dispatches each step, and assembles a
//! results map.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`error`] - Error types and result aliases
//! - [`handlers`] - Handler registry, dispatch, and built-in actions
//! - [`runner`] - Execution engine and dependency graph
//! - [`template`] - Placeholder parsing and parameter resolution
//! - [`workflow`] - Workflow schema, loading, and validation
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use labelflow::handlers::HandlerRegistry;
//! use labelflow::runner::{run_workflow, RunOptions};
//! use labelflow::workflow::{parse_workflow, ValueMap};
//!
//! let workflow = parse_workflow(
//!     r#"
//!     name: count
//!     steps:
//!       - name: sample
//!         agent: counter
//!         parameters:
//!           count: 3
//!     "#,
//!     true,
//! )
//! .unwrap();
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register_agent("counter", |params: &ValueMap| -> anyhow::Result<ValueMap> {
//!     let mut output = ValueMap::new();
//!     output.insert("count".to_string(), params["count"].clone());
//!     Ok(output)
//! });
//!
//! let result = run_workflow(
//!     &workflow,
//!     &HashMap::new(),
//!     &registry,
//!     &RunOptions::default(),
//! )
//! .unwrap();
//! assert!(result.success);
//! assert_eq!(result.step("sample").unwrap().output["count"], 3);
//! ```

pub mod cli;
pub mod error;
pub mod handlers;
pub mod runner;
pub mod template;
pub mod workflow;

pub use error::{LabelflowError, Result};
