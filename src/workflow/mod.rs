//! Workflow loading, schema, and pre-flight validation.
//!
//! - Schema definitions in [`schema`]
//! - File loading in [`loader`]
//! - Pre-flight validation in [`validator`]

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::{load_workflow, parse_workflow};
pub use schema::{HandlerKind, HandlerRef, StepSpec, ValueMap, WorkflowDefinition};
pub use validator::preflight;
