//! Error types for labelflow operations.
//!
//! This module defines [`LabelflowError`], the primary error type used
//! throughout the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Workflow-level validation errors (cycles, unknown dependencies, unknown
//!   handlers) are detected pre-flight and raised out of `run()` before any
//!   step executes.
//! - Per-step errors (unresolved references, handler failures) never raise
//!   out of `run()`; they mark the step failed inside the run result.
//! - Use `anyhow::Error` (via `LabelflowError::Other`) for unexpected errors.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for labelflow operations.
#[derive(Debug, Error)]
pub enum LabelflowError {
    /// Workflow file not found at expected location.
    #[error("Workflow file not found: {path}")]
    WorkflowNotFound { path: PathBuf },

    /// Failed to parse a workflow file.
    #[error("Failed to parse workflow at {path}: {message}")]
    WorkflowParse { path: PathBuf, message: String },

    /// Invalid workflow structure or values.
    #[error("Invalid workflow: {message}")]
    WorkflowValidation { message: String },

    /// Step dependency cycle detected.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// A step depends on a step that does not exist in the workflow.
    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    /// A template placeholder could not be resolved.
    #[error("Unresolved reference '{{{{ {reference} }}}}': {message}")]
    UnresolvedReference { reference: String, message: String },

    /// No handler registered for the given kind and name.
    #[error("Unknown {kind} handler: {name}")]
    UnknownHandler { kind: String, name: String },

    /// A handler invocation failed, carrying the handler's own detail.
    #[error("Handler '{handler}' failed in step '{step}': {message}")]
    HandlerFailed {
        step: String,
        handler: String,
        message: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for labelflow operations.
pub type Result<T> = std::result::Result<T, LabelflowError>;
