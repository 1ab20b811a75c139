//! Workflow file loading.
//!
//! Loads a [`WorkflowDefinition`] from a YAML or JSON file. The format is
//! chosen by extension: `.yaml`/`.yml` parse as YAML, everything else as
//! JSON.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{LabelflowError, Result};
use crate::workflow::schema::WorkflowDefinition;

/// Load a workflow definition from a file.
pub fn load_workflow(path: &Path) -> Result<WorkflowDefinition> {
    if !path.exists() {
        return Err(LabelflowError::WorkflowNotFound {
            path: path.to_path_buf(),
        });
    }

    let contents = fs::read_to_string(path)?;
    let workflow = parse_workflow(&contents, is_yaml(path)).map_err(|message| {
        LabelflowError::WorkflowParse {
            path: path.to_path_buf(),
            message,
        }
    })?;

    info!(workflow = %workflow.name, steps = workflow.steps.len(), "Loaded workflow");
    Ok(workflow)
}

/// Parse workflow contents as YAML or JSON.
pub fn parse_workflow(contents: &str, yaml: bool) -> std::result::Result<WorkflowDefinition, String> {
    if yaml {
        serde_yaml::from_str(contents).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(contents).map_err(|e| e.to_string())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
