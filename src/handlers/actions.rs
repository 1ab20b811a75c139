//! Built-in platform actions.
//!
//! `push_to_labellerr` uploads pre-annotations to a Labellerr project and
//! `pull_from_labellerr` exports annotations from one. Both are thin
//! handlers over the [`LabellerrClient`] trait; the real SDK/HTTP client
//! (authentication, upload, export polling) lives outside this crate.

use std::sync::Arc;

use anyhow::{bail, Context};
use serde_json::{json, Value};
use tracing::info;

use crate::handlers::{Handler, HandlerRegistry};
use crate::workflow::schema::ValueMap;

/// Registry name of the push action.
pub const PUSH_ACTION: &str = "push_to_labellerr";

/// Registry name of the pull action.
pub const PULL_ACTION: &str = "pull_from_labellerr";

/// Annotation format used when a push step does not declare one.
pub const DEFAULT_ANNOTATION_FORMAT: &str = "coco_json";

/// Boundary to the Labellerr platform.
///
/// Implementations wrap the platform SDK; tests use an in-memory fake.
pub trait LabellerrClient: Send + Sync {
    /// Upload pre-annotations to a project. Returns the platform's
    /// confirmation payload (upload/export identifiers and the like).
    fn push_preannotations(
        &self,
        project_id: &str,
        annotation_format: &str,
        annotation_file: Option<&str>,
    ) -> anyhow::Result<Value>;

    /// Create an annotation export for a project and return its payload
    /// (or a reference to it).
    fn pull_annotations(&self, project_id: &str, export_config: &ValueMap)
        -> anyhow::Result<Value>;
}

/// Register both built-in actions against the given client.
pub fn register_labellerr_actions(registry: &mut HandlerRegistry, client: Arc<dyn LabellerrClient>) {
    registry.register_action(PUSH_ACTION, PushToLabellerr::new(Arc::clone(&client)));
    registry.register_action(PULL_ACTION, PullFromLabellerr::new(client));
}

fn require_project_id(parameters: &ValueMap) -> anyhow::Result<&str> {
    parameters
        .get("project_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .context("'project_id' parameter is required and must be a non-empty string")
}

/// Push pre-annotations to a Labellerr project.
pub struct PushToLabellerr {
    client: Arc<dyn LabellerrClient>,
}

impl PushToLabellerr {
    pub fn new(client: Arc<dyn LabellerrClient>) -> Self {
        Self { client }
    }
}

impl Handler for PushToLabellerr {
    fn validate(&self, parameters: &ValueMap) -> anyhow::Result<()> {
        require_project_id(parameters)?;
        if let Some(format) = parameters.get("format") {
            if !format.is_string() {
                bail!("'format' parameter must be a string");
            }
        }
        Ok(())
    }

    fn call(&self, parameters: &ValueMap) -> anyhow::Result<ValueMap> {
        let project_id = require_project_id(parameters)?;
        let format = parameters
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_ANNOTATION_FORMAT);
        let annotation_file = parameters.get("annotation_file").and_then(Value::as_str);

        info!(project_id, format, "Pushing pre-annotations to Labellerr");
        let confirmation = self
            .client
            .push_preannotations(project_id, format, annotation_file)?;

        let mut output = serde_json::Map::new();
        output.insert("status".to_string(), json!("pushed"));
        output.insert("project_id".to_string(), json!(project_id));
        output.insert("format".to_string(), json!(format));
        output.insert("confirmation".to_string(), confirmation);
        Ok(output)
    }
}

/// Pull annotations from a Labellerr project.
pub struct PullFromLabellerr {
    client: Arc<dyn LabellerrClient>,
}

impl PullFromLabellerr {
    pub fn new(client: Arc<dyn LabellerrClient>) -> Self {
        Self { client }
    }

    /// Export configuration sent to the platform, with per-step overrides
    /// for `export_format` and `statuses`.
    fn export_config(&self, project_id: &str, parameters: &ValueMap) -> ValueMap {
        let mut config = serde_json::Map::new();
        config.insert(
            "export_name".to_string(),
            json!(format!("labelflow_export_{}", project_id)),
        );
        config.insert(
            "export_format".to_string(),
            parameters
                .get("export_format")
                .cloned()
                .unwrap_or_else(|| json!("json")),
        );
        config.insert(
            "statuses".to_string(),
            parameters
                .get("statuses")
                .cloned()
                .unwrap_or_else(|| json!(["accepted"])),
        );
        config
    }
}

impl Handler for PullFromLabellerr {
    fn validate(&self, parameters: &ValueMap) -> anyhow::Result<()> {
        require_project_id(parameters)?;
        Ok(())
    }

    fn call(&self, parameters: &ValueMap) -> anyhow::Result<ValueMap> {
        let project_id = require_project_id(parameters)?;
        let config = self.export_config(project_id, parameters);

        info!(project_id, "Pulling annotations from Labellerr");
        let export = self.client.pull_annotations(project_id, &config)?;

        let mut output = serde_json::Map::new();
        output.insert("status".to_string(), json!("pulled"));
        output.insert("project_id".to_string(), json!(project_id));
        output.insert("export".to_string(), export);
        Ok(output)
    }
}
