//! Read-side contract the engine needs from the workflow document (spec
//! section 3, "WorkflowStep", and section 6, "Workflow document dependency").
//!
//! Full Galaxy `.ga` JSON parsing (UUIDs, annotations, post-job actions,
//! validation of the broader Galaxy schema) is an external collaborator; this
//! module implements exactly the fields the engine relies on, following the
//! original `GalaxyWorkflow`/`WorkflowStep` shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::FileRef;

/// An entry in the user-supplied inputs map (spec section 3, "WorkflowInput").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowInput {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    File(FileRef),
}

impl WorkflowInput {
    /// Every `File.path` must be absolute by the time the core receives it.
    pub fn validate_absolute_paths(&self) -> Result<(), String> {
        if let WorkflowInput::File(f) = self {
            if !std::path::Path::new(&f.path).is_absolute() {
                return Err(format!("File input path is not absolute: {}", f.path));
            }
        }
        Ok(())
    }
}

pub type WorkflowInputs = BTreeMap<String, WorkflowInput>;

/// One of the two step kinds the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    DataInput,
    Tool,
}

/// `{id: upstream_step_id, output_name: string}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConnection {
    pub id: String,
    #[serde(default)]
    pub output_name: String,
}

/// `{name: string, ...}` — only the name is relied upon by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredInput {
    pub name: String,
}

/// One node in the workflow DAG, as the engine needs to see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step_id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub tool_id: Option<String>,
    #[serde(default)]
    pub tool_state: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub inputs: Vec<DeclaredInput>,
    #[serde(default)]
    pub input_connections: BTreeMap<String, InputConnection>,
}

/// Read interface the engine needs from the workflow document.
pub trait Workflow {
    fn steps(&self) -> Vec<&WorkflowStep>;
    fn tool_steps(&self) -> Vec<&WorkflowStep> {
        self.steps()
            .into_iter()
            .filter(|s| s.step_type == StepType::Tool)
            .collect()
    }
    fn get_step(&self, step_id: &str) -> Option<&WorkflowStep>;
}

/// A workflow document backed by the Galaxy `.ga` JSON structure:
/// `{"steps": {"<id>": {...}}}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowDocument {
    steps: BTreeMap<String, WorkflowStep>,
}

impl WorkflowDocument {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn new(steps: BTreeMap<String, WorkflowStep>) -> Self {
        Self { steps }
    }
}

impl Workflow for WorkflowDocument {
    fn steps(&self) -> Vec<&WorkflowStep> {
        self.steps.values().collect()
    }

    fn get_step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.get(step_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_ga_document() {
        let json = r#"
        {
            "steps": {
                "0": {
                    "step_id": "0",
                    "type": "data_input",
                    "label": "in"
                },
                "1": {
                    "step_id": "1",
                    "type": "tool",
                    "tool_id": "cat1",
                    "inputs": [{"name": "src"}],
                    "input_connections": {
                        "src": {"id": "0", "output_name": ""}
                    }
                }
            }
        }
        "#;
        let doc = WorkflowDocument::from_json(json).unwrap();
        assert_eq!(doc.steps().len(), 2);
        assert_eq!(doc.tool_steps().len(), 1);
        assert_eq!(doc.get_step("1").unwrap().tool_id.as_deref(), Some("cat1"));
    }
}
