//! Read-side contract the engine needs from tool descriptors (spec section 3,
//! "Tool", and section 4.2).
//!
//! Parsing Galaxy tool XML/YAML into these objects is an external collaborator
//! (see spec section 1, Out of scope); this module only defines the shape the
//! engine consumes and a trivial in-memory registry for assembling a toolbox
//! from already-constructed `Tool` objects.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::GwfError;
use crate::value::{FileRef, Value};

/// A single declared output of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutputSpec {
    pub name: String,
    /// Relative path inside the container that must be relocated to the
    /// declared destination after the job ends, if set.
    pub from_work_dir: Option<String>,
}

/// Read interface the engine needs from a resolved tool descriptor.
pub trait Tool: Send + Sync {
    fn tool_id(&self) -> &str;

    /// Absolute directory bind-mounted read-only into the container.
    fn tool_dir(&self) -> &Path;

    fn get_outputs(&self) -> &BTreeMap<String, ToolOutputSpec>;

    fn get_docker_image(&self) -> &str;

    /// Render the tool's command template against the merged input/output
    /// environment, producing a shell script body. The template engine
    /// itself is an external collaborator; implementations only need to
    /// resolve `$name` style lookups against `inputs` and substitute output
    /// descriptors with their declared relative name.
    fn render_cmdline(
        &self,
        inputs: &Value,
        outputs: &BTreeMap<String, FileRef>,
    ) -> Result<String, GwfError>;
}

/// Read interface the engine needs from a tool registry.
pub trait ToolBox: Send + Sync {
    fn get(&self, tool_id: &str) -> Option<&dyn Tool>;

    fn contains(&self, tool_id: &str) -> bool {
        self.get(tool_id).is_some()
    }
}

/// A toolbox backed by an in-memory map of already-resolved `Tool` objects.
///
/// Mirrors the Python `ToolBox` in the original source, which is itself just
/// a dict keyed by `tool_id` populated by scanning tool directories; that
/// scan is the external collaborator, this struct is the resulting registry.
#[derive(Default)]
pub struct InMemoryToolBox {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl InMemoryToolBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.tool_id().to_string(), tool);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolBox for InMemoryToolBox {
    fn get(&self, tool_id: &str) -> Option<&dyn Tool> {
        self.tools.get(tool_id).map(|b| b.as_ref())
    }
}

/// A minimal, self-contained `Tool` implementation useful for tests, demos,
/// and dry-run fixtures: the command template is a literal string with
/// `$name` substitutions rather than the real Cheetah-style Galaxy template
/// language, which lives outside this crate's scope.
pub struct SimpleTool {
    pub tool_id: String,
    pub tool_dir: PathBuf,
    pub docker_image: String,
    pub outputs: BTreeMap<String, ToolOutputSpec>,
    pub command_template: String,
}

impl Tool for SimpleTool {
    fn tool_id(&self) -> &str {
        &self.tool_id
    }

    fn tool_dir(&self) -> &Path {
        &self.tool_dir
    }

    fn get_outputs(&self) -> &BTreeMap<String, ToolOutputSpec> {
        &self.outputs
    }

    fn get_docker_image(&self) -> &str {
        &self.docker_image
    }

    fn render_cmdline(
        &self,
        inputs: &Value,
        outputs: &BTreeMap<String, FileRef>,
    ) -> Result<String, GwfError> {
        let mut rendered = self.command_template.clone();

        if let Value::Map(map) = inputs {
            substitute_map(&mut rendered, "", map);
        }
        for (name, file) in outputs {
            rendered = rendered.replace(&format!("${}", name), &file.path);
        }

        Ok(rendered)
    }
}

fn substitute_map(rendered: &mut String, prefix: &str, map: &BTreeMap<String, Value>) {
    for (key, value) in map {
        let qualified = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::File(f) => {
                *rendered = rendered.replace(&format!("${qualified}"), &f.path);
            }
            Value::ToolOutput { name } => {
                *rendered = rendered.replace(&format!("${qualified}"), name);
            }
            Value::String(s) => {
                *rendered = rendered.replace(&format!("${qualified}"), s);
            }
            Value::Number(n) => {
                *rendered = rendered.replace(&format!("${qualified}"), &n.to_string());
            }
            Value::Bool(b) => {
                *rendered = rendered.replace(&format!("${qualified}"), &b.to_string());
            }
            Value::Map(nested) => substitute_map(rendered, &qualified, nested),
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .map(value_to_display)
                    .collect::<Vec<_>>()
                    .join(",");
                *rendered = rendered.replace(&format!("${qualified}"), &joined);
            }
            Value::Null => {}
        }
    }
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::File(f) => f.path.clone(),
        Value::ToolOutput { name } => name.clone(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items.iter().map(value_to_display).collect::<Vec<_>>().join(","),
        Value::Map(_) | Value::Null => String::new(),
    }
}
