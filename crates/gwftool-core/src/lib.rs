//! Read-side data model the workflow execution engine is built on: the
//! value expander, the `Tool`/`ToolBox` and `Workflow`/`WorkflowStep`
//! interface shims, and the shared error taxonomy.

pub mod error;
pub mod tool;
pub mod value;
pub mod workflow;

pub use error::{GwfError, Result};
pub use tool::{SimpleTool, Tool, ToolBox, ToolOutputSpec, InMemoryToolBox};
pub use value::{expand, FileClass, FileRef, FlatMap, Value};
pub use workflow::{
    DeclaredInput, InputConnection, StepType, Workflow, WorkflowDocument, WorkflowInput,
    WorkflowInputs, WorkflowStep,
};
