//! Error taxonomy for the workflow engine (spec section 7).

use thiserror::Error;

/// All errors the engine and its collaborators can raise.
#[derive(Debug, Error)]
pub enum GwfError {
    /// A workflow declares inputs that are absent from the supplied inputs document.
    #[error("missing workflow inputs: {names:?}")]
    MissingInputs { names: Vec<String> },

    /// A tool step references a `tool_id` the toolbox does not know about.
    #[error("unknown tool '{tool_id}'")]
    UnknownTool { tool_id: String },

    /// The command-line template engine failed to render a step's script.
    #[error("failed to render command line for step {step_id}: {message}")]
    RenderError { step_id: String, message: String },

    /// A runner could not be started (subprocess spawn failure, non-2xx TES submission, ...).
    #[error("failed to start runner for step {step_id}: {message}")]
    RunnerStartFailure { step_id: String, message: String },

    /// A scheduler invariant was violated, e.g. resolving a result that was never recorded.
    #[error("internal scheduler error: {message}")]
    InternalError { message: String },

    /// I/O failure reading or writing workflow-managed files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure serializing or deserializing a job report or task payload.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GwfError>;
