//! Input Resolver (spec section 4.2, "Input Resolver").
//!
//! Merges a tool step's literal `tool_state` values with its resolved
//! `input_connections`, then hands the flattened result to the value
//! expander to build the nested `Value::Map` a tool's `render_cmdline` sees.

use gwftool_core::{expand, FlatMap, GwfError, Result, Value, WorkflowStep};

use crate::state::{StepResult, WorkflowState};

/// Resolves the fully-expanded input tree for `step`, reading upstream
/// results from `state`.
pub fn resolve_inputs(step: &WorkflowStep, state: &WorkflowState) -> Result<Value> {
    let mut flat: FlatMap = FlatMap::new();

    for (key, literal) in &step.tool_state {
        if !literal.is_null() {
            flat.insert(key.clone(), Value::from(literal.clone()));
        }
    }

    for (key, conn) in &step.input_connections {
        let upstream = state.require_result(&conn.id)?;
        let value = match upstream {
            StepResult::DataInput(input) => match input {
                gwftool_core::WorkflowInput::String(s) => Value::String(s.clone()),
                gwftool_core::WorkflowInput::Number(n) => Value::Number(n.clone()),
                gwftool_core::WorkflowInput::Bool(b) => Value::Bool(*b),
                gwftool_core::WorkflowInput::File(f) => Value::File(f.clone()),
            },
            StepResult::Outputs(_) => {
                let file = upstream.get_output(&conn.output_name).ok_or_else(|| {
                    GwfError::InternalError {
                        message: format!(
                            "step '{}' has no output named '{}'",
                            conn.id, conn.output_name
                        ),
                    }
                })?;
                Value::File(file)
            }
        };
        flat.insert(key.clone(), value);
    }

    let expanded = expand(&flat);
    Ok(Value::Map(expanded))
}
