//! Step Graph Builder (spec section 4.2).
//!
//! Validates a workflow document against a toolbox and the supplied inputs,
//! then seeds a `WorkflowState` with the `data_input` results and the
//! pending/done bookkeeping the driver loop needs. No DAG structure is
//! materialized beyond the workflow document itself: readiness is computed
//! on demand from `input_connections`, following the original engine's
//! "ready steps" scan rather than a separate graph type.

use std::path::PathBuf;

use gwftool_core::{GwfError, Result, StepType, ToolBox, Workflow, WorkflowInputs};

use crate::state::{StepResult, StepState, WorkflowState};

/// Validates `workflow` against `toolbox` and `workflow_inputs`, returning a
/// seeded `WorkflowState` on success.
///
/// Errors:
/// - `MissingInputs` if any `data_input` step's label is absent from
///   `workflow_inputs`, or any tool step declares an input with no matching
///   `input_connections` entry and no literal value in `tool_state`.
/// - `UnknownTool` if a tool step's `tool_id` is not present in `toolbox`.
pub fn build(
    workflow: &dyn Workflow,
    workflow_inputs: &WorkflowInputs,
    toolbox: &dyn ToolBox,
    workdir: PathBuf,
    outdir: PathBuf,
) -> Result<WorkflowState> {
    let mut missing = WorkflowState::missing_inputs(workflow, workflow_inputs);

    for step in workflow.tool_steps() {
        let Some(tool_id) = &step.tool_id else {
            return Err(GwfError::InternalError {
                message: format!("tool step '{}' has no tool_id", step.step_id),
            });
        };
        if !toolbox.contains(tool_id) {
            return Err(GwfError::UnknownTool {
                tool_id: tool_id.clone(),
            });
        }

        for declared in &step.inputs {
            let has_connection = step.input_connections.contains_key(&declared.name);
            let has_literal = step.tool_state.get(&declared.name).is_some_and(|v| !v.is_null());
            if !has_connection && !has_literal {
                missing.push(format!("{}.{}", step.step_id, declared.name));
            }
            if !workflow_inputs.contains_key(&declared.name) {
                missing.push(format!("{}.{}", step.step_id, declared.name));
            }
        }
    }

    missing.sort();
    missing.dedup();
    if !missing.is_empty() {
        return Err(GwfError::MissingInputs { names: missing });
    }

    let mut state = WorkflowState::new(workdir, outdir);

    for step in workflow.steps() {
        match step.step_type {
            StepType::DataInput => {
                let value = workflow_inputs
                    .get(&step.label)
                    .expect("presence validated above")
                    .clone();
                state
                    .results
                    .insert(step.step_id.clone(), StepResult::DataInput(value));
                state.states.insert(step.step_id.clone(), StepState::Done);
            }
            StepType::Tool => {
                state
                    .states
                    .insert(step.step_id.clone(), StepState::Pending);
            }
        }
    }

    Ok(state)
}
