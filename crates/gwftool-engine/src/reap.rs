//! Reap (spec section 4.4).
//!
//! Once a runner reports its job finished, the reaper relocates any
//! `from_work_dir` outputs, writes the per-step job report, and records the
//! step's outputs in the workflow state. A non-zero exit code or a missing
//! declared output is logged and does not abort the run, per the error
//! taxonomy's `JobNonZeroExit`/`MissingOutput` conditions.

use std::collections::BTreeMap;

use gwftool_core::{FileRef, Result, ToolOutputSpec};
use serde::Serialize;

use crate::runner::Step;
use crate::state::WorkflowState;

/// Persisted alongside a step's outputs: `<outdir>/<step_id>/<step_id>.json`.
#[derive(Debug, Serialize)]
pub struct JobReport {
    pub stdout: String,
    pub stderr: String,
    pub script: String,
    pub image: String,
    pub tool: String,
    pub exitcode: Option<i32>,
    #[serde(rename = "wallSeconds")]
    pub wall_seconds: Option<f64>,
}

impl JobReport {
    fn from_step(step: &Step) -> Self {
        let wall_seconds = match (step.starttime, step.endtime) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        };
        Self {
            stdout: step.stdout.to_string_lossy().to_string(),
            stderr: step.stderr.to_string_lossy().to_string(),
            script: step.script.clone(),
            image: step.docker_image.clone(),
            tool: step.tool_id.clone(),
            exitcode: step.return_code,
            wall_seconds,
        }
    }
}

/// Relocates `from_work_dir` outputs from the job directory into their
/// declared destinations, logging rather than failing if a source is
/// missing.
fn relocate_outputs(
    step: &Step,
    outputs_spec: &BTreeMap<String, ToolOutputSpec>,
) -> BTreeMap<String, FileRef> {
    let mut relocated = step.outputs.clone();

    for (name, spec) in outputs_spec {
        let Some(from_work_dir) = &spec.from_work_dir else {
            continue;
        };
        let Some(dest) = relocated.get(name) else {
            continue;
        };
        let src = step.jobdir.join(from_work_dir);
        if !src.exists() {
            tracing::warn!(
                step_id = %step.step_id,
                output = %name,
                source = %src.display(),
                "MissingOutput: declared from_work_dir output not produced by job"
            );
            continue;
        }
        if let Err(e) = std::fs::rename(&src, &dest.path) {
            tracing::warn!(
                step_id = %step.step_id,
                output = %name,
                error = %e,
                "MissingOutput: failed to relocate from_work_dir output"
            );
        }
    }

    relocated
}

/// Finalizes a completed step: relocates outputs, writes the job report, and
/// records the step's outputs in `state`.
pub fn reap(step: &Step, state: &mut WorkflowState) -> Result<()> {
    if step.return_code != Some(0) {
        tracing::warn!(
            step_id = %step.step_id,
            exitcode = ?step.return_code,
            "JobNonZeroExit: step exited with a non-zero or unknown status"
        );
    }

    let outputs = relocate_outputs(step, &step.outputs_spec);

    let report = JobReport::from_step(step);
    let report_dir = state.ensure_output_dir(&step.step_id)?;
    let report_path = report_dir.join(format!("{}.json", step.step_id));
    let body = serde_json::to_string_pretty(&report)?;
    std::fs::write(report_path, body)?;

    state.add_outputs(&step.step_id, outputs);
    state.step_done(&step.step_id);

    Ok(())
}
