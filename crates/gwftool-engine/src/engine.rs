//! Engine Driver Loop (spec section 4.5) and Dry-run mode (spec section 4.8).

use std::path::PathBuf;
use std::time::Duration;

use gwftool_core::{GwfError, Result, ToolBox, Workflow, WorkflowInputs};

use crate::graph;
use crate::reap;
use crate::resolver::resolve_inputs;
use crate::runner::{Runner, RunnerFactory, Step};
use crate::state::WorkflowState;

/// Knobs the driver loop and dry-run mode read from the CLI (spec section 6).
pub struct EngineConfig {
    pub workdir: PathBuf,
    pub outdir: PathBuf,
    /// If true, treat a non-zero job exit as fatal instead of logging it.
    pub fail_fast: bool,
}

/// Drives a workflow to completion against a pluggable runner backend.
pub struct Engine {
    config: EngineConfig,
    runner_factory: RunnerFactory,
}

impl Engine {
    pub fn new(config: EngineConfig, runner_factory: RunnerFactory) -> Self {
        Self {
            config,
            runner_factory,
        }
    }

    /// Runs `workflow` to completion: repeatedly starts every ready, not-yet-
    /// started tool step, reaps finished runners, and sleeps while waiting
    /// for in-flight jobs, until nothing is ready and nothing is running.
    pub fn run(
        &self,
        workflow: &dyn Workflow,
        workflow_inputs: &WorkflowInputs,
        toolbox: &dyn ToolBox,
    ) -> Result<WorkflowState> {
        std::fs::create_dir_all(&self.config.workdir)?;
        std::fs::create_dir_all(&self.config.outdir)?;

        let mut state = graph::build(
            workflow,
            workflow_inputs,
            toolbox,
            self.config.workdir.clone(),
            self.config.outdir.clone(),
        )?;

        loop {
            let mut started_any = false;

            let ready_ids: Vec<String> = workflow
                .tool_steps()
                .into_iter()
                .map(|s| s.step_id.clone())
                .filter(|id| state.step_ready(id, workflow, workflow_inputs))
                .collect();

            for step_id in ready_ids {
                self.start_step(&step_id, workflow, toolbox, &mut state)?;
                started_any = true;
            }

            let finished: Vec<String> = state
                .running
                .iter_mut()
                .filter(|(_, runner)| !runner.alive())
                .map(|(id, _)| id.clone())
                .collect();

            for step_id in &finished {
                let runner = state.running.remove(step_id).expect("just observed finished");
                let step = runner.into_step();
                if self.config.fail_fast && step.return_code != Some(0) {
                    return Err(GwfError::RunnerStartFailure {
                        step_id: step_id.clone(),
                        message: format!(
                            "job exited with status {:?} and fail_fast is enabled",
                            step.return_code
                        ),
                    });
                }
                reap::reap(&step, &mut state)?;
                started_any = true;
            }

            if !started_any && !state.any_running() {
                break;
            }
            if state.any_running() {
                std::thread::sleep(Duration::from_secs(1));
            }
        }

        log_stuck_steps(workflow, &state);
        Ok(state)
    }

    fn start_step(
        &self,
        step_id: &str,
        workflow: &dyn Workflow,
        toolbox: &dyn ToolBox,
        state: &mut WorkflowState,
    ) -> Result<()> {
        let step_def = workflow
            .get_step(step_id)
            .ok_or_else(|| GwfError::InternalError {
                message: format!("step '{step_id}' vanished from workflow"),
            })?;
        let tool_id = step_def
            .tool_id
            .clone()
            .ok_or_else(|| GwfError::InternalError {
                message: format!("step '{step_id}' has no tool_id"),
            })?;
        let tool = toolbox.get(&tool_id).ok_or_else(|| GwfError::UnknownTool {
            tool_id: tool_id.clone(),
        })?;

        let inputs = resolve_inputs(step_def, state)?;
        let outputs = state.generate_outputs(step_id, tool)?;
        let jobdir = state.allocate_jobdir()?;

        let script = tool.render_cmdline(&inputs, &outputs)?;

        let step = Step::new(
            step_id.to_string(),
            jobdir,
            tool_id,
            tool.get_docker_image().to_string(),
            tool.tool_dir().to_path_buf(),
            tool.get_outputs().clone(),
            inputs,
            outputs,
            script,
        );

        let mut runner = (self.runner_factory)(step);
        runner.start()?;
        state.running.insert(step_id.to_string(), runner);
        state.step_running(step_id);
        Ok(())
    }
}

fn log_stuck_steps(workflow: &dyn Workflow, state: &WorkflowState) {
    for step in workflow.tool_steps() {
        if state.is_done(&step.step_id) {
            continue;
        }
        for (name, conn) in &step.input_connections {
            if !state.results.contains_key(&conn.id) {
                tracing::warn!(
                    step_id = %step.step_id,
                    input = %name,
                    upstream = %conn.id,
                    "step never became ready: upstream has no recorded result"
                );
            }
        }
    }
}

/// Compiles every reachable tool step to a TES task JSON document without
/// starting any runner or creating any job directory (spec section 4.8).
/// Reuses `WorkflowState::compute_jobdir` so emitted paths match what a live
/// run with the same workflow would have used.
pub fn dry_run(
    workflow: &dyn Workflow,
    workflow_inputs: &WorkflowInputs,
    toolbox: &dyn ToolBox,
    workdir: PathBuf,
    outdir: PathBuf,
) -> Result<Vec<serde_json::Value>> {
    let mut state = graph::build(workflow, workflow_inputs, toolbox, workdir, outdir)?;

    let mut tasks = Vec::new();

    loop {
        let ready_ids: Vec<String> = workflow
            .tool_steps()
            .into_iter()
            .map(|s| s.step_id.clone())
            .filter(|id| state.step_ready(id, workflow, workflow_inputs))
            .collect();

        if ready_ids.is_empty() {
            break;
        }

        for step_id in ready_ids {
            let step_def = workflow.get_step(&step_id).expect("from tool_steps");
            let tool_id = step_def.tool_id.clone().expect("tool step has tool_id");
            let tool = toolbox.get(&tool_id).ok_or_else(|| GwfError::UnknownTool {
                tool_id: tool_id.clone(),
            })?;

            let inputs = resolve_inputs(step_def, &state)?;
            let outputs = state.compute_outputs(&step_id, tool);
            let jobdir = state.peek_jobdir();
            state.advance_job_num();

            let script = tool.render_cmdline(&inputs, &outputs)?;

            let step = Step::new(
                step_id.clone(),
                jobdir,
                tool_id,
                tool.get_docker_image().to_string(),
                tool.tool_dir().to_path_buf(),
                tool.get_outputs().clone(),
                inputs,
                outputs.clone(),
                script,
            );

            tasks.push(crate::runner::tes::build_task(&step));

            state.add_outputs(&step_id, outputs);
            state.step_done(&step_id);
        }
    }

    Ok(tasks)
}
