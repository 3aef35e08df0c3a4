//! Workflow execution state (spec section 4.3, "Workflow State").
//!
//! Tracks, per step, whether it is pending, running, or done, and carries the
//! recorded results needed to resolve downstream inputs. Step readiness is
//! monotonic: once a step is ready it stays ready until it runs, and once a
//! step is done it never returns to pending or running.

use std::collections::BTreeMap;
use std::path::PathBuf;

use gwftool_core::{FileRef, GwfError, Result, Tool, Workflow, WorkflowInput, WorkflowInputs};

use crate::runner::Runner;

/// The recorded outcome of a step once it has a value downstream steps can
/// read from.
#[derive(Debug, Clone)]
pub enum StepResult {
    /// A `data_input` step resolves directly to the workflow input it names.
    DataInput(WorkflowInput),
    /// A `tool` step resolves to its declared output files once the job is
    /// reaped.
    Outputs(BTreeMap<String, FileRef>),
}

impl StepResult {
    pub fn get_output(&self, output_name: &str) -> Option<FileRef> {
        match self {
            StepResult::DataInput(WorkflowInput::File(f)) => Some(f.clone()),
            StepResult::Outputs(outputs) => outputs.get(output_name).cloned(),
            _ => None,
        }
    }
}

/// Three-valued lifecycle for a tool step (spec section 4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Running,
    Done,
}

/// All mutable bookkeeping the engine driver loop needs: which steps have
/// results, which are running, and where on disk the run's jobs and outputs
/// live.
pub struct WorkflowState {
    pub results: BTreeMap<String, StepResult>,
    pub states: BTreeMap<String, StepState>,
    pub running: BTreeMap<String, Box<dyn Runner>>,
    job_num: u64,
    pub workdir: PathBuf,
    pub outdir: PathBuf,
}

impl WorkflowState {
    pub fn new(workdir: PathBuf, outdir: PathBuf) -> Self {
        Self {
            results: BTreeMap::new(),
            states: BTreeMap::new(),
            running: BTreeMap::new(),
            job_num: 0,
            workdir,
            outdir,
        }
    }

    /// A tool step is ready once every declared workflow-level input it names
    /// is present in `workflow_inputs`, every upstream step it depends on has
    /// a recorded result, and it is not itself already running or done (spec
    /// section 4.5, `ready(step)` conditions (i) and (ii)).
    pub fn step_ready(
        &self,
        step_id: &str,
        workflow: &dyn Workflow,
        workflow_inputs: &WorkflowInputs,
    ) -> bool {
        if self.states.get(step_id) != Some(&StepState::Pending) {
            return false;
        }
        let Some(step) = workflow.get_step(step_id) else {
            return false;
        };
        step.inputs
            .iter()
            .all(|declared| workflow_inputs.contains_key(&declared.name))
            && step
                .input_connections
                .values()
                .all(|conn| self.results.contains_key(&conn.id))
    }

    pub fn step_running(&mut self, step_id: &str) {
        self.states.insert(step_id.to_string(), StepState::Running);
    }

    pub fn step_done(&mut self, step_id: &str) {
        self.states.insert(step_id.to_string(), StepState::Done);
    }

    pub fn is_done(&self, step_id: &str) -> bool {
        self.states.get(step_id) == Some(&StepState::Done)
    }

    pub fn any_running(&self) -> bool {
        !self.running.is_empty()
    }

    /// Names of workflow inputs a `data_input` step requires that are absent
    /// from the supplied inputs document, aggregated across the whole
    /// workflow (spec section 4.2, "Step Graph Builder" validation).
    pub fn missing_inputs(workflow: &dyn Workflow, workflow_inputs: &WorkflowInputs) -> Vec<String> {
        let mut missing: Vec<String> = workflow
            .steps()
            .into_iter()
            .filter(|s| s.step_type == gwftool_core::StepType::DataInput)
            .filter(|s| !workflow_inputs.contains_key(&s.label))
            .map(|s| s.label.clone())
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Pure function computing the on-disk job directory for a given job
    /// number, independent of whether that directory is ever created. Used
    /// both by the live driver loop and by dry-run so that both paths agree.
    pub fn compute_jobdir(workdir: &std::path::Path, job_num: u64) -> PathBuf {
        workdir.join("jobs").join(job_num.to_string())
    }

    /// Allocates the next job directory, creating it on disk, and advances
    /// the job counter (spec section 4.3, `create_jobdir`: the counter is
    /// incremented before use, so the first job directory is `jobs/1`).
    pub fn allocate_jobdir(&mut self) -> Result<PathBuf> {
        self.job_num += 1;
        let dir = Self::compute_jobdir(&self.workdir, self.job_num);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Peeks at the job directory the next `allocate_jobdir` call will
    /// produce, without creating it or advancing the counter. Dry-run uses
    /// this so task paths match what a live run would have used.
    pub fn peek_jobdir(&self) -> PathBuf {
        Self::compute_jobdir(&self.workdir, self.job_num + 1)
    }

    pub fn advance_job_num(&mut self) {
        self.job_num += 1;
    }

    pub fn ensure_output_dir(&self, step_id: &str) -> Result<PathBuf> {
        let dir = self.outdir.join(step_id);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Output Generator (spec section 4.4): computes the deterministic,
    /// absolute destination path for every declared tool output, under
    /// `<outdir>/<step_id>/<name>`, without touching the filesystem. Used by
    /// both the live driver loop and dry-run so paths agree either way.
    pub fn compute_outputs(&self, step_id: &str, tool: &dyn Tool) -> BTreeMap<String, FileRef> {
        let dir = self.outdir.join(step_id);
        tool.get_outputs()
            .keys()
            .map(|name| {
                let path = dir.join(name).to_string_lossy().to_string();
                (name.clone(), FileRef::with_url(path.clone(), path))
            })
            .collect()
    }

    /// Like `compute_outputs`, but also creates `<outdir>/<step_id>` on disk
    /// (spec section 4.4: "Create directory `<outdir>/<sid>` (idempotent)").
    pub fn generate_outputs(
        &self,
        step_id: &str,
        tool: &dyn Tool,
    ) -> Result<BTreeMap<String, FileRef>> {
        std::fs::create_dir_all(self.outdir.join(step_id))?;
        Ok(self.compute_outputs(step_id, tool))
    }

    pub fn add_outputs(&mut self, step_id: &str, outputs: BTreeMap<String, FileRef>) {
        self.results
            .insert(step_id.to_string(), StepResult::Outputs(outputs));
    }

    pub fn get_result(&self, step_id: &str) -> Option<&StepResult> {
        self.results.get(step_id)
    }

    pub fn require_result(&self, step_id: &str) -> Result<&StepResult> {
        self.results.get(step_id).ok_or_else(|| GwfError::InternalError {
            message: format!("no recorded result for step '{step_id}'"),
        })
    }
}
