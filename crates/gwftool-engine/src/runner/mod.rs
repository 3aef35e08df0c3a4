//! Runner abstraction (spec section 4.6).
//!
//! A `Runner` owns a single job from submission to completion. The engine
//! never inspects a runner's backend: it starts it, polls `alive()` until it
//! returns `false`, then reclaims the final `Step` for reaping. Each runner
//! is self-contained (no borrowed state) so it can be driven from its own
//! thread without wrapping shared state in `Arc<Mutex<_>>`.

pub mod local_docker;
pub mod tes;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use gwftool_core::{FileRef, GwfError, ToolOutputSpec, Value};

/// Everything a runner needs to execute a job and everything the reaper
/// needs once it's done. Self-contained so it can cross thread boundaries.
#[derive(Debug, Clone)]
pub struct Step {
    pub step_id: String,
    pub jobdir: PathBuf,
    pub tool_id: String,
    pub docker_image: String,
    pub tool_dir: PathBuf,
    pub outputs_spec: BTreeMap<String, ToolOutputSpec>,
    pub inputs: Value,
    pub outputs: BTreeMap<String, FileRef>,
    pub script: String,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub starttime: Option<DateTime<Utc>>,
    pub endtime: Option<DateTime<Utc>>,
    pub return_code: Option<i32>,
}

impl Step {
    pub fn new(
        step_id: String,
        jobdir: PathBuf,
        tool_id: String,
        docker_image: String,
        tool_dir: PathBuf,
        outputs_spec: BTreeMap<String, ToolOutputSpec>,
        inputs: Value,
        outputs: BTreeMap<String, FileRef>,
        script: String,
    ) -> Self {
        let stdout = jobdir.join("stdout.log");
        let stderr = jobdir.join("stderr.log");
        Self {
            step_id,
            jobdir,
            tool_id,
            docker_image,
            tool_dir,
            outputs_spec,
            inputs,
            outputs,
            script,
            stdout,
            stderr,
            starttime: None,
            endtime: None,
            return_code: None,
        }
    }

    pub fn script_path(&self) -> PathBuf {
        self.jobdir.join("script.sh")
    }
}

/// A running job, regardless of backend. `start` is called once; `alive` is
/// polled by the driver loop until it returns `false`, at which point the
/// runner is consumed via `into_step` to retrieve the final `Step` for the
/// reaper.
pub trait Runner: Send {
    fn start(&mut self) -> Result<(), GwfError>;
    fn alive(&mut self) -> bool;
    fn into_step(self: Box<Self>) -> Step;
}

/// Constructs a `Runner` for a given `Step`. Injected into the engine so
/// tests and dry-run can substitute a fake or no-op runner.
pub type RunnerFactory = Box<dyn Fn(Step) -> Box<dyn Runner> + Send + Sync>;
