//! Local Docker Runner (spec section 4.6.1).
//!
//! Spawns `docker run --rm` with the job's inputs, outputs, and tool
//! directory bind-mounted, and tracks the child process directly.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::process::{Child, Command, Stdio};

use chrono::Utc;
use gwftool_core::{GwfError, Value};
use nix::unistd::Uid;

use super::{Runner, Step};

/// Runs jobs as subprocesses of the local `docker` binary.
pub struct LocalDockerRunner {
    step: Step,
    docker_path: String,
    no_net: bool,
    child: Option<Child>,
}

impl LocalDockerRunner {
    pub fn new(step: Step, docker_path: impl Into<String>, no_net: bool) -> Self {
        Self {
            step,
            docker_path: docker_path.into(),
            no_net,
            child: None,
        }
    }

    /// Builds the bind-mount list per spec section 4.7.1: inputs read-only,
    /// outputs read-write (after touching their destination so the
    /// container user can write into them), deduplicated and ordered for
    /// determinism.
    fn collect_mounts(&self) -> std::io::Result<Vec<String>> {
        let mut input_paths = BTreeSet::new();
        collect_file_paths(&self.step.inputs, &mut input_paths);

        let output_paths: BTreeSet<String> =
            self.step.outputs.values().map(|f| f.path.clone()).collect();

        let mut mounts = Vec::new();
        for path in &input_paths {
            if output_paths.contains(path) {
                continue;
            }
            mounts.push(format!("{path}:{path}:ro"));
        }
        for path in &output_paths {
            touch(std::path::Path::new(path))?;
            mounts.push(format!("{path}:{path}"));
        }
        Ok(mounts)
    }
}

fn collect_file_paths(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::File(f) => {
            out.insert(f.path.clone());
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_file_paths(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_file_paths(v, out);
            }
        }
        _ => {}
    }
}

impl Runner for LocalDockerRunner {
    fn start(&mut self) -> Result<(), GwfError> {
        let script_path = self.step.script_path();
        std::fs::write(&script_path, &self.step.script)?;

        let mounts = self.collect_mounts()?;
        let uid = Uid::current();

        let mut cmd = Command::new(&self.docker_path);
        cmd.arg("run").arg("--rm");
        if self.no_net {
            cmd.arg("--net=none");
        }
        for mount in mounts {
            cmd.arg("-v").arg(mount);
        }
        cmd.arg("-v").arg(format!(
            "{}:{}",
            self.step.jobdir.display(),
            self.step.jobdir.display()
        ));
        cmd.arg("-v").arg(format!(
            "{}:{}:ro",
            self.step.tool_dir.display(),
            self.step.tool_dir.display()
        ));
        cmd.arg("-u").arg(uid.to_string());
        cmd.arg("-w").arg(self.step.jobdir.to_string_lossy().to_string());
        cmd.arg(&self.step.docker_image);
        cmd.arg("bash").arg(script_path.to_string_lossy().to_string());

        let stdout = File::create(&self.step.stdout)?;
        let stderr = File::create(&self.step.stderr)?;
        cmd.stdout(Stdio::from(stdout));
        cmd.stderr(Stdio::from(stderr));

        let child = cmd.spawn().map_err(|e| GwfError::RunnerStartFailure {
            step_id: self.step.step_id.clone(),
            message: e.to_string(),
        })?;

        self.step.starttime = Some(Utc::now());
        self.child = Some(child);
        Ok(())
    }

    fn alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                self.step.endtime = Some(Utc::now());
                self.step.return_code = status.code();
                false
            }
            Ok(None) => true,
            Err(_) => {
                self.step.endtime = Some(Utc::now());
                self.step.return_code = None;
                false
            }
        }
    }

    fn into_step(self: Box<Self>) -> Step {
        self.step
    }
}

fn touch(path: &std::path::Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = File::create(path)?;
    f.write_all(b"")
}
