//! TES Runner (spec section 4.6.2).
//!
//! Submits a step as a GA4GH Task Execution Service task and polls for
//! completion, following the wire shape of the original `TaskService`
//! client: `POST /v1/tasks`, `GET /v1/tasks/:id`, with a fixed set of
//! non-terminal states.

use std::time::Duration;

use chrono::Utc;
use gwftool_core::{FileRef, GwfError, Value};
use serde::{Deserialize, Serialize};

use super::{Runner, Step};

const NON_TERMINAL_STATES: &[&str] = &["QUEUED", "RUNNING", "INITIALIZING"];

fn is_done_state(state: &str) -> bool {
    !NON_TERMINAL_STATES.contains(&state)
}

#[derive(Debug, Serialize)]
struct TesInput {
    url: Option<String>,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    contents: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct TesOutput {
    url: String,
    path: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct TesExecutor {
    image_name: String,
    cmd: Vec<String>,
    workdir: String,
    stdout: String,
    stderr: String,
}

#[derive(Debug, Serialize)]
struct TesTask {
    name: String,
    executors: Vec<TesExecutor>,
    inputs: Vec<TesInput>,
    outputs: Vec<TesOutput>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    state: String,
}

/// Builds the TES task JSON for a step (spec section 4.7.2): the rendered
/// script is embedded inline at a fixed in-container path rather than
/// referenced by URL, and the job directory is shipped as a whole as both an
/// input and an output `DIRECTORY` entry.
pub fn build_task(step: &Step) -> serde_json::Value {
    let script_container_path = "/opt/gwftool/script.sh".to_string();
    let jobdir = step.jobdir.to_string_lossy().to_string();

    let mut inputs = Vec::new();
    collect_inputs(&step.inputs, &mut inputs);
    inputs.push(TesInput {
        url: None,
        path: script_container_path.clone(),
        contents: Some(step.script.clone()),
        kind: None,
    });
    inputs.push(TesInput {
        url: Some(step.tool_dir.to_string_lossy().to_string()),
        path: step.tool_dir.to_string_lossy().to_string(),
        contents: None,
        kind: Some("DIRECTORY"),
    });

    let mut outputs: Vec<TesOutput> = step
        .outputs
        .values()
        .map(|f: &FileRef| TesOutput {
            url: f.path.clone(),
            path: f.path.clone(),
            kind: None,
        })
        .collect();
    outputs.push(TesOutput {
        url: jobdir.clone(),
        path: jobdir.clone(),
        kind: Some("DIRECTORY"),
    });

    let task = TesTask {
        name: format!("gwftool-{}", step.step_id),
        executors: vec![TesExecutor {
            image_name: step.docker_image.clone(),
            cmd: vec!["bash".to_string(), script_container_path],
            workdir: jobdir,
            stdout: step.stdout.to_string_lossy().to_string(),
            stderr: step.stderr.to_string_lossy().to_string(),
        }],
        inputs,
        outputs,
    };

    serde_json::to_value(task).expect("TesTask always serializes")
}

fn collect_inputs(value: &Value, out: &mut Vec<TesInput>) {
    match value {
        Value::File(f) => out.push(TesInput {
            url: f.url.clone().or_else(|| Some(f.path.clone())),
            path: f.path.clone(),
            contents: None,
            kind: None,
        }),
        Value::Map(map) => {
            for v in map.values() {
                collect_inputs(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_inputs(v, out);
            }
        }
        _ => {}
    }
}

/// Thin REST client over the GA4GH TES surface named in spec section 6 but
/// not otherwise exercised by the driver loop: service discovery, listing,
/// and cancellation, mirroring the original `TaskService` class. `TesRunner`
/// only ever needs `create`/`get`, which it calls directly; this client
/// rounds out the rest of the documented wire protocol.
pub struct TaskServiceClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl TaskServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn get_service_info(&self) -> Result<serde_json::Value, GwfError> {
        self.client
            .get(format!("{}/v1/tasks/service-info", self.base_url))
            .send()
            .and_then(|r| r.json())
            .map_err(|e| GwfError::RunnerStartFailure {
                step_id: "service-info".to_string(),
                message: e.to_string(),
            })
    }

    pub fn list(&self) -> Result<serde_json::Value, GwfError> {
        self.client
            .get(format!("{}/v1/tasks", self.base_url))
            .send()
            .and_then(|r| r.json())
            .map_err(|e| GwfError::RunnerStartFailure {
                step_id: "list".to_string(),
                message: e.to_string(),
            })
    }

    pub fn cancel(&self, task_id: &str) -> Result<serde_json::Value, GwfError> {
        self.client
            .post(format!("{}/v1/tasks/{}:cancel", self.base_url, task_id))
            .send()
            .and_then(|r| r.json())
            .map_err(|e| GwfError::RunnerStartFailure {
                step_id: task_id.to_string(),
                message: e.to_string(),
            })
    }
}

/// Drives a step's job through a remote TES service.
pub struct TesRunner {
    step: Step,
    base_url: String,
    client: reqwest::blocking::Client,
    task_id: Option<String>,
}

impl TesRunner {
    pub fn new(step: Step, base_url: impl Into<String>) -> Self {
        Self {
            step,
            base_url: base_url.into(),
            client: reqwest::blocking::Client::new(),
            task_id: None,
        }
    }

    /// Polls until the task reaches a terminal state or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while self.alive() {
            if std::time::Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        true
    }
}

impl Runner for TesRunner {
    fn start(&mut self) -> Result<(), GwfError> {
        std::fs::write(self.step.script_path(), &self.step.script)?;

        let task = build_task(&self.step);
        let resp = self
            .client
            .post(format!("{}/v1/tasks", self.base_url))
            .json(&task)
            .send()
            .map_err(|e| GwfError::RunnerStartFailure {
                step_id: self.step.step_id.clone(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(GwfError::RunnerStartFailure {
                step_id: self.step.step_id.clone(),
                message: format!("TES submission returned {}", resp.status()),
            });
        }

        let parsed: CreateResponse = resp.json().map_err(|e| GwfError::RunnerStartFailure {
            step_id: self.step.step_id.clone(),
            message: e.to_string(),
        })?;

        self.step.starttime = Some(Utc::now());
        self.task_id = Some(parsed.id);
        Ok(())
    }

    fn alive(&mut self) -> bool {
        let Some(task_id) = &self.task_id else {
            return false;
        };
        let resp = self
            .client
            .get(format!("{}/v1/tasks/{}", self.base_url, task_id))
            .send();

        let Ok(resp) = resp else {
            return true;
        };
        let Ok(parsed) = resp.json::<GetResponse>() else {
            return true;
        };

        if is_done_state(&parsed.state) {
            self.step.endtime = Some(Utc::now());
            self.step.return_code = if parsed.state == "COMPLETE" { Some(0) } else { Some(1) };
            false
        } else {
            true
        }
    }

    fn into_step(self: Box<Self>) -> Step {
        self.step
    }
}
