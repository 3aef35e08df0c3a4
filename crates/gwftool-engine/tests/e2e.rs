//! End-to-end scenarios from spec section 8.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use gwftool_core::{
    DeclaredInput, FileRef, GwfError, InMemoryToolBox, InputConnection, SimpleTool, StepType,
    ToolOutputSpec, Workflow, WorkflowDocument, WorkflowInput, WorkflowInputs, WorkflowStep,
};
use gwftool_engine::{dry_run, Engine, EngineConfig, Runner, RunnerFactory, Step};

fn data_input_step(id: &str, label: &str) -> WorkflowStep {
    WorkflowStep {
        step_id: id.to_string(),
        step_type: StepType::DataInput,
        label: label.to_string(),
        tool_id: None,
        tool_state: BTreeMap::new(),
        inputs: vec![],
        input_connections: BTreeMap::new(),
    }
}

fn tool_step(id: &str, tool_id: &str, conns: &[(&str, &str)]) -> WorkflowStep {
    let mut connections = BTreeMap::new();
    let mut inputs = vec![];
    for (name, upstream) in conns {
        connections.insert(
            name.to_string(),
            InputConnection {
                id: upstream.to_string(),
                output_name: "out1".to_string(),
            },
        );
        inputs.push(DeclaredInput {
            name: name.to_string(),
        });
    }
    WorkflowStep {
        step_id: id.to_string(),
        step_type: StepType::Tool,
        label: String::new(),
        tool_id: Some(tool_id.to_string()),
        tool_state: BTreeMap::new(),
        inputs,
        input_connections: connections,
    }
}

fn toolbox_with_tools(tool_ids: &[&str]) -> InMemoryToolBox {
    let mut tb = InMemoryToolBox::new();
    for id in tool_ids {
        let mut outputs = BTreeMap::new();
        outputs.insert(
            "out1".to_string(),
            ToolOutputSpec {
                name: "out1".to_string(),
                from_work_dir: None,
            },
        );
        tb.insert(Box::new(SimpleTool {
            tool_id: id.to_string(),
            tool_dir: PathBuf::from(format!("/tools/{id}")),
            docker_image: "busybox".to_string(),
            outputs,
            command_template: "cat $src > $out1".to_string(),
        }));
    }
    tb
}

/// A runner that completes instantly with exit code 0 and materializes each
/// declared output as an empty file, so job reports and downstream reads see
/// real paths without spawning a container.
struct FakeRunner {
    step: Step,
    started: Arc<Mutex<Vec<String>>>,
}

impl Runner for FakeRunner {
    fn start(&mut self) -> Result<(), GwfError> {
        for file in self.step.outputs.values() {
            if let Some(parent) = std::path::Path::new(&file.path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&file.path, b"")?;
        }
        self.step.starttime = Some(chrono::Utc::now());
        self.step.endtime = Some(chrono::Utc::now());
        self.step.return_code = Some(0);
        self.started.lock().unwrap().push(self.step.step_id.clone());
        Ok(())
    }

    fn alive(&mut self) -> bool {
        false
    }

    fn into_step(self: Box<Self>) -> Step {
        self.step
    }
}

fn fake_factory(started: Arc<Mutex<Vec<String>>>) -> RunnerFactory {
    Box::new(move |step| {
        Box::new(FakeRunner {
            step,
            started: started.clone(),
        })
    })
}

#[test]
fn empty_workflow_returns_immediately_with_no_jobs() {
    let tmp = tempfile::tempdir().unwrap();
    let doc = WorkflowDocument::new(BTreeMap::new());
    let toolbox = toolbox_with_tools(&[]);
    let started = Arc::new(Mutex::new(Vec::new()));

    let config = EngineConfig {
        workdir: tmp.path().join("work"),
        outdir: tmp.path().join("out"),
        fail_fast: false,
    };
    let engine = Engine::new(config, fake_factory(started));
    let state = engine
        .run(&doc, &WorkflowInputs::new(), &toolbox)
        .unwrap();

    assert!(state.results.is_empty());
    assert!(!tmp.path().join("work").join("jobs").exists());
}

#[test]
fn single_tool_step_with_no_upstream_runs_and_reports() {
    let tmp = tempfile::tempdir().unwrap();
    let mut steps = BTreeMap::new();
    steps.insert("0".to_string(), data_input_step("0", "in"));
    steps.insert("1".to_string(), tool_step("1", "cat1", &[("src", "0")]));
    let doc = WorkflowDocument::new(steps);

    let mut inputs = WorkflowInputs::new();
    inputs.insert(
        "in".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );
    inputs.insert(
        "src".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );

    let toolbox = toolbox_with_tools(&["cat1"]);
    let started = Arc::new(Mutex::new(Vec::new()));
    let config = EngineConfig {
        workdir: tmp.path().join("work"),
        outdir: tmp.path().join("out"),
        fail_fast: false,
    };
    let engine = Engine::new(config, fake_factory(started.clone()));
    let state = engine.run(&doc, &inputs, &toolbox).unwrap();

    assert!(state.is_done("1"));
    assert_eq!(*started.lock().unwrap(), vec!["1".to_string()]);
    assert!(tmp.path().join("work").join("jobs").join("1").is_dir());

    let report_path = tmp
        .path()
        .join("out")
        .join("1")
        .join("1.json");
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(report["exitcode"], 0);
    assert_eq!(report["tool"], "cat1");
    assert_eq!(report["image"], "busybox");
    let out1_path = tmp
        .path()
        .join("out")
        .join("1")
        .join("out1")
        .to_string_lossy()
        .to_string();
    let expected_script = format!("cat /abs/a.txt > {out1_path}");
    assert_eq!(
        report["script"],
        serde_json::Value::String(expected_script.clone())
    );
    assert_ne!(
        report["script"].as_str().unwrap(),
        tmp.path()
            .join("work")
            .join("jobs")
            .join("1")
            .join("script.sh")
            .to_string_lossy()
    );
}

#[test]
fn linear_chain_threads_upstream_output_path_into_downstream_script() {
    let tmp = tempfile::tempdir().unwrap();
    let mut steps = BTreeMap::new();
    steps.insert("0".to_string(), data_input_step("0", "in"));
    steps.insert("1".to_string(), tool_step("1", "cat1", &[("src", "0")]));
    steps.insert("2".to_string(), tool_step("2", "cat1", &[("src", "1")]));
    steps.insert("3".to_string(), tool_step("3", "cat1", &[("src", "2")]));
    let doc = WorkflowDocument::new(steps);

    let mut inputs = WorkflowInputs::new();
    inputs.insert(
        "in".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );
    inputs.insert(
        "src".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );

    let toolbox = toolbox_with_tools(&["cat1"]);
    let started = Arc::new(Mutex::new(Vec::new()));
    let config = EngineConfig {
        workdir: tmp.path().join("work"),
        outdir: tmp.path().join("out"),
        fail_fast: false,
    };
    let engine = Engine::new(config, fake_factory(started));
    let state = engine.run(&doc, &inputs, &toolbox).unwrap();

    assert!(state.is_done("1") && state.is_done("2") && state.is_done("3"));

    let step1_out = tmp.path().join("out").join("1").join("out1");
    assert!(step1_out.is_file());
}

#[test]
fn diamond_dag_runs_both_branches_before_the_join() {
    let tmp = tempfile::tempdir().unwrap();
    let mut steps = BTreeMap::new();
    steps.insert("a".to_string(), data_input_step("a", "in"));
    steps.insert("b".to_string(), tool_step("b", "cat1", &[("src", "a")]));
    steps.insert("c".to_string(), tool_step("c", "cat1", &[("src", "a")]));
    steps.insert(
        "d".to_string(),
        tool_step("d", "cat1", &[("left", "b"), ("right", "c")]),
    );
    let doc = WorkflowDocument::new(steps);

    let mut inputs = WorkflowInputs::new();
    inputs.insert(
        "in".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );
    inputs.insert(
        "src".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );
    inputs.insert(
        "left".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );
    inputs.insert(
        "right".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );

    let toolbox = toolbox_with_tools(&["cat1"]);
    let started = Arc::new(Mutex::new(Vec::new()));
    let config = EngineConfig {
        workdir: tmp.path().join("work"),
        outdir: tmp.path().join("out"),
        fail_fast: false,
    };
    let engine = Engine::new(config, fake_factory(started.clone()));
    let state = engine.run(&doc, &inputs, &toolbox).unwrap();

    for id in ["b", "c", "d"] {
        assert!(state.is_done(id));
    }
    let order = started.lock().unwrap().clone();
    let d_pos = order.iter().position(|s| s == "d").unwrap();
    let b_pos = order.iter().position(|s| s == "b").unwrap();
    let c_pos = order.iter().position(|s| s == "c").unwrap();
    assert!(d_pos > b_pos && d_pos > c_pos);
}

#[test]
fn missing_workflow_input_is_rejected_before_any_job_directory_is_created() {
    let tmp = tempfile::tempdir().unwrap();
    let mut steps = BTreeMap::new();
    steps.insert("0".to_string(), data_input_step("0", "foo"));
    steps.insert("1".to_string(), tool_step("1", "cat1", &[("src", "0")]));
    let doc = WorkflowDocument::new(steps);

    let toolbox = toolbox_with_tools(&["cat1"]);
    let started = Arc::new(Mutex::new(Vec::new()));
    let config = EngineConfig {
        workdir: tmp.path().join("work"),
        outdir: tmp.path().join("out"),
        fail_fast: false,
    };
    let engine = Engine::new(config, fake_factory(started));
    let err = engine
        .run(&doc, &WorkflowInputs::new(), &toolbox)
        .unwrap_err();

    match err {
        GwfError::MissingInputs { names } => {
            assert_eq!(names, vec!["1.src".to_string(), "foo".to_string()])
        }
        other => panic!("expected MissingInputs, got {other:?}"),
    }
    assert!(!tmp.path().join("work").join("jobs").exists());
}

#[test]
fn declared_input_absent_from_workflow_inputs_is_rejected_even_when_unconnected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut steps = BTreeMap::new();
    steps.insert("0".to_string(), data_input_step("0", "in"));
    let mut step1 = tool_step("1", "cat1", &[("src", "0")]);
    step1.inputs.push(DeclaredInput {
        name: "extra".to_string(),
    });
    steps.insert("1".to_string(), step1);
    let doc = WorkflowDocument::new(steps);

    let mut inputs = WorkflowInputs::new();
    inputs.insert(
        "in".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );
    inputs.insert(
        "src".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );

    let toolbox = toolbox_with_tools(&["cat1"]);
    let started = Arc::new(Mutex::new(Vec::new()));
    let config = EngineConfig {
        workdir: tmp.path().join("work"),
        outdir: tmp.path().join("out"),
        fail_fast: false,
    };
    let engine = Engine::new(config, fake_factory(started));
    let err = engine.run(&doc, &inputs, &toolbox).unwrap_err();

    match err {
        GwfError::MissingInputs { names } => assert_eq!(names, vec!["1.extra".to_string()]),
        other => panic!("expected MissingInputs, got {other:?}"),
    }
    assert!(!tmp.path().join("work").join("jobs").exists());
}

#[test]
fn dry_run_compiles_a_two_step_chain_without_starting_any_job() {
    let mut steps = BTreeMap::new();
    steps.insert("0".to_string(), data_input_step("0", "in"));
    steps.insert("1".to_string(), tool_step("1", "cat1", &[("src", "0")]));
    steps.insert("2".to_string(), tool_step("2", "cat1", &[("src", "1")]));
    let doc = WorkflowDocument::new(steps);
    assert_eq!(doc.tool_steps().len(), 2);

    let mut inputs = WorkflowInputs::new();
    inputs.insert(
        "in".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );
    inputs.insert(
        "src".to_string(),
        WorkflowInput::File(FileRef::new("/abs/a.txt")),
    );

    let toolbox = toolbox_with_tools(&["cat1"]);
    let tasks = dry_run(
        &doc,
        &inputs,
        &toolbox,
        PathBuf::from("/tmp/gwftool-dryrun-work"),
        PathBuf::from("/tmp/gwftool-dryrun-out"),
    )
    .unwrap();

    assert_eq!(tasks.len(), 2);
    for task in &tasks {
        assert!(task["executors"].is_array());
        assert!(task["inputs"].is_array());
        assert!(task["outputs"].is_array());
    }

    let first_output_path = tasks[0]["outputs"][0]["path"].as_str().unwrap().to_string();
    let second_inputs = tasks[1]["inputs"].as_array().unwrap();
    assert!(second_inputs
        .iter()
        .any(|i| i["path"].as_str() == Some(first_output_path.as_str())));
}
