mod tools;

use std::path::PathBuf;

use clap::Parser;
use gwftool_core::{WorkflowDocument, WorkflowInputs};
use gwftool_engine::{dry_run, Engine, EngineConfig, LocalDockerRunner};

/// Compiles and runs Galaxy workflow documents as DAGs of containerized tool
/// invocations.
#[derive(Parser, Debug)]
#[command(name = "gwftool", version, about, long_about = None)]
struct Args {
    /// Galaxy workflow document (.ga JSON).
    workflow: PathBuf,

    /// Workflow inputs document (YAML).
    inputs: PathBuf,

    /// Tool descriptor search root; repeatable.
    #[arg(short = 't', long = "tooldir", action = clap::ArgAction::Append)]
    tooldir: Vec<PathBuf>,

    /// Parent directory for the run's job scratch tree.
    #[arg(long, default_value = "./gwftool-work")]
    workdir: PathBuf,

    /// Root for per-step output directories and job reports.
    #[arg(long, default_value = "./gwftool-out")]
    outdir: PathBuf,

    /// Pass `--net=none` to `docker run`.
    #[arg(long)]
    no_net: bool,

    /// Compile tasks to `task-<i>.json` instead of executing them.
    #[arg(long)]
    dryrun: bool,

    /// Treat a non-zero job exit as fatal instead of logging and continuing.
    #[arg(long)]
    fail_fast: bool,

    /// Path to the `docker` executable.
    #[arg(long, default_value = "docker")]
    docker_path: String,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    let workflow_json = std::fs::read_to_string(&args.workflow)?;
    let workflow = WorkflowDocument::from_json(&workflow_json)?;

    let inputs_yaml = std::fs::read_to_string(&args.inputs)?;
    let workflow_inputs: WorkflowInputs = serde_yaml::from_str(&inputs_yaml)?;
    for (name, value) in &workflow_inputs {
        if let Err(message) = value.validate_absolute_paths() {
            anyhow::bail!("input '{name}': {message}");
        }
    }

    let mut tooldirs = args.tooldir.clone();
    let workflow_dir = args
        .workflow
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    if !tooldirs.contains(&workflow_dir) {
        tooldirs.push(workflow_dir);
    }
    let toolbox = tools::build_toolbox(&tooldirs)?;

    if args.dryrun {
        let tasks = dry_run(
            &workflow,
            &workflow_inputs,
            &toolbox,
            args.workdir,
            args.outdir,
        )?;
        for (i, task) in tasks.iter().enumerate() {
            let path = format!("task-{i}.json");
            let body = serde_json::to_string_pretty(task)?;
            std::fs::write(&path, body)?;
            tracing::info!(path, "wrote compiled task");
        }
        return Ok(());
    }

    let config = EngineConfig {
        workdir: args.workdir,
        outdir: args.outdir,
        fail_fast: args.fail_fast,
    };
    let no_net = args.no_net;
    let docker_path = args.docker_path.clone();
    let runner_factory: gwftool_engine::RunnerFactory = Box::new(move |step| {
        Box::new(LocalDockerRunner::new(step, docker_path.clone(), no_net))
    });

    let engine = Engine::new(config, runner_factory);
    engine.run(&workflow, &workflow_inputs, &toolbox)?;
    Ok(())
}
