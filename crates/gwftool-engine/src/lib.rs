//! Execution engine built on top of `gwftool-core`'s read-side data model:
//! the Step Graph Builder, Input Resolver, Workflow State, Runner
//! abstraction, Reap, and the Engine driver loop / dry-run mode.

pub mod engine;
pub mod graph;
pub mod reap;
pub mod resolver;
pub mod runner;
pub mod state;

pub use engine::{dry_run, Engine, EngineConfig};
pub use reap::JobReport;
pub use runner::{
    local_docker::LocalDockerRunner, tes::TaskServiceClient, tes::TesRunner, Runner, RunnerFactory,
    Step,
};
pub use state::{StepResult, StepState, WorkflowState};
