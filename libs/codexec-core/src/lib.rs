//! Compile and run untrusted submissions against JSON test cases.
//!
//! One [`ExecutionRequest`](codexec_common::types::ExecutionRequest) goes
//! through [`Executor::run`]: a fresh workspace, one compile, one execute over
//! every case, and a report keyed by case id.

pub mod config;
pub mod evaluator;
pub mod executor;
pub mod protocol;
pub mod registry;
pub mod runner;
pub mod toolchain;
pub mod workspace;

pub use config::{ToolchainConfigManager, ToolchainOverride, WorkerConfig};
pub use evaluator::{evaluate, EvaluationSummary, Verdict};
pub use executor::Executor;
pub use registry::{ToolchainProvider, ToolchainRegistry};
pub use runner::{ProcessOutput, ProcessRunner, ResourceCeiling, RunOptions};
pub use toolchain::{Toolchain, ToolchainDescriptor};
pub use workspace::Workspace;
