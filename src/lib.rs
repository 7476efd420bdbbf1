// boltctl - run bolt tasks and plans against managed machines
//
// Resolves which machines to target, merges declared settings with call-site
// overrides and live connection facts, validates the result and launches
// bolt with a transport-aware command line.

pub mod config;
pub mod executor;
pub mod inventory;
pub mod output;
pub mod runner;

pub use config::{GlobalConfig, NodeSpec, Overrides, RunKind, TaskConfig};
pub use executor::{LocalProcess, ProcessOutput, ProcessRunner};
pub use inventory::{Environment, Machine, StaticEnvironment, Transport};
pub use output::{BoltError, TerminalOutput};
pub use runner::{BoltCommand, PreparedRun, Runner, RunnerOptions, ValidationErrors};

/// Version of the boltctl tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Overrides, TaskConfig};
    pub use crate::executor::LocalProcess;
    pub use crate::inventory::{Environment, StaticEnvironment};
    pub use crate::output::BoltError;
    pub use crate::runner::{Runner, RunnerOptions};
}
