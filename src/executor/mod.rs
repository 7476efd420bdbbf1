// Executor module - launching the bolt process

use async_trait::async_trait;

use crate::output::errors::BoltError;

pub mod local;

pub use local::LocalProcess;

/// Callback receiving one line of output, without its trailing newline
pub type LineCallback = Box<dyn Fn(String) + Send + Sync>;

/// Outcome of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Launches external processes
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `argv` (program first) with `env` added to the inherited
    /// environment, delivering output line by line as it arrives.
    async fn execute(
        &self,
        argv: &[String],
        env: &[(String, String)],
        on_stdout: LineCallback,
        on_stderr: LineCallback,
    ) -> Result<ProcessOutput, BoltError>;
}
