// Runner module - resolve, validate and launch bolt runs against a machine

use std::fmt;

use tracing::{debug, info, warn};

pub mod command;
pub mod merge;
pub mod nodes;
pub mod validate;

pub use command::{build_command, BoltCommand};
pub use merge::{fill_connection_facts, merge_config, MergedConfig};
pub use nodes::{join_nodes, resolve_nodes};
pub use validate::{
    validate_config, validate_global, validate_run, ValidationErrors, BOLT_BUCKET, GLOBAL_BUCKET,
};

use crate::config::{dependency_names, Overrides, TaskConfig};
use crate::executor::{ProcessOutput, ProcessRunner};
use crate::inventory::{Environment, Machine, Transport};
use crate::output::errors::BoltError;
use crate::output::messages;
use crate::output::TerminalOutput;

/// Environment variable holding the PATH to restore for the bolt process
pub const ORIGINAL_PATH_VAR: &str = "BOLTCTL_OLD_PATH";

/// Pipeline stages, in the order a run moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DependencyCheck,
    OverrideSetup,
    Validate,
    BuildCommand,
    Execute,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::DependencyCheck => "dependency-check",
            Stage::OverrideSetup => "override-setup",
            Stage::Validate => "validate",
            Stage::BuildCommand => "build-command",
            Stage::Execute => "execute",
        };
        f.write_str(name)
    }
}

/// Process-level options for launching bolt
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// PATH handed to the bolt process instead of this process's own
    pub original_path: Option<String>,
}

impl RunnerOptions {
    /// Read options from the process environment
    pub fn from_env() -> Self {
        RunnerOptions {
            original_path: std::env::var(ORIGINAL_PATH_VAR).ok(),
        }
    }
}

/// A fully resolved run, ready to launch
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRun {
    pub config: TaskConfig,
    pub transport: Transport,
    pub command: BoltCommand,
}

/// Runs bolt tasks and plans on behalf of one machine.
///
/// The machine's declared config is layered over the environment's shared
/// settings once; every run works on its own copy of that base.
pub struct Runner<'a> {
    env: &'a dyn Environment,
    machine: &'a Machine,
    base: TaskConfig,
    executor: &'a dyn ProcessRunner,
    ui: TerminalOutput,
    options: RunnerOptions,
}

impl<'a> Runner<'a> {
    pub fn new(
        env: &'a dyn Environment,
        machine: &'a Machine,
        executor: &'a dyn ProcessRunner,
    ) -> Self {
        Runner {
            env,
            machine,
            base: TaskConfig::layered(&machine.bolt, env.global_config()),
            executor,
            ui: TerminalOutput::new(machine.name.clone(), false),
            options: RunnerOptions::default(),
        }
    }

    /// Use `config` as the declared config instead of the machine's own
    pub fn with_config(mut self, config: &TaskConfig) -> Self {
        self.base = TaskConfig::layered(config, self.env.global_config());
        self
    }

    pub fn with_output(mut self, ui: TerminalOutput) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// The layered base config runs start from
    pub fn base_config(&self) -> &TaskConfig {
        &self.base
    }

    /// Run a bolt task or plan.
    ///
    /// `overrides` replace declared settings for this run only. Succeeds
    /// only when bolt exits with status zero.
    pub async fn run(
        &self,
        kind: Option<&str>,
        name: Option<&str>,
        overrides: &Overrides,
    ) -> Result<ProcessOutput, BoltError> {
        let prepared = self.prepare(kind, name, overrides)?;
        self.execute(&prepared.command).await
    }

    /// Resolve, validate and render a run without launching it
    pub fn prepare(
        &self,
        kind: Option<&str>,
        name: Option<&str>,
        overrides: &Overrides,
    ) -> Result<PreparedRun, BoltError> {
        debug!(machine = %self.machine.name, stage = %Stage::DependencyCheck, "entering stage");
        self.check_dependencies(overrides)?;

        debug!(machine = %self.machine.name, stage = %Stage::OverrideSetup, "entering stage");
        let MergedConfig { config, transport } =
            merge_config(&self.base, kind, name, overrides, self.env, self.machine)?;

        debug!(machine = %self.machine.name, stage = %Stage::Validate, "entering stage");
        let mut errors = validate_run(&config);
        errors.merge(validate_global(self.env.global_config()));
        let errors = errors.prune();
        if !errors.is_empty() {
            warn!(machine = %self.machine.name, errors = errors.len(), "configuration invalid");
            return Err(BoltError::ConfigInvalid(errors));
        }

        debug!(machine = %self.machine.name, stage = %Stage::BuildCommand, "entering stage");
        let command = build_command(&config, transport, self.env.root_path())?;

        Ok(PreparedRun {
            config,
            transport,
            command,
        })
    }

    /// Every declared dependency must be a known, running machine
    fn check_dependencies(&self, overrides: &Overrides) -> Result<(), BoltError> {
        let dependencies = match overrides.get("dependencies") {
            Some(value) => dependency_names(Some(value)),
            None => self.base.dependency_names(),
        };

        for dependency in dependencies {
            let running = self
                .env
                .machine(&dependency)
                .map(Machine::is_running)
                .unwrap_or(false);
            if running {
                continue;
            }

            self.ui
                .error(&messages::dependent_machine_offline(&dependency));
            return Err(BoltError::DependencyNotReady {
                machine: self.machine.name.clone(),
                dependency,
            });
        }

        Ok(())
    }

    /// Launch a rendered command, streaming its output through the UI
    pub async fn execute(&self, command: &BoltCommand) -> Result<ProcessOutput, BoltError> {
        self.ui.info(&messages::running_bolt(&command.masked()));
        info!(machine = %self.machine.name, stage = %Stage::Execute, command = %command.masked(), "launching bolt");

        let env: Vec<(String, String)> = self
            .options
            .original_path
            .iter()
            .map(|path| ("PATH".to_string(), path.clone()))
            .collect();

        let out = self.ui.clone();
        let err = self.ui.clone();
        let output = self
            .executor
            .execute(
                command.argv(),
                &env,
                Box::new(move |line| out.info(&line)),
                Box::new(move |line| err.warn(&line)),
            )
            .await?;

        debug!(machine = %self.machine.name, exit_code = output.exit_code, "bolt finished");

        if output.success() {
            Ok(output)
        } else {
            Err(BoltError::ExecutionFailure {
                command: command.masked(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }
}
