// Human-readable error messages for boltctl

use std::fmt;
use std::io::IsTerminal;
use std::path::PathBuf;

use colored::*;

use crate::config::SettingError;
use crate::runner::ValidationErrors;

/// Color output only on a TTY, and never when NO_COLOR is set
fn should_use_colors() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    std::io::stderr().is_terminal()
}

/// All error types in boltctl
#[derive(Debug)]
pub enum BoltError {
    /// Aggregated validation failure; nothing was built or launched
    ConfigInvalid(ValidationErrors),

    /// A declared dependency is unknown or not running
    DependencyNotReady { machine: String, dependency: String },

    /// The target's endpoint cannot be determined yet
    ConnectionNotReady { machine: String, message: String },

    /// The runner exited non-zero
    ExecutionFailure {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// A call-site override had the wrong shape
    Setting(SettingError),

    /// Environment file or live inventory problems
    Environment {
        message: String,
        suggestion: Option<String>,
    },

    /// I/O errors, including failure to launch the runner
    Io {
        message: String,
        path: Option<PathBuf>,
    },
}

impl BoltError {
    /// Process exit status to report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BoltError::ExecutionFailure { exit_code, .. } if (1..=255).contains(exit_code) => {
                *exit_code
            }
            _ => 1,
        }
    }
}

impl std::error::Error for BoltError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BoltError::Setting(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SettingError> for BoltError {
    fn from(err: SettingError) -> Self {
        BoltError::Setting(err)
    }
}

impl fmt::Display for BoltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !should_use_colors() {
            colored::control::set_override(false);
        }

        match self {
            BoltError::ConfigInvalid(errors) => {
                writeln!(f, "{}: {}", "CONFIG INVALID".red().bold(), errors.summary())?;
                writeln!(f)?;
                write!(f, "{}", errors)
            }

            BoltError::DependencyNotReady {
                machine,
                dependency,
            } => {
                writeln!(
                    f,
                    "{}: dependent machine '{}' is not running",
                    "DEPENDENCY NOT READY".red().bold(),
                    dependency
                )?;
                writeln!(f, "  {} {}", "Machine:".dimmed(), machine)?;
                writeln!(f)?;
                writeln!(
                    f,
                    "{}: Start '{}' and run again",
                    "Hint".yellow().bold(),
                    dependency
                )
            }

            BoltError::ConnectionNotReady { machine, message } => {
                writeln!(f, "{}: {}", "CONNECTION NOT READY".red().bold(), message)?;
                writeln!(f, "  {} {}", "Machine:".dimmed(), machine)?;
                writeln!(f)?;
                writeln!(
                    f,
                    "{}: Make sure the machine is booted and reachable",
                    "Hint".yellow().bold()
                )
            }

            BoltError::ExecutionFailure {
                command,
                exit_code,
                stderr,
            } => {
                writeln!(
                    f,
                    "{}: bolt exited with status {}",
                    "EXECUTION FAILED".red().bold(),
                    exit_code
                )?;
                writeln!(f, "  {} {}", "Command:".dimmed(), command)?;

                if !stderr.is_empty() {
                    writeln!(f)?;
                    writeln!(f, "  {}:", "stderr".dimmed())?;
                    for line in stderr.lines().take(10) {
                        writeln!(f, "    {}", line)?;
                    }
                }

                Ok(())
            }

            BoltError::Setting(err) => {
                writeln!(f, "{}: {}", "SETTING ERROR".red().bold(), err)
            }

            BoltError::Environment {
                message,
                suggestion,
            } => {
                writeln!(f, "{}: {}", "ENVIRONMENT ERROR".red().bold(), message)?;

                if let Some(suggestion) = suggestion {
                    writeln!(f)?;
                    writeln!(f, "{}: {}", "Hint".yellow().bold(), suggestion)?;
                }

                Ok(())
            }

            BoltError::Io { message, path } => {
                writeln!(f, "{}: {}", "I/O ERROR".red().bold(), message)?;
                if let Some(path) = path {
                    writeln!(f, "  {} {}", "Path:".dimmed(), path.display())?;
                }
                Ok(())
            }
        }
    }
}
