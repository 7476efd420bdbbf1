// Inventory module: machines of the managed environment and their connection facts

mod environment;
mod render;

pub use environment::*;
pub use render::*;

use std::path::Path;

use serde::Deserialize;

use crate::config::{GlobalConfig, TaskConfig};
use crate::output::errors::BoltError;

/// Guest operating system family, which decides the remote transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestKind {
    #[default]
    #[serde(alias = "linux", alias = "unix", alias = "bsd", alias = "darwin", alias = "solaris")]
    Posix,
    Windows,
}

/// Remote-access protocol family used to reach a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Ssh,
    WinRm,
}

impl Transport {
    pub fn for_guest(guest: GuestKind) -> Self {
        match guest {
            GuestKind::Posix => Transport::Ssh,
            GuestKind::Windows => Transport::WinRm,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Ssh => "ssh",
            Transport::WinRm => "winrm",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Lifecycle state reported by the environment
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum MachineState {
    Running,
    PowerOff,
    Saved,
    #[default]
    NotCreated,
    Other(String),
}

impl From<String> for MachineState {
    fn from(state: String) -> Self {
        match state.as_str() {
            "running" => MachineState::Running,
            "poweroff" | "stopped" => MachineState::PowerOff,
            "saved" => MachineState::Saved,
            "not_created" => MachineState::NotCreated,
            _ => MachineState::Other(state),
        }
    }
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineState::Running => f.write_str("running"),
            MachineState::PowerOff => f.write_str("poweroff"),
            MachineState::Saved => f.write_str("saved"),
            MachineState::NotCreated => f.write_str("not_created"),
            MachineState::Other(state) => f.write_str(state),
        }
    }
}

/// SSH connection facts for a POSIX guest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SshInfo {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub private_key_path: Vec<String>,
    #[serde(default)]
    pub verify_host_key: bool,
}

fn default_ssh_port() -> u16 {
    22
}

/// How WinRM talks to the guest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinRmTransport {
    #[default]
    Negotiate,
    Plaintext,
    Ssl,
}

/// WinRM connection facts for a Windows guest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WinRmInfo {
    pub host: String,
    #[serde(default = "default_winrm_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub transport: WinRmTransport,
    #[serde(default)]
    pub ssl_peer_verification: bool,
}

fn default_winrm_port() -> u16 {
    5985
}

/// Connection facts for one machine, for the transport its guest implies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFacts {
    Ssh(SshInfo),
    WinRm(WinRmInfo),
}

impl ConnectionFacts {
    pub fn transport(&self) -> Transport {
        match self {
            ConnectionFacts::Ssh(_) => Transport::Ssh,
            ConnectionFacts::WinRm(_) => Transport::WinRm,
        }
    }

    /// Endpoint URI such as `ssh://127.0.0.1:2222`
    pub fn uri(&self) -> String {
        match self {
            ConnectionFacts::Ssh(info) => format!("ssh://{}:{}", info.host, info.port),
            ConnectionFacts::WinRm(info) => format!("winrm://{}:{}", info.host, info.port),
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            ConnectionFacts::Ssh(info) => info.username.as_deref(),
            ConnectionFacts::WinRm(info) => info.username.as_deref(),
        }
        .filter(|u| !u.is_empty())
    }
}

/// A machine in the managed environment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Machine {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub guest: GuestKind,
    #[serde(default)]
    pub state: MachineState,
    #[serde(default)]
    pub ssh: Option<SshInfo>,
    #[serde(default)]
    pub winrm: Option<WinRmInfo>,
    /// Declared bolt settings for runs against this machine
    #[serde(default)]
    pub bolt: TaskConfig,
}

impl Machine {
    pub fn new(name: impl Into<String>) -> Self {
        Machine {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_guest(mut self, guest: GuestKind) -> Self {
        self.guest = guest;
        self
    }

    pub fn with_state(mut self, state: MachineState) -> Self {
        self.state = state;
        self
    }

    pub fn with_ssh(mut self, info: SshInfo) -> Self {
        self.ssh = Some(info);
        self
    }

    pub fn with_winrm(mut self, info: WinRmInfo) -> Self {
        self.winrm = Some(info);
        self
    }

    pub fn with_bolt(mut self, config: TaskConfig) -> Self {
        self.bolt = config;
        self
    }

    pub fn is_running(&self) -> bool {
        self.state == MachineState::Running
    }

    pub fn transport(&self) -> Transport {
        Transport::for_guest(self.guest)
    }

    /// SSH facts, only available while the machine is up
    pub fn ssh_info(&self) -> Option<&SshInfo> {
        self.ssh.as_ref().filter(|_| self.is_running())
    }

    /// Fetch the connection facts for `transport`.
    ///
    /// Fails with `ConnectionNotReady` when the guest is not booted or its
    /// endpoint is unknown.
    pub fn connection_facts(&self, transport: Transport) -> Result<ConnectionFacts, BoltError> {
        match transport {
            Transport::WinRm => {
                if !self.is_running() {
                    return Err(BoltError::ConnectionNotReady {
                        machine: self.name.clone(),
                        message: format!("The guest is not ready (state: {})", self.state),
                    });
                }
                self.winrm
                    .clone()
                    .map(ConnectionFacts::WinRm)
                    .ok_or_else(|| BoltError::ConnectionNotReady {
                        machine: self.name.clone(),
                        message: "WinRM connection info is not available".to_string(),
                    })
            }
            Transport::Ssh => self
                .ssh_info()
                .cloned()
                .map(ConnectionFacts::Ssh)
                .ok_or_else(|| BoltError::ConnectionNotReady {
                    machine: self.name.clone(),
                    message: "SSH is not ready".to_string(),
                }),
        }
    }
}

/// Live view of the managed environment
pub trait Environment: Send + Sync {
    /// Directory that relative module and project paths resolve against
    fn root_path(&self) -> &Path;

    /// Shared settings layered beneath every machine's config
    fn global_config(&self) -> &GlobalConfig;

    /// Names of every defined machine, in declaration order
    fn machine_names(&self) -> Result<Vec<String>, BoltError>;

    /// Look up a machine by name
    fn machine(&self, name: &str) -> Option<&Machine>;
}
