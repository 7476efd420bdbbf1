// YAML-backed environment file

use std::path::{Path, PathBuf};

use serde_yaml::Value as YamlValue;

use super::{Environment, Machine};
use crate::config::GlobalConfig;
use crate::output::errors::BoltError;

/// Default environment file name, looked up in the working directory
pub const DEFAULT_ENV_FILE: &str = "Boltfile.yaml";

/// An environment declared in a YAML file.
///
/// ```yaml
/// root_path: /srv/project
/// bolt:
///   user: vagrant
/// machines:
///   server:
///     guest: linux
///     state: running
///     ssh: { host: 127.0.0.1, port: 2222, username: vagrant }
/// ```
#[derive(Debug, Clone)]
pub struct StaticEnvironment {
    root_path: PathBuf,
    global: GlobalConfig,
    machines: Vec<Machine>,
}

impl StaticEnvironment {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        StaticEnvironment {
            root_path: root_path.into(),
            global: GlobalConfig::default().finalize(),
            machines: Vec::new(),
        }
    }

    pub fn with_global(mut self, global: GlobalConfig) -> Self {
        self.global = global.finalize();
        self
    }

    pub fn with_machine(mut self, machine: Machine) -> Self {
        self.add_machine(machine);
        self
    }

    /// Add a machine, replacing one with the same name
    pub fn add_machine(&mut self, machine: Machine) {
        match self.machines.iter_mut().find(|m| m.name == machine.name) {
            Some(existing) => *existing = machine,
            None => self.machines.push(machine),
        }
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    /// Load an environment file. A relative or missing `root_path` is taken
    /// relative to the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, BoltError> {
        let content = std::fs::read_to_string(path).map_err(|e| BoltError::Io {
            message: format!("Failed to read environment file: {}", e),
            path: Some(path.to_path_buf()),
        })?;

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let base_dir = std::fs::canonicalize(&base_dir).unwrap_or(base_dir);

        Self::parse_str(&content, &base_dir)
    }

    /// Parse an environment from YAML, resolving `root_path` against `base_dir`
    pub fn parse_str(content: &str, base_dir: &Path) -> Result<Self, BoltError> {
        let yaml: YamlValue = serde_yaml::from_str(content).map_err(|e| BoltError::Environment {
            message: format!("Invalid environment YAML: {}", e),
            suggestion: Some("Check the environment file syntax".to_string()),
        })?;

        let map = match &yaml {
            YamlValue::Mapping(map) => map,
            YamlValue::Null => {
                return Ok(StaticEnvironment::new(base_dir));
            }
            _ => {
                return Err(BoltError::Environment {
                    message: "Environment file must be a YAML mapping".to_string(),
                    suggestion: Some("Start with 'machines:'".to_string()),
                });
            }
        };

        let root_path = match map.get("root_path").and_then(|v| v.as_str()) {
            Some(root) => base_dir.join(root),
            None => base_dir.to_path_buf(),
        };

        let global = match map.get("bolt") {
            Some(value) if !value.is_null() => {
                serde_yaml::from_value::<GlobalConfig>(value.clone()).map_err(|e| {
                    BoltError::Environment {
                        message: format!("Invalid 'bolt' settings: {}", e),
                        suggestion: None,
                    }
                })?
            }
            _ => GlobalConfig::default(),
        };

        let mut env = StaticEnvironment::new(root_path).with_global(global);

        if let Some(machines) = map.get("machines") {
            let machines = match machines {
                YamlValue::Mapping(m) => m,
                YamlValue::Null => return Ok(env),
                _ => {
                    return Err(BoltError::Environment {
                        message: "'machines' must be a mapping of machine names".to_string(),
                        suggestion: Some("Use 'machines: { server: { guest: linux } }'".to_string()),
                    });
                }
            };

            for (key, value) in machines {
                let name = key.as_str().ok_or_else(|| BoltError::Environment {
                    message: format!("Machine names must be strings, got {:?}", key),
                    suggestion: None,
                })?;
                env.add_machine(parse_machine(name, value)?);
            }
        }

        Ok(env)
    }
}

fn parse_machine(name: &str, value: &YamlValue) -> Result<Machine, BoltError> {
    let mut machine = if value.is_null() {
        Machine::default()
    } else {
        serde_yaml::from_value::<Machine>(value.clone()).map_err(|e| BoltError::Environment {
            message: format!("Invalid definition for machine '{}': {}", name, e),
            suggestion: None,
        })?
    };
    machine.name = name.to_string();
    Ok(machine)
}

impl Environment for StaticEnvironment {
    fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn global_config(&self) -> &GlobalConfig {
        &self.global
    }

    fn machine_names(&self) -> Result<Vec<String>, BoltError> {
        Ok(self.machines.iter().map(|m| m.name.clone()).collect())
    }

    fn machine(&self, name: &str) -> Option<&Machine> {
        self.machines.iter().find(|m| m.name == name)
    }
}
