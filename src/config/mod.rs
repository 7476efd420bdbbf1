// Bolt run configuration: declared settings, layering and defaults

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

pub mod global;
pub mod settings;

pub use global::{GlobalConfig, InventoryConfig};
pub use settings::{Overrides, SettingError};

/// Default runner executable, resolved through PATH
pub const DEFAULT_BOLT_COMMAND: &str = "bolt";

/// Default module path, relative to the environment root
pub const DEFAULT_MODULEPATH: &str = "modules";

/// Default bolt project directory, relative to the environment root
pub const DEFAULT_BOLTDIR: &str = ".";

/// What kind of unit the runner executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Task,
    Plan,
}

impl RunKind {
    /// Parse a kind name; only `task` and `plan` are recognized
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "task" => Some(RunKind::Task),
            "plan" => Some(RunKind::Plan),
            _ => None,
        }
    }
}

/// Which machines a run targets
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawNodeSpec")]
pub enum NodeSpec {
    /// Every machine defined in the active environment
    All,
    /// Explicit machine names, in declaration order
    Names(Vec<String>),
}

/// A node spec as written: one name or a list of names
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNodeSpec {
    One(String),
    Many(Vec<String>),
}

impl From<RawNodeSpec> for NodeSpec {
    fn from(raw: RawNodeSpec) -> Self {
        match raw {
            RawNodeSpec::One(name) => NodeSpec::from_name(name),
            RawNodeSpec::Many(names) => NodeSpec::Names(names),
        }
    }
}

impl NodeSpec {
    /// A single name; the literal `all` selects every machine
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == "all" {
            NodeSpec::All
        } else {
            NodeSpec::Names(vec![name])
        }
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NodeSpec::Names(names.into_iter().map(Into::into).collect())
    }

    /// True when nothing is selected and the target machine should be used
    pub fn is_empty(&self) -> bool {
        matches!(self, NodeSpec::Names(names) if names.is_empty())
    }
}

/// Settings for one bolt invocation.
///
/// A machine declares one of these as its base; each run clones it, so
/// nothing done during a run leaks into the next one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// `task` or `plan`; kept as written so bad values can be reported
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub parameters: Option<JsonMap<String, JsonValue>>,
    pub nodes: Option<NodeSpec>,
    pub excludes: Vec<String>,
    /// Comma-joined node list handed to `-n`; never recomputed once set
    pub node_list: Option<String>,
    /// Machines that must be running first. Kept untyped so a scalar can be reported.
    pub dependencies: Option<JsonValue>,
    #[serde(alias = "username")]
    pub user: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub sudo_password: Option<String>,
    pub host_key_check: Option<bool>,
    pub ssl: Option<bool>,
    pub ssl_verify: Option<bool>,
    pub modulepath: Option<String>,
    pub tmpdir: Option<String>,
    pub run_as: Option<String>,
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
    /// Extra arguments appended verbatim
    pub args: Option<String>,
    pub bolt_command: Option<String>,
    pub boltdir: Option<String>,
    pub inventory_file: Option<String>,
    /// Keys that matched no known setting
    #[serde(flatten)]
    pub(crate) unknown: BTreeMap<String, JsonValue>,
}

/// Adopt `value` only when `slot` is still unset
pub(crate) fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

impl TaskConfig {
    pub fn new() -> Self {
        TaskConfig::default()
    }

    /// Build the base config for a machine: its declared settings, then the
    /// shared settings for anything left unset, then the compiled-in defaults.
    pub fn layered(declared: &TaskConfig, global: &GlobalConfig) -> Self {
        let mut config = declared.clone();
        config.fill_from_global(global);
        config.apply_defaults();
        config
    }

    /// Fill unset fields from the shared settings
    pub fn fill_from_global(&mut self, global: &GlobalConfig) {
        fill(&mut self.user, &global.user);
        fill(&mut self.password, &global.password);
        fill(&mut self.private_key, &global.private_key);
        fill(&mut self.sudo_password, &global.sudo_password);
        fill(&mut self.host_key_check, &global.host_key_check);
        fill(&mut self.ssl, &global.ssl);
        fill(&mut self.ssl_verify, &global.ssl_verify);
        fill(&mut self.modulepath, &global.modulepath);
        fill(&mut self.tmpdir, &global.tmpdir);
        fill(&mut self.run_as, &global.run_as);
        fill(&mut self.verbose, &global.verbose);
        fill(&mut self.debug, &global.debug);
        fill(&mut self.bolt_command, &global.bolt_command);
        fill(&mut self.boltdir, &global.boltdir);
    }

    pub fn apply_defaults(&mut self) {
        self.bolt_command
            .get_or_insert_with(|| DEFAULT_BOLT_COMMAND.to_string());
        self.modulepath
            .get_or_insert_with(|| DEFAULT_MODULEPATH.to_string());
        self.boltdir.get_or_insert_with(|| DEFAULT_BOLTDIR.to_string());
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_nodes(mut self, nodes: NodeSpec) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn with_node_list(mut self, node_list: impl Into<String>) -> Self {
        self.node_list = Some(node_list.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .map(|n| JsonValue::String(n.into()))
            .collect();
        self.dependencies = Some(JsonValue::Array(names));
        self
    }

    /// Names of unrecognized settings, sorted
    pub fn unknown_settings(&self) -> Vec<&str> {
        self.unknown.keys().map(String::as_str).collect()
    }

    /// Dependency names when `dependencies` is a list; scalars yield nothing
    pub fn dependency_names(&self) -> Vec<String> {
        dependency_names(self.dependencies.as_ref())
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }

    pub fn is_debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }
}

pub(crate) fn dependency_names(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| match item {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_node_spec_from_yaml() {
        let all: NodeSpec = serde_yaml::from_str("all").unwrap();
        assert_eq!(all, NodeSpec::All);

        let one: NodeSpec = serde_yaml::from_str("server").unwrap();
        assert_eq!(one, NodeSpec::names(["server"]));

        let many: NodeSpec = serde_yaml::from_str("[server, server2]").unwrap();
        assert_eq!(many, NodeSpec::names(["server", "server2"]));
    }

    #[test]
    fn test_declared_config_collects_unknown_keys() {
        let yaml = r#"
type: task
name: facts
username: vagrant
parameters:
  packages: [vim, git]
  force: true
bogus: 1
another: x
"#;
        let config: TaskConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.kind.as_deref(), Some("task"));
        assert_eq!(config.user.as_deref(), Some("vagrant"));
        assert_eq!(config.unknown_settings(), vec!["another", "bogus"]);

        let params = config.parameters.unwrap();
        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["packages", "force"]);
    }

    #[test]
    fn test_layering_precedence() {
        let global = GlobalConfig {
            user: Some("global".to_string()),
            run_as: Some("root".to_string()),
            modulepath: Some("site".to_string()),
            ..Default::default()
        }
        .finalize();

        let declared = TaskConfig::new().with_user("declared");
        let config = TaskConfig::layered(&declared, &global);

        assert_eq!(config.user.as_deref(), Some("declared"));
        assert_eq!(config.run_as.as_deref(), Some("root"));
        assert_eq!(config.modulepath.as_deref(), Some("site"));
        assert_eq!(config.boltdir.as_deref(), Some("."));
        assert_eq!(config.bolt_command.as_deref(), Some("bolt"));
    }

    #[test]
    fn test_layering_never_mutates_declared() {
        let declared = TaskConfig::new();
        let _ = TaskConfig::layered(&declared, &GlobalConfig::default().finalize());
        assert_eq!(declared, TaskConfig::new());
    }

    #[test]
    fn test_dependency_names() {
        let config = TaskConfig::new().with_dependencies(["db", "cache"]);
        assert_eq!(config.dependency_names(), vec!["db", "cache"]);

        let scalar = TaskConfig {
            dependencies: Some(JsonValue::String("db".to_string())),
            ..Default::default()
        };
        assert!(scalar.dependency_names().is_empty());
    }
}
