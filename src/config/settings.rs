// Call-site overrides applied on top of a machine's base config

use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

use super::{NodeSpec, TaskConfig};

/// Errors raised while applying a single setting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("setting '{key}' expects {expected}, got {found}")]
    InvalidValue {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("invalid override '{0}': expected key=value")]
    Malformed(String),

    #[error("setting '{key}' has unbalanced quotes: {value}")]
    UnbalancedQuotes { key: String, value: String },
}

/// An ordered set of `key => value` overrides for one invocation.
///
/// Overrides win over the declared config. Keys that match no setting are
/// carried into the config and reported by validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    entries: Vec<(String, JsonValue)>,
}

impl Overrides {
    pub fn new() -> Self {
        Overrides::default()
    }

    /// Set a key, replacing an earlier value for the same key
    pub fn set(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Parse a `key=value` assignment. The value is read as YAML, so
    /// `true`, `22` and `[a, b]` keep their types.
    pub fn parse_assignment(assignment: &str) -> Result<(String, JsonValue), SettingError> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| SettingError::Malformed(assignment.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(SettingError::Malformed(assignment.to_string()));
        }

        let value = if raw.is_empty() {
            JsonValue::String(String::new())
        } else {
            serde_yaml::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
        };

        Ok((key.to_string(), value))
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply every override to `config`, in insertion order
    pub fn apply_to(&self, config: &mut TaskConfig) -> Result<(), SettingError> {
        for (key, value) in &self.entries {
            config.set_option(key, value.clone())?;
        }
        Ok(())
    }
}

impl TaskConfig {
    /// Set one setting by name. `null` clears it.
    pub fn set_option(&mut self, key: &str, value: JsonValue) -> Result<(), SettingError> {
        match key {
            "type" => self.kind = opt_string(key, value)?,
            "name" => self.name = opt_string(key, value)?,
            "parameters" => self.parameters = opt_object(key, value)?,
            "nodes" => self.nodes = opt_nodes(key, value)?,
            "excludes" => self.excludes = string_list(key, value)?,
            "node_list" => self.node_list = opt_string(key, value)?,
            "dependencies" => {
                self.dependencies = match value {
                    JsonValue::Null => None,
                    other => Some(other),
                }
            }
            "user" | "username" => self.user = opt_string(key, value)?,
            "password" => self.password = opt_string(key, value)?,
            "private_key" => self.private_key = opt_string(key, value)?,
            "sudo_password" => self.sudo_password = opt_string(key, value)?,
            "host_key_check" => self.host_key_check = opt_bool(key, value)?,
            "ssl" => self.ssl = opt_bool(key, value)?,
            "ssl_verify" => self.ssl_verify = opt_bool(key, value)?,
            "modulepath" => self.modulepath = opt_string(key, value)?,
            "tmpdir" => self.tmpdir = opt_string(key, value)?,
            "run_as" => self.run_as = opt_string(key, value)?,
            "verbose" => self.verbose = opt_bool(key, value)?,
            "debug" => self.debug = opt_bool(key, value)?,
            "args" => self.args = opt_string(key, value)?,
            "bolt_command" => self.bolt_command = opt_string(key, value)?,
            "boltdir" => self.boltdir = opt_string(key, value)?,
            "inventory_file" => self.inventory_file = opt_string(key, value)?,
            _ => {
                self.unknown.insert(key.to_string(), value);
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, expected: &'static str, value: &JsonValue) -> SettingError {
    SettingError::InvalidValue {
        key: key.to_string(),
        expected,
        found: value.to_string(),
    }
}

fn opt_string(key: &str, value: JsonValue) -> Result<Option<String>, SettingError> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::String(s) => Ok(Some(s)),
        JsonValue::Number(n) => Ok(Some(n.to_string())),
        other => Err(invalid(key, "a string", &other)),
    }
}

fn opt_bool(key: &str, value: JsonValue) -> Result<Option<bool>, SettingError> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Bool(b) => Ok(Some(b)),
        other => Err(invalid(key, "a boolean", &other)),
    }
}

fn opt_object(
    key: &str,
    value: JsonValue,
) -> Result<Option<JsonMap<String, JsonValue>>, SettingError> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Object(map) => Ok(Some(map)),
        other => Err(invalid(key, "a mapping", &other)),
    }
}

fn string_list(key: &str, value: JsonValue) -> Result<Vec<String>, SettingError> {
    match value {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::String(s) => Ok(vec![s]),
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| match item {
                JsonValue::String(s) => Ok(s),
                other => Err(invalid(key, "a list of names", &other)),
            })
            .collect(),
        other => Err(invalid(key, "a list of names", &other)),
    }
}

fn opt_nodes(key: &str, value: JsonValue) -> Result<Option<NodeSpec>, SettingError> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::String(name) => Ok(Some(NodeSpec::from_name(name))),
        array @ JsonValue::Array(_) => string_list(key, array).map(|n| Some(NodeSpec::Names(n))),
        other => Err(invalid(key, "a name or a list of names", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overrides_replace_declared_values() {
        let mut config = TaskConfig::new().with_user("declared");
        Overrides::new()
            .set("user", "override")
            .set("run_as", "root")
            .apply_to(&mut config)
            .unwrap();

        assert_eq!(config.user.as_deref(), Some("override"));
        assert_eq!(config.run_as.as_deref(), Some("root"));
    }

    #[test]
    fn test_unknown_override_is_recorded() {
        let mut config = TaskConfig::new();
        Overrides::new()
            .set("foo", "bar")
            .apply_to(&mut config)
            .unwrap();
        assert_eq!(config.unknown_settings(), vec!["foo"]);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let mut config = TaskConfig::new();
        let err = Overrides::new()
            .set("verbose", "yes")
            .apply_to(&mut config)
            .unwrap_err();
        assert!(matches!(err, SettingError::InvalidValue { ref key, .. } if key == "verbose"));
    }

    #[test]
    fn test_null_clears_setting() {
        let mut config = TaskConfig::new().with_user("vagrant");
        config.set_option("user", JsonValue::Null).unwrap();
        assert!(config.user.is_none());
    }

    #[test]
    fn test_nodes_override() {
        let mut config = TaskConfig::new();
        config.set_option("nodes", json!("all")).unwrap();
        assert_eq!(config.nodes, Some(NodeSpec::All));

        config.set_option("nodes", json!(["a", "b"])).unwrap();
        assert_eq!(config.nodes, Some(NodeSpec::names(["a", "b"])));
    }

    #[test]
    fn test_later_set_replaces_earlier() {
        let overrides = Overrides::new().set("user", "a").set("user", "b");
        assert_eq!(overrides.get("user"), Some(&json!("b")));
        assert_eq!(overrides.iter().count(), 1);
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            Overrides::parse_assignment("verbose=true").unwrap(),
            ("verbose".to_string(), json!(true))
        );
        assert_eq!(
            Overrides::parse_assignment("dependencies=[db, cache]").unwrap(),
            ("dependencies".to_string(), json!(["db", "cache"]))
        );
        assert_eq!(
            Overrides::parse_assignment("tmpdir=/tmp/bolt").unwrap(),
            ("tmpdir".to_string(), json!("/tmp/bolt"))
        );
        assert!(Overrides::parse_assignment("novalue").is_err());
        assert!(Overrides::parse_assignment("=x").is_err());
    }
}
