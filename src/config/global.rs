// Shared bolt settings applied beneath every machine's declared config

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use super::{DEFAULT_BOLTDIR, DEFAULT_BOLT_COMMAND, DEFAULT_MODULEPATH};

/// Transport-keyed connection settings for the runner's inventory
pub type InventoryConfig = BTreeMap<String, JsonMap<String, JsonValue>>;

const SSH_SETTINGS: &[&str] = &[
    "user",
    "password",
    "run_as",
    "port",
    "private_key",
    "host_key_check",
    "sudo_password",
];

const WINRM_SETTINGS: &[&str] = &["user", "password", "run_as", "ssl", "ssl_verify", "port"];

const TRANSPORT_SETTINGS: &[(&str, &[&str])] = &[("ssh", SSH_SETTINGS), ("winrm", WINRM_SETTINGS)];

/// Process-wide settings, read-only once finalized
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub bolt_command: Option<String>,
    pub boltdir: Option<String>,
    pub host_key_check: Option<bool>,
    pub modulepath: Option<String>,
    #[serde(alias = "username")]
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub private_key: Option<String>,
    pub run_as: Option<String>,
    pub sudo_password: Option<String>,
    pub ssl: Option<bool>,
    pub ssl_verify: Option<bool>,
    pub tmpdir: Option<String>,
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub(crate) unknown: BTreeMap<String, JsonValue>,
}

impl GlobalConfig {
    /// Apply compiled-in defaults for the settings that have one
    pub fn finalize(mut self) -> Self {
        self.bolt_command
            .get_or_insert_with(|| DEFAULT_BOLT_COMMAND.to_string());
        self.boltdir.get_or_insert_with(|| DEFAULT_BOLTDIR.to_string());
        self.modulepath
            .get_or_insert_with(|| DEFAULT_MODULEPATH.to_string());
        self
    }

    pub fn unknown_settings(&self) -> Vec<&str> {
        self.unknown.keys().map(String::as_str).collect()
    }

    fn setting(&self, key: &str) -> Option<JsonValue> {
        match key {
            "user" => self.user.as_ref().map(|v| json!(v)),
            "password" => self.password.as_ref().map(|v| json!(v)),
            "run_as" => self.run_as.as_ref().map(|v| json!(v)),
            "port" => self.port.map(|v| json!(v)),
            "private_key" => self.private_key.as_ref().map(|v| json!(v)),
            "host_key_check" => self.host_key_check.map(|v| json!(v)),
            "sudo_password" => self.sudo_password.as_ref().map(|v| json!(v)),
            "ssl" => self.ssl.map(|v| json!(v)),
            "ssl_verify" => self.ssl_verify.map(|v| json!(v)),
            _ => None,
        }
    }

    /// Generate the transport sections of a bolt inventory.
    ///
    /// Each transport only carries the settings it understands, with
    /// underscores turned into hyphens. Unset settings are left out, and a
    /// transport with nothing set is omitted entirely.
    pub fn inventory_config(&self) -> InventoryConfig {
        let mut configs = InventoryConfig::new();

        for (transport, settings) in TRANSPORT_SETTINGS {
            for key in settings.iter() {
                if let Some(value) = self.setting(key) {
                    configs
                        .entry(transport.to_string())
                        .or_default()
                        .insert(key.replace('_', "-"), value);
                }
            }
        }

        configs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> GlobalConfig {
        GlobalConfig {
            password: Some("foo".to_string()),
            run_as: Some("root".to_string()),
            port: Some(22),
            ssl: Some(false),
            host_key_check: Some(false),
            ..Default::default()
        }
        .finalize()
    }

    #[test]
    fn test_defaults() {
        let config = GlobalConfig::default().finalize();
        assert_eq!(config.modulepath.as_deref(), Some("modules"));
        assert_eq!(config.bolt_command.as_deref(), Some("bolt"));
        assert_eq!(config.boltdir.as_deref(), Some("."));
        assert!(config.user.is_none());
        assert!(config.ssl.is_none());
        assert!(config.host_key_check.is_none());
        assert!(config.verbose.is_none());
    }

    #[test]
    fn test_finalize_keeps_explicit_values() {
        let config = GlobalConfig {
            boltdir: Some("/srv/bolt".to_string()),
            ..Default::default()
        }
        .finalize();
        assert_eq!(config.boltdir.as_deref(), Some("/srv/bolt"));
    }

    #[test]
    fn test_inventory_config_structure() {
        let inventory = sample().inventory_config();

        let ssh = &inventory["ssh"];
        assert_eq!(ssh["password"], json!("foo"));
        assert_eq!(ssh["port"], json!(22));
        assert_eq!(ssh["run-as"], json!("root"));
        assert_eq!(ssh["host-key-check"], json!(false));
        assert_eq!(ssh.len(), 4);

        let winrm = &inventory["winrm"];
        assert_eq!(winrm["password"], json!("foo"));
        assert_eq!(winrm["port"], json!(22));
        assert_eq!(winrm["run-as"], json!("root"));
        assert_eq!(winrm["ssl"], json!(false));
        assert_eq!(winrm.len(), 4);
    }

    #[test]
    fn test_inventory_config_omits_empty_transport() {
        let config = GlobalConfig {
            sudo_password: Some("secret".to_string()),
            ..Default::default()
        };
        let inventory = config.inventory_config();
        assert!(inventory.contains_key("ssh"));
        assert!(!inventory.contains_key("winrm"));
    }

    #[test]
    fn test_unknown_settings_from_yaml() {
        let config: GlobalConfig = serde_yaml::from_str("foo: bar\nuser: vagrant\n").unwrap();
        assert_eq!(config.unknown_settings(), vec!["foo"]);
        assert_eq!(config.user.as_deref(), Some("vagrant"));
    }
}
