// Config merging: base config + call-site overrides + connection facts

use tracing::debug;

use super::nodes::{join_nodes, resolve_nodes};
use crate::config::{fill, Overrides, TaskConfig};
use crate::inventory::{ConnectionFacts, Environment, Machine, Transport, WinRmTransport};
use crate::output::errors::BoltError;

/// The effective config for one invocation and the transport it runs over
#[derive(Debug, Clone, PartialEq)]
pub struct MergedConfig {
    pub config: TaskConfig,
    pub transport: Transport,
}

/// Produce the effective config for running `kind`/`name` against `target`.
///
/// `base` is never modified. `kind` and `name` always come from the call
/// site, overrides replace declared values, and the target's connection
/// facts only fill settings that are still unset.
pub fn merge_config(
    base: &TaskConfig,
    kind: Option<&str>,
    name: Option<&str>,
    overrides: &Overrides,
    env: &dyn Environment,
    target: &Machine,
) -> Result<MergedConfig, BoltError> {
    let mut config = base.clone();
    config.kind = kind.map(str::to_string);
    config.name = name.map(str::to_string);

    overrides.apply_to(&mut config)?;

    if config.node_list.is_none() {
        if let Some(nodes) = resolve_nodes(config.nodes.as_ref(), &config.excludes, env)? {
            config.node_list = Some(join_nodes(&nodes));
        }
    }

    let transport = target.transport();
    debug!(machine = %target.name, %transport, "selected transport");

    let facts = target.connection_facts(transport)?;
    fill_connection_facts(&mut config, &facts);

    Ok(MergedConfig { config, transport })
}

/// Fill unset connection settings from the machine's own facts
pub fn fill_connection_facts(config: &mut TaskConfig, facts: &ConnectionFacts) {
    fill(&mut config.node_list, &Some(facts.uri()));
    fill(&mut config.user, &facts.username().map(str::to_string));

    match facts {
        ConnectionFacts::Ssh(info) => {
            fill(&mut config.private_key, &info.private_key_path.first().cloned());
            fill(&mut config.host_key_check, &Some(info.verify_host_key));
        }
        ConnectionFacts::WinRm(info) => {
            fill(&mut config.ssl, &Some(info.transport == WinRmTransport::Ssl));
            fill(&mut config.ssl_verify, &Some(info.ssl_peer_verification));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeSpec;
    use crate::inventory::{GuestKind, MachineState, SshInfo, StaticEnvironment, WinRmInfo};
    use pretty_assertions::assert_eq;

    fn ssh_machine(name: &str) -> Machine {
        Machine::new(name)
            .with_state(MachineState::Running)
            .with_ssh(SshInfo {
                host: "foo".to_string(),
                port: 22,
                username: Some("user".to_string()),
                private_key_path: vec!["path".to_string()],
                verify_host_key: true,
            })
    }

    fn env() -> StaticEnvironment {
        StaticEnvironment::new("/root/path")
            .with_machine(ssh_machine("server"))
            .with_machine(ssh_machine("server2"))
    }

    fn merge(base: &TaskConfig, overrides: &Overrides) -> MergedConfig {
        let env = env();
        let target = env.machine("server").unwrap().clone();
        merge_config(base, Some("task"), Some("foo"), overrides, &env, &target).unwrap()
    }

    #[test]
    fn test_sets_kind_and_name() {
        let base = TaskConfig::new().with_kind("plan").with_name("old");
        let merged = merge(&base, &Overrides::new());
        assert_eq!(merged.config.kind.as_deref(), Some("task"));
        assert_eq!(merged.config.name.as_deref(), Some("foo"));
        assert_eq!(merged.transport, Transport::Ssh);
    }

    #[test]
    fn test_defaults_to_machine_endpoint() {
        let merged = merge(&TaskConfig::new(), &Overrides::new());
        assert_eq!(merged.config.node_list.as_deref(), Some("ssh://foo:22"));
        assert_eq!(merged.config.user.as_deref(), Some("user"));
        assert_eq!(merged.config.private_key.as_deref(), Some("path"));
        assert_eq!(merged.config.host_key_check, Some(true));
    }

    #[test]
    fn test_multiple_nodes() {
        let base = TaskConfig::new().with_nodes(NodeSpec::names(["server", "server2"]));
        let merged = merge(&base, &Overrides::new());
        assert_eq!(merged.config.node_list.as_deref(), Some("server,server2"));
    }

    #[test]
    fn test_all_nodes() {
        let base = TaskConfig::new().with_nodes(NodeSpec::All);
        let merged = merge(&base, &Overrides::new());
        assert_eq!(merged.config.node_list.as_deref(), Some("server,server2"));
    }

    #[test]
    fn test_does_not_override_specified_settings() {
        let base = TaskConfig::new()
            .with_node_list("ssh://test:22")
            .with_user("root");
        let merged = merge(&base, &Overrides::new());
        assert_eq!(merged.config.node_list.as_deref(), Some("ssh://test:22"));
        assert_eq!(merged.config.user.as_deref(), Some("root"));
    }

    #[test]
    fn test_node_list_wins_over_nodes() {
        let base = TaskConfig::new()
            .with_nodes(NodeSpec::All)
            .with_node_list("explicit");
        let merged = merge(&base, &Overrides::new());
        assert_eq!(merged.config.node_list.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_additional_overrides() {
        let merged = merge(&TaskConfig::new(), &Overrides::new().set("password", "foo"));
        assert_eq!(merged.config.password.as_deref(), Some("foo"));
    }

    #[test]
    fn test_base_is_untouched() {
        let base = TaskConfig::new();
        let _ = merge(&base, &Overrides::new().set("user", "x"));
        assert_eq!(base, TaskConfig::new());
    }

    #[test]
    fn test_ssh_not_ready() {
        let env = env();
        let target = Machine::new("down").with_state(MachineState::PowerOff);
        let err = merge_config(
            &TaskConfig::new(),
            Some("task"),
            Some("foo"),
            &Overrides::new(),
            &env,
            &target,
        )
        .unwrap_err();
        assert!(matches!(err, BoltError::ConnectionNotReady { .. }));
    }

    #[test]
    fn test_winrm_facts() {
        let env = env();
        let target = Machine::new("win")
            .with_guest(GuestKind::Windows)
            .with_state(MachineState::Running)
            .with_winrm(WinRmInfo {
                host: "10.0.0.9".to_string(),
                port: 5986,
                username: Some("Administrator".to_string()),
                transport: WinRmTransport::Ssl,
                ssl_peer_verification: true,
            });

        let base = TaskConfig {
            ssl_verify: Some(false),
            ..Default::default()
        };
        let merged =
            merge_config(&base, Some("task"), Some("foo"), &Overrides::new(), &env, &target)
                .unwrap();

        assert_eq!(merged.transport, Transport::WinRm);
        assert_eq!(merged.config.node_list.as_deref(), Some("winrm://10.0.0.9:5986"));
        assert_eq!(merged.config.user.as_deref(), Some("Administrator"));
        assert_eq!(merged.config.ssl, Some(true));
        assert_eq!(merged.config.ssl_verify, Some(false));
        assert!(merged.config.private_key.is_none());
    }
}
