// Render a bolt inventory document for the running machines

use serde_json::{json, Map as JsonMap, Value as JsonValue};
use tracing::debug;

use super::{ConnectionFacts, Environment, WinRmTransport};
use crate::output::errors::BoltError;

/// Per-node connection settings, keyed the way the runner's inventory expects
fn node_config(facts: &ConnectionFacts) -> JsonValue {
    let mut settings = JsonMap::new();
    match facts {
        ConnectionFacts::Ssh(info) => {
            if let Some(user) = facts.username() {
                settings.insert("user".to_string(), json!(user));
            }
            settings.insert("port".to_string(), json!(info.port));
            if let Some(key) = info.private_key_path.first() {
                settings.insert("private-key".to_string(), json!(key));
            }
            settings.insert("host-key-check".to_string(), json!(info.verify_host_key));
        }
        ConnectionFacts::WinRm(info) => {
            if let Some(user) = facts.username() {
                settings.insert("user".to_string(), json!(user));
            }
            settings.insert("port".to_string(), json!(info.port));
            settings.insert(
                "ssl".to_string(),
                json!(info.transport == WinRmTransport::Ssl),
            );
            settings.insert("ssl-verify".to_string(), json!(info.ssl_peer_verification));
        }
    }

    let transport = facts.transport().as_str();
    let mut config = JsonMap::new();
    config.insert("transport".to_string(), json!(transport));
    config.insert(transport.to_string(), JsonValue::Object(settings));
    JsonValue::Object(config)
}

/// Build the inventory document: the shared transport config plus one node
/// per reachable machine, addressed by URI and aliased by machine name.
///
/// Machines whose endpoint cannot be determined yet are skipped.
pub fn inventory_document(env: &dyn Environment) -> Result<JsonValue, BoltError> {
    let mut nodes = Vec::new();

    for name in env.machine_names()? {
        let Some(machine) = env.machine(&name) else {
            continue;
        };

        match machine.connection_facts(machine.transport()) {
            Ok(facts) => nodes.push(json!({
                "name": facts.uri(),
                "alias": name,
                "config": node_config(&facts),
            })),
            Err(e) => debug!(machine = %name, error = ?e, "skipping machine without connection facts"),
        }
    }

    let mut document = JsonMap::new();
    let config = env.global_config().inventory_config();
    if !config.is_empty() {
        document.insert("config".to_string(), json!(config));
    }
    document.insert("nodes".to_string(), JsonValue::Array(nodes));

    Ok(JsonValue::Object(document))
}

/// The inventory document as YAML text
pub fn render_inventory(env: &dyn Environment) -> Result<String, BoltError> {
    let document = inventory_document(env)?;
    serde_yaml::to_string(&document).map_err(|e| BoltError::Environment {
        message: format!("Failed to render inventory: {}", e),
        suggestion: None,
    })
}
