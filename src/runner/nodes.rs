// Node set resolution: turn a node spec into an ordered list of names

use std::collections::HashSet;

use crate::config::NodeSpec;
use crate::inventory::Environment;
use crate::output::errors::BoltError;

/// Resolve `spec` into the ordered, de-duplicated node names to target.
///
/// Returns `None` when nothing is selected, meaning the run targets the
/// current machine through its own endpoint. Only `NodeSpec::All`
/// consults the environment.
pub fn resolve_nodes(
    spec: Option<&NodeSpec>,
    excludes: &[String],
    env: &dyn Environment,
) -> Result<Option<Vec<String>>, BoltError> {
    let names = match spec {
        None => return Ok(None),
        Some(spec) if spec.is_empty() => return Ok(None),
        Some(NodeSpec::All) => env.machine_names()?,
        Some(NodeSpec::Names(names)) => names.clone(),
    };

    let mut seen = HashSet::new();
    let nodes = names
        .into_iter()
        .filter(|name| !excludes.contains(name))
        .filter(|name| seen.insert(name.clone()))
        .collect();

    Ok(Some(nodes))
}

/// Join node names into the runner's `-n` argument
pub fn join_nodes(nodes: &[String]) -> String {
    nodes.join(",")
}
