// User-facing message catalog

pub fn unknown_settings(keys: &[&str]) -> String {
    format!("The following settings shouldn't exist: {}", keys.join(", "))
}

pub fn invalid_type(kind: &str) -> String {
    format!("Type can only be 'task' or 'plan', not '{}'", kind)
}

pub fn dependencies_not_array() -> String {
    "Dependencies must be specified as an array of machine names".to_string()
}

pub fn type_not_specified() -> String {
    "No type set. Please specify either 'task' or 'plan'".to_string()
}

pub fn no_task_or_plan() -> String {
    "No name set. A task or a plan must be specified to run".to_string()
}

pub fn dependent_machine_offline(name: &str) -> String {
    format!(
        "Dependent machine '{}' is not running. Start it and run again",
        name
    )
}

pub fn running_bolt(command: &str) -> String {
    format!("Running bolt command locally: {}", command)
}

pub fn validation_failed_header() -> &'static str {
    "There are errors in the configuration of this machine. Please fix\nthe following errors and try again:"
}
