// Structural validation of bolt configs

use std::fmt;

use serde_json::Value as JsonValue;

use crate::config::{GlobalConfig, RunKind, TaskConfig};
use crate::output::messages;

/// Bucket for per-run and per-machine settings
pub const BOLT_BUCKET: &str = "Bolt";

/// Bucket for the shared settings
pub const GLOBAL_BUCKET: &str = "GlobalBolt";

/// Validation messages grouped into named buckets, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    buckets: Vec<(String, Vec<String>)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors::default()
    }

    /// Add one message to `bucket`; a message already present is not repeated
    pub fn add(&mut self, bucket: &str, message: impl Into<String>) {
        let message = message.into();
        let messages = self.bucket_mut(bucket);
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    /// Register `bucket` even if it ends up with no messages
    pub fn touch(&mut self, bucket: &str) {
        self.bucket_mut(bucket);
    }

    fn bucket_mut(&mut self, bucket: &str) -> &mut Vec<String> {
        let index = match self.buckets.iter().position(|(name, _)| name == bucket) {
            Some(index) => index,
            None => {
                self.buckets.push((bucket.to_string(), Vec::new()));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[index].1
    }

    /// Fold another set of buckets into this one
    pub fn merge(&mut self, other: ValidationErrors) {
        for (bucket, messages) in other.buckets {
            self.touch(&bucket);
            for message in messages {
                self.add(&bucket, message);
            }
        }
    }

    /// Drop buckets that have no messages
    pub fn prune(mut self) -> Self {
        self.buckets.retain(|(_, messages)| !messages.is_empty());
        self
    }

    pub fn get(&self, bucket: &str) -> Option<&[String]> {
        self.buckets
            .iter()
            .find(|(name, _)| name == bucket)
            .map(|(_, messages)| messages.as_slice())
    }

    /// True when no bucket holds a message
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|(_, messages)| messages.is_empty())
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|(_, messages)| messages.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.buckets
            .iter()
            .map(|(name, messages)| (name.as_str(), messages.as_slice()))
    }

    /// One-line summary for error headers
    pub fn summary(&self) -> String {
        match self.len() {
            1 => "1 configuration error".to_string(),
            n => format!("{} configuration errors", n),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", messages::validation_failed_header())?;

        for (bucket, messages) in self.iter().filter(|(_, m)| !m.is_empty()) {
            writeln!(f)?;
            writeln!(f, "{}:", bucket)?;
            for message in messages {
                writeln!(f, "* {}", message)?;
            }
        }

        Ok(())
    }
}

/// Check a config for structural problems.
///
/// A config may name neither a kind nor a name (a machine that declares no
/// default run), but never just one of them.
pub fn validate_config(config: &TaskConfig) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.touch(BOLT_BUCKET);

    let unknown = config.unknown_settings();
    if !unknown.is_empty() {
        errors.add(BOLT_BUCKET, messages::unknown_settings(&unknown));
    }

    if let Some(kind) = &config.kind {
        if RunKind::parse(kind).is_none() {
            errors.add(BOLT_BUCKET, messages::invalid_type(kind));
        }
    }

    if let Some(dependencies) = &config.dependencies {
        if !matches!(dependencies, JsonValue::Array(_)) {
            errors.add(BOLT_BUCKET, messages::dependencies_not_array());
        }
    }

    match (&config.kind, &config.name) {
        (None, Some(_)) => errors.add(BOLT_BUCKET, messages::type_not_specified()),
        (Some(_), None) => errors.add(BOLT_BUCKET, messages::no_task_or_plan()),
        _ => {}
    }

    errors
}

/// Check a config that is about to run: on top of the structural rules,
/// both the kind and the name must be set.
pub fn validate_run(config: &TaskConfig) -> ValidationErrors {
    let mut errors = validate_config(config);

    if config.kind.is_none() {
        errors.add(BOLT_BUCKET, messages::type_not_specified());
    }
    if config.name.is_none() {
        errors.add(BOLT_BUCKET, messages::no_task_or_plan());
    }

    errors
}

/// Check the shared settings
pub fn validate_global(config: &GlobalConfig) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.touch(GLOBAL_BUCKET);

    let unknown = config.unknown_settings();
    if !unknown.is_empty() {
        errors.add(GLOBAL_BUCKET, messages::unknown_settings(&unknown));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use serde_json::json;

    fn config(kind: Option<&str>, name: Option<&str>) -> TaskConfig {
        TaskConfig {
            kind: kind.map(str::to_string),
            name: name.map(str::to_string),
            ..Default::default()
        }
    }

    fn bolt_messages(errors: &ValidationErrors) -> Vec<String> {
        errors.get(BOLT_BUCKET).unwrap_or_default().to_vec()
    }

    #[test]
    fn test_kind_and_name_valid() {
        let errors = validate_config(&config(Some("task"), Some("foo")));
        assert!(errors.is_empty());
        assert!(errors.prune().get(BOLT_BUCKET).is_none());
    }

    #[test]
    fn test_kind_without_name() {
        let errors = validate_config(&config(Some("task"), None));
        assert_eq!(bolt_messages(&errors), vec![messages::no_task_or_plan()]);
    }

    #[test]
    fn test_name_without_kind() {
        let errors = validate_config(&config(None, Some("foo")));
        assert_eq!(bolt_messages(&errors), vec![messages::type_not_specified()]);
    }

    #[test]
    fn test_neither_kind_nor_name_is_structurally_valid() {
        assert!(validate_config(&config(None, None)).is_empty());
    }

    #[test]
    fn test_invalid_kind() {
        let errors = validate_config(&config(Some("bogus"), Some("foo")));
        assert_eq!(bolt_messages(&errors), vec![messages::invalid_type("bogus")]);
    }

    #[test]
    fn test_dependencies_must_be_a_list() {
        let mut cfg = config(Some("task"), Some("foo"));
        cfg.dependencies = Some(json!("db"));
        let errors = validate_config(&cfg);
        assert_eq!(bolt_messages(&errors), vec![messages::dependencies_not_array()]);

        let cfg = config(Some("task"), Some("foo")).with_dependencies(["db"]);
        assert!(validate_config(&cfg).is_empty());
    }

    #[test]
    fn test_unknown_settings_reported() {
        let mut cfg = config(Some("task"), Some("foo"));
        Overrides::new()
            .set("foo", "bar")
            .apply_to(&mut cfg)
            .unwrap();
        let errors = validate_config(&cfg);
        assert_eq!(
            bolt_messages(&errors),
            vec!["The following settings shouldn't exist: foo".to_string()]
        );
    }

    #[test]
    fn test_run_requires_kind_and_name() {
        let errors = validate_run(&config(None, None));
        assert_eq!(
            bolt_messages(&errors),
            vec![messages::type_not_specified(), messages::no_task_or_plan()]
        );

        let errors = validate_run(&config(Some("task"), None));
        assert_eq!(bolt_messages(&errors), vec![messages::no_task_or_plan()]);
    }

    #[test]
    fn test_global_validation() {
        let errors = validate_global(&GlobalConfig::default().finalize());
        assert!(errors.is_empty());
        assert_eq!(errors.get(GLOBAL_BUCKET), Some(&[][..]));

        let global: GlobalConfig = serde_yaml::from_str("foo: bar").unwrap();
        let errors = validate_global(&global);
        assert_eq!(
            errors.get(GLOBAL_BUCKET).unwrap(),
            &["The following settings shouldn't exist: foo".to_string()]
        );
    }

    #[test]
    fn test_merge_and_prune() {
        let mut errors = validate_config(&config(Some("task"), Some("foo")));
        errors.merge(validate_global(&GlobalConfig::default()));
        assert_eq!(errors.iter().count(), 2);

        let pruned = errors.prune();
        assert_eq!(pruned.iter().count(), 0);
        assert!(pruned.is_empty());
    }

    #[test]
    fn test_report_rendering() {
        let errors = validate_run(&config(None, Some("foo")));
        let report = errors.prune().to_string();
        assert!(report.starts_with("There are errors"));
        assert!(report.contains("Bolt:\n* No type set"));
        assert!(!report.contains("GlobalBolt"));
    }
}
