// Bolt command construction

use std::fmt;
use std::path::Path;

use serde_json::Value as JsonValue;

use crate::config::{SettingError, TaskConfig};
use crate::inventory::Transport;

const MASK: &str = "****";

/// A rendered bolt invocation.
///
/// Holds both the display form (one entry per logical token, values in
/// single quotes) and the argv actually launched, which never passes
/// through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoltCommand {
    tokens: Vec<String>,
    masked: Vec<String>,
    argv: Vec<String>,
}

impl BoltCommand {
    fn new(program: &str, argv: Vec<String>) -> Self {
        BoltCommand {
            tokens: vec![program.to_string()],
            masked: vec![program.to_string()],
            argv,
        }
    }

    fn push(&mut self, token: String, masked: String, args: Vec<String>) {
        self.tokens.push(token);
        self.masked.push(masked);
        self.argv.extend(args);
    }

    fn flag(&mut self, flag: &str) {
        self.push(flag.to_string(), flag.to_string(), vec![flag.to_string()]);
    }

    fn quoted(&mut self, flag: &str, value: &str) {
        let token = format!("{} '{}'", flag, value);
        self.push(token.clone(), token, vec![flag.to_string(), value.to_string()]);
    }

    fn secret(&mut self, flag: &str, value: &str) {
        self.push(
            format!("{} '{}'", flag, value),
            format!("{} '{}'", flag, MASK),
            vec![flag.to_string(), value.to_string()],
        );
    }

    fn unquoted(&mut self, flag: &str, value: &str) {
        let token = format!("{} {}", flag, value);
        self.push(token.clone(), token, vec![flag.to_string(), value.to_string()]);
    }

    fn raw(&mut self, args: &str, words: Vec<String>) {
        self.push(args.to_string(), args.to_string(), words);
    }

    /// Logical tokens, in order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Arguments to launch, program first
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Display form with passwords hidden, safe to log
    pub fn masked(&self) -> String {
        self.masked.join(" ")
    }
}

impl fmt::Display for BoltCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

/// Resolve a path setting against the environment root unless it is absolute
fn rooted(root_path: &Path, value: &str) -> String {
    if value.starts_with('/') {
        value.to_string()
    } else {
        root_path.join(value).display().to_string()
    }
}

/// Split a setting into words the way a POSIX shell would
fn shell_split(key: &str, value: &str) -> Result<Vec<String>, SettingError> {
    shell_words::split(value).map_err(|_| SettingError::UnbalancedQuotes {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Render `config` into a bolt command for `transport`.
///
/// Pure: the same config, transport and root always give the same command.
/// `bolt_command` and `args` are split into words with shell quoting rules,
/// which fails only on unbalanced quotes.
pub fn build_command(
    config: &TaskConfig,
    transport: Transport,
    root_path: &Path,
) -> Result<BoltCommand, SettingError> {
    let program = config
        .bolt_command
        .as_deref()
        .unwrap_or(crate::config::DEFAULT_BOLT_COMMAND);
    let program_words = shell_split("bolt_command", program)?;
    if program_words.is_empty() {
        return Err(SettingError::InvalidValue {
            key: "bolt_command".to_string(),
            expected: "a command",
            found: format!("{:?}", program),
        });
    }
    let mut command = BoltCommand::new(program, program_words);

    let kind = config.kind.as_deref().unwrap_or_default();
    let name = config.name.as_deref().unwrap_or_default();
    command.push(
        format!("{} run '{}'", kind, name),
        format!("{} run '{}'", kind, name),
        vec![kind.to_string(), "run".to_string(), name.to_string()],
    );

    if let Some(user) = &config.user {
        command.quoted("-u", user);
    }
    if let Some(password) = &config.password {
        command.secret("-p", password);
    }

    match transport {
        Transport::WinRm => {
            command.flag(if config.ssl == Some(true) { "--ssl" } else { "--no-ssl" });
            command.flag(if config.ssl_verify == Some(true) {
                "--ssl-verify"
            } else {
                "--no-ssl-verify"
            });
        }
        Transport::Ssh => {
            if let Some(key) = &config.private_key {
                command.quoted("--private-key", key);
            }
            command.flag(if config.host_key_check == Some(true) {
                "--host-key-check"
            } else {
                "--no-host-key-check"
            });
            if let Some(password) = &config.sudo_password {
                command.secret("--sudo-password", password);
            }
        }
    }

    if let Some(run_as) = &config.run_as {
        command.unquoted("--run_as", run_as);
    }

    let modulepath = config
        .modulepath
        .as_deref()
        .unwrap_or(crate::config::DEFAULT_MODULEPATH);
    command.quoted("--modulepath", &rooted(root_path, modulepath));

    if let Some(tmpdir) = &config.tmpdir {
        command.quoted("--tmpdir", tmpdir);
    }

    let boltdir = config
        .boltdir
        .as_deref()
        .unwrap_or(crate::config::DEFAULT_BOLTDIR);
    command.quoted("--boltdir", &rooted(root_path, boltdir));

    if let Some(inventory) = &config.inventory_file {
        command.quoted("--inventoryfile", &rooted(root_path, inventory));
    }

    command.quoted("-n", config.node_list.as_deref().unwrap_or_default());

    if let Some(parameters) = &config.parameters {
        let json = JsonValue::Object(parameters.clone()).to_string();
        command.quoted("--params", &json);
    }

    if config.is_verbose() {
        command.flag("--verbose");
    }
    if config.is_debug() {
        command.flag("--debug");
    }

    if let Some(args) = &config.args {
        command.raw(args, shell_split("args", args)?);
    }

    Ok(command)
}
