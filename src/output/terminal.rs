// Terminal output for a machine's runs

use std::io::IsTerminal;

use colored::*;

/// Prints machine-prefixed status lines.
///
/// Cheap to clone so it can be moved into output callbacks.
#[derive(Debug, Clone)]
pub struct TerminalOutput {
    machine: String,
    quiet: bool,
}

impl TerminalOutput {
    pub fn new(machine: impl Into<String>, quiet: bool) -> Self {
        // https://no-color.org/
        if std::env::var("NO_COLOR").is_ok() || !std::io::stdout().is_terminal() {
            colored::control::set_override(false);
        }

        TerminalOutput {
            machine: machine.into(),
            quiet,
        }
    }

    fn prefix(&self) -> ColoredString {
        format!("==> {}:", self.machine).bold()
    }

    /// Prefix `line`, styled by `style`; a blank line keeps just the prefix
    fn format_line(&self, line: &str, style: fn(&str) -> ColoredString) -> String {
        if line.is_empty() {
            self.prefix().to_string()
        } else {
            format!("{} {}", self.prefix(), style(line))
        }
    }

    /// Informational line on stdout
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        for line in split_lines(message) {
            println!("{}", self.format_line(line, |l| l.normal()));
        }
    }

    /// Warning line on stderr
    pub fn warn(&self, message: &str) {
        for line in split_lines(message) {
            eprintln!("{}", self.format_line(line, |l| l.yellow()));
        }
    }

    /// Error line on stderr
    pub fn error(&self, message: &str) {
        for line in split_lines(message) {
            eprintln!("{}", self.format_line(line, |l| l.red().bold()));
        }
    }
}

/// Lines of `message`; an empty message is one blank line
fn split_lines(message: &str) -> Vec<&str> {
    if message.is_empty() {
        vec![""]
    } else {
        message.lines().collect()
    }
}
