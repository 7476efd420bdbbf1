// boltctl CLI - run bolt tasks and plans against managed machines

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::*;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use tracing_subscriber::EnvFilter;

use boltctl::config::Overrides;
use boltctl::executor::LocalProcess;
use boltctl::inventory::{render_inventory, Environment, StaticEnvironment, DEFAULT_ENV_FILE};
use boltctl::output::{BoltError, TerminalOutput};
use boltctl::runner::{
    validate_config, validate_global, Runner, RunnerOptions, ValidationErrors,
};

#[derive(Parser)]
#[command(
    name = "boltctl",
    about = "Run bolt tasks and plans against managed machines",
    version,
    author,
    disable_colored_help = true,
    term_width = 0,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the environment file
    #[arg(short = 'f', long, global = true, env = "BOLTCTL_ENV_FILE", default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Log level or filter directives (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Quiet mode - only show errors and bolt's stderr
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
#[command(disable_colored_help = true)]
enum Commands {
    /// Run a task or plan on behalf of a machine
    Run {
        #[command(flatten)]
        run: RunArgs,

        /// Print the bolt command instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the bolt command a run would launch
    Command {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Validate the shared settings and each machine's declared settings
    Validate {
        /// Only validate this machine
        #[arg(short, long)]
        machine: Option<String>,
    },

    /// Print the bolt inventory for the running machines
    Inventory {
        /// Only print the shared transport settings
        #[arg(long)]
        fragment: bool,
    },

    /// List machines in the environment
    Machines,
}

#[derive(Args)]
struct RunArgs {
    /// What to run: task or plan
    kind: String,

    /// Name of the task or plan
    name: String,

    /// Machine whose settings and connection facts are used
    #[arg(short, long)]
    machine: String,

    /// Target nodes: comma-separated machine names, or "all"
    #[arg(short, long)]
    nodes: Option<String>,

    /// Machine names to leave out (comma-separated, can repeat)
    #[arg(short = 'x', long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// User to authenticate as
    #[arg(short, long)]
    user: Option<String>,

    /// Password to authenticate with (insecure - prefer --ask-pass)
    #[arg(long)]
    password: Option<String>,

    /// Prompt for the password
    #[arg(short = 'k', long)]
    ask_pass: bool,

    /// Sudo password (insecure - prefer --ask-sudo-pass)
    #[arg(long)]
    sudo_password: Option<String>,

    /// Prompt for the sudo password
    #[arg(short = 'K', long)]
    ask_sudo_pass: bool,

    /// Path to the SSH private key
    #[arg(long)]
    private_key: Option<PathBuf>,

    /// User to run as using privilege escalation
    #[arg(long)]
    run_as: Option<String>,

    /// Directory for temporary files on the target
    #[arg(long)]
    tmpdir: Option<String>,

    /// Task or plan parameter as key=value (can repeat)
    #[arg(short = 'p', long = "param")]
    params: Vec<String>,

    /// Any bolt setting as key=value, e.g. host_key_check=true (can repeat)
    #[arg(short = 's', long = "set")]
    settings: Vec<String>,

    /// Pass --verbose to bolt
    #[arg(long)]
    verbose_bolt: bool,

    /// Pass --debug to bolt
    #[arg(long)]
    debug_bolt: bool,

    /// Extra arguments appended to the bolt command
    #[arg(long, allow_hyphen_values = true)]
    args: Option<String>,
}

impl RunArgs {
    /// Collect call-site overrides; dedicated flags win over `--set`
    fn overrides(&self) -> anyhow::Result<Overrides> {
        let mut overrides = Overrides::new();

        for assignment in &self.settings {
            let (key, value) = Overrides::parse_assignment(assignment).map_err(BoltError::from)?;
            overrides.insert(key, value);
        }

        if !self.params.is_empty() {
            let mut params = JsonMap::new();
            for assignment in &self.params {
                let (key, value) =
                    Overrides::parse_assignment(assignment).map_err(BoltError::from)?;
                params.insert(key, value);
            }
            overrides.insert("parameters", JsonValue::Object(params));
        }

        if let Some(nodes) = &self.nodes {
            let value = if nodes == "all" {
                json!("all")
            } else {
                json!(nodes
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .collect::<Vec<_>>())
            };
            overrides.insert("nodes", value);
        }
        if !self.exclude.is_empty() {
            overrides.insert("excludes", json!(self.exclude));
        }

        if let Some(user) = &self.user {
            overrides.insert("user", user.as_str());
        }
        if let Some(password) = &self.password {
            overrides.insert("password", password.as_str());
        } else if self.ask_pass {
            let password =
                rpassword::prompt_password("Password: ").context("Failed to read password")?;
            overrides.insert("password", password);
        }
        if let Some(password) = &self.sudo_password {
            overrides.insert("sudo_password", password.as_str());
        } else if self.ask_sudo_pass {
            let password = rpassword::prompt_password("Sudo password: ")
                .context("Failed to read sudo password")?;
            overrides.insert("sudo_password", password);
        }
        if let Some(key) = &self.private_key {
            overrides.insert("private_key", key.display().to_string());
        }
        if let Some(run_as) = &self.run_as {
            overrides.insert("run_as", run_as.as_str());
        }
        if let Some(tmpdir) = &self.tmpdir {
            overrides.insert("tmpdir", tmpdir.as_str());
        }
        if self.verbose_bolt {
            overrides.insert("verbose", true);
        }
        if self.debug_bolt {
            overrides.insert("debug", true);
        }
        if let Some(args) = &self.args {
            overrides.insert("args", args.as_str());
        }

        Ok(overrides)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let result = match &cli.command {
        Commands::Run { run, dry_run } => {
            run_bolt(&cli.env_file, run, *dry_run, cli.quiet).await
        }
        Commands::Command { run } => run_bolt(&cli.env_file, run, true, cli.quiet).await,
        Commands::Validate { machine } => validate_environment(&cli.env_file, machine.as_deref()),
        Commands::Inventory { fragment } => print_inventory(&cli.env_file, *fragment),
        Commands::Machines => list_machines(&cli.env_file),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        let code = e.downcast_ref::<BoltError>().map(BoltError::exit_code).unwrap_or(1);
        std::process::exit(code);
    }
}

/// Logs go to stderr; the level comes from --log-level, then BOLTCTL_LOG
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env("BOLTCTL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_environment(path: &Path) -> Result<StaticEnvironment, BoltError> {
    StaticEnvironment::from_file(path)
}

async fn run_bolt(env_file: &Path, run: &RunArgs, dry_run: bool, quiet: bool) -> anyhow::Result<()> {
    let env = load_environment(env_file)?;
    let machine = env.machine(&run.machine).ok_or_else(|| BoltError::Environment {
        message: format!("Unknown machine '{}'", run.machine),
        suggestion: Some(format!(
            "Known machines: {}",
            env.machine_names().unwrap_or_default().join(", ")
        )),
    })?;

    let overrides = run.overrides()?;
    let executor = LocalProcess::new();
    let runner = Runner::new(&env, machine, &executor)
        .with_output(TerminalOutput::new(machine.name.clone(), quiet))
        .with_options(RunnerOptions::from_env());

    if dry_run {
        let prepared = runner.prepare(Some(run.kind.as_str()), Some(run.name.as_str()), &overrides)?;
        println!("{}", prepared.command.masked());
        return Ok(());
    }

    runner
        .run(Some(run.kind.as_str()), Some(run.name.as_str()), &overrides)
        .await?;
    Ok(())
}

fn validate_environment(env_file: &Path, only: Option<&str>) -> anyhow::Result<()> {
    let env = load_environment(env_file)?;
    let mut errors = validate_global(env.global_config());

    let machines: Vec<_> = match only {
        Some(name) => vec![env.machine(name).ok_or_else(|| BoltError::Environment {
            message: format!("Unknown machine '{}'", name),
            suggestion: None,
        })?],
        None => env.machines().iter().collect(),
    };

    for machine in machines {
        let mut machine_errors = ValidationErrors::new();
        for (bucket, messages) in validate_config(&machine.bolt).iter() {
            let bucket = format!("{} ({})", bucket, machine.name);
            for message in messages {
                machine_errors.add(&bucket, message.clone());
            }
        }
        errors.merge(machine_errors);
    }

    let errors = errors.prune();
    if !errors.is_empty() {
        return Err(BoltError::ConfigInvalid(errors).into());
    }

    println!("{} {}", "✓".green(), "Configuration is valid");
    Ok(())
}

fn print_inventory(env_file: &Path, fragment: bool) -> anyhow::Result<()> {
    let env = load_environment(env_file)?;
    let yaml = if fragment {
        serde_yaml::to_string(&env.global_config().inventory_config())
            .context("Failed to render inventory fragment")?
    } else {
        render_inventory(&env)?
    };
    print!("{}", yaml);
    Ok(())
}

fn list_machines(env_file: &Path) -> anyhow::Result<()> {
    let env = load_environment(env_file)?;

    for machine in env.machines() {
        let endpoint = machine
            .connection_facts(machine.transport())
            .map(|facts| facts.uri())
            .unwrap_or_else(|_| "-".to_string());
        let state = if machine.is_running() {
            machine.state.to_string().green()
        } else {
            machine.state.to_string().yellow()
        };

        println!(
            "{:<20} {:<8} {:<12} {}",
            machine.name.bold(),
            machine.transport(),
            state,
            endpoint.dimmed()
        );
    }

    Ok(())
}
