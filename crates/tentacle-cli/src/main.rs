//! Tentacle CLI
//!
//! The `tentacle` command provisions a master/slave droplet fleet and starts
//! the tentacular proxy on it.
//!
//! ## Commands
//!
//! - `list`: Show every droplet with its derived role and addresses
//! - `delete`: Delete every droplet in the account
//! - `create`: Create one master and N slaves
//! - `install`: Launch the proxy on the master and/or slaves over SSH

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};

use tentacle_cloud::{DigitalOceanClient, DigitalOceanConfig};
use tentacle_core::{
    classify, classify_strict, create_fleet, delete_all, expand_home, CancellationToken,
    FailurePolicy, FleetOrchestrator, FleetProvider, Machine, NodeStatus, RemoteExecutor,
    RoleSelection, RunConfig, RunOutcome, Settings, DEFAULT_SLAVE_COUNT,
};
use tentacle_ssh::{SshConfig, SshExecutor};

#[derive(Parser)]
#[command(name = "tentacle")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Provision a droplet fleet and launch the tentacular proxy on it", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and JSON command output
    #[arg(long, global = true)]
    json: bool,

    /// File holding the DigitalOcean API token
    #[arg(long, global = true, env = "TENTACLE_TOKEN_FILE")]
    token_file: Option<String>,

    /// Private key used to log into the droplets
    #[arg(long, global = true, env = "TENTACLE_SSH_KEY")]
    ssh_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List droplets with their role and addresses
    List,

    /// Delete every droplet in the account
    Delete,

    /// Create a master droplet and N slave droplets
    Create {
        /// Number of slaves to create
        #[arg(long, default_value_t = DEFAULT_SLAVE_COUNT)]
        slaves: usize,
    },

    /// Launch the proxy on the fleet
    Install {
        /// Which nodes to launch; both when omitted
        #[arg(long, alias = "type", value_enum)]
        role: Option<RoleArg>,

        /// Extra arguments appended to the proxy command line
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        args: String,

        /// Abort nodes still running after this many seconds
        #[arg(long)]
        deadline: Option<u64>,

        /// Fail when any node fails, not only the master
        #[arg(long)]
        strict: bool,

        /// Refuse to run when more than one droplet is named like a master
        #[arg(long)]
        unique_master: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    Master,
    Slave,
}

impl From<Option<RoleArg>> for RoleSelection {
    fn from(role: Option<RoleArg>) -> Self {
        match role {
            None => RoleSelection::Both,
            Some(RoleArg::Master) => RoleSelection::MasterOnly,
            Some(RoleArg::Slave) => RoleSelection::SlavesOnly,
        }
    }
}

/// Options for `install`, separated from clap for testing.
#[derive(Debug, Clone)]
struct InstallOptions {
    config: RunConfig,
    policy: FailurePolicy,
    unique_master: bool,
}

/// How long blocking ssh threads get to exit after the command finishes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tentacle_core::init_tracing(cli.json, level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(run(cli));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    let config =
        DigitalOceanConfig::from_settings(&settings).context("Failed to load DigitalOcean token")?;
    let provider = DigitalOceanClient::new(config).context("Failed to build API client")?;

    match cli.command {
        Commands::List => cmd_list(&provider, cli.json).await,
        Commands::Delete => cmd_delete(&provider).await,
        Commands::Create { slaves } => cmd_create(&provider, &settings, slaves).await,
        Commands::Install {
            role,
            args,
            deadline,
            strict,
            unique_master,
        } => {
            let mut config = RunConfig::new(role.into(), args);
            config.deadline = deadline.map(Duration::from_secs).or(settings.run_deadline);
            let options = InstallOptions {
                config,
                policy: if strict {
                    FailurePolicy::Strict
                } else {
                    FailurePolicy::TolerateSlaveFailures
                },
                unique_master,
            };

            let executor: Arc<dyn RemoteExecutor> =
                Arc::new(SshExecutor::new(SshConfig::from_settings(&settings)));
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling run");
                    on_interrupt.cancel();
                }
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("second interrupt, exiting");
                    std::process::exit(130);
                }
            });

            let outcome = cmd_install(&provider, executor, cancel, &options).await?;
            print_outcome(&outcome, cli.json)?;
            outcome
                .check(options.policy)
                .context("Proxy launch failed")?;
            Ok(())
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::from_env().context("Invalid TENTACLE_* environment")?;
    if let Some(path) = &cli.token_file {
        settings.token_file = expand_home(path);
    }
    if let Some(path) = &cli.ssh_key {
        settings.ssh_key = expand_home(path);
    }
    Ok(settings)
}

/// List droplets with their derived role
async fn cmd_list(provider: &dyn FleetProvider, json: bool) -> Result<()> {
    let machines = provider.list().await.context("Failed to list droplets")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&machines)?);
        return Ok(());
    }
    if machines.is_empty() {
        println!("No droplets found. Run 'tentacle create' first.");
        return Ok(());
    }
    println!(
        "{:<12} {:<16} {:<13} {:<16} PRIVATE",
        "ID", "NAME", "ROLE", "PUBLIC"
    );
    for machine in &machines {
        println!("{}", format_machine(machine));
    }
    Ok(())
}

fn format_machine(machine: &Machine) -> String {
    format!(
        "{:<12} {:<16} {:<13} {:<16} {}",
        machine.id.0,
        machine.name,
        machine.role().to_string(),
        machine.public_ipv4.as_deref().unwrap_or("-"),
        machine.private_ipv4.as_deref().unwrap_or("-"),
    )
}

/// Delete every droplet
async fn cmd_delete(provider: &dyn FleetProvider) -> Result<()> {
    let deleted = delete_all(provider)
        .await
        .context("Failed to delete droplets")?;
    println!("Deleted {deleted} droplet(s)");
    Ok(())
}

/// Create master + slaves
async fn cmd_create(provider: &dyn FleetProvider, settings: &Settings, slaves: usize) -> Result<()> {
    let created = create_fleet(provider, slaves, &settings.machine)
        .await
        .context("Failed to create fleet")?;
    for machine in &created {
        println!("Created {} ({})", machine.name, machine.id);
    }
    Ok(())
}

/// Classify the fleet and launch the proxy
async fn cmd_install(
    provider: &dyn FleetProvider,
    executor: Arc<dyn RemoteExecutor>,
    cancel: CancellationToken,
    options: &InstallOptions,
) -> Result<RunOutcome> {
    let machines = provider.list().await.context("Failed to list droplets")?;
    let fleet = if options.unique_master {
        classify_strict(machines)?
    } else {
        classify(machines)
    };
    info!(
        master = fleet.master.as_ref().map(|m| m.name.as_str()).unwrap_or("-"),
        slaves = fleet.slaves.len(),
        "fleet classified"
    );

    let orchestrator = FleetOrchestrator::new(executor).with_cancellation(cancel);
    let outcome = orchestrator
        .run(&fleet, &options.config)
        .await
        .context("Proxy launch aborted")?;
    Ok(outcome)
}

fn print_outcome(outcome: &RunOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.summary())?);
        return Ok(());
    }
    println!("run {}", outcome.run_id);
    for node in &outcome.nodes {
        let address = node.address.as_deref().unwrap_or("-");
        match &node.status {
            NodeStatus::Succeeded { .. } => {
                println!("  {:<16} {:<7} {:<16} ok", node.node, node.role.to_string(), address)
            }
            NodeStatus::Failed { error } => println!(
                "  {:<16} {:<7} {:<16} FAILED: {error}",
                node.node,
                node.role.to_string(),
                address
            ),
            NodeStatus::Skipped { reason } => println!(
                "  {:<16} {:<7} {:<16} skipped: {reason}",
                node.node,
                node.role.to_string(),
                address
            ),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tentacle_core::fakes::{MemoryFleetProvider, RecordingExecutor};
    use tentacle_core::FleetError;

    fn fleet() -> Vec<Machine> {
        vec![
            Machine::new("1", "master")
                .with_public("1.2.3.4")
                .with_private("10.0.0.1"),
            Machine::new("2", "slave0").with_public("5.6.7.8"),
        ]
    }

    fn options(role: Option<RoleArg>, args: &str) -> InstallOptions {
        InstallOptions {
            config: RunConfig::new(role.into(), args),
            policy: FailurePolicy::TolerateSlaveFailures,
            unique_master: false,
        }
    }

    #[test]
    fn test_install_flags_parse() {
        let cli = Cli::try_parse_from([
            "tentacle", "install", "--role", "slave", "--args", "--x=1", "--deadline", "60",
            "--strict",
        ])
        .unwrap();
        match cli.command {
            Commands::Install {
                role,
                args,
                deadline,
                strict,
                unique_master,
            } => {
                assert_eq!(role, Some(RoleArg::Slave));
                assert_eq!(args, "--x=1");
                assert_eq!(deadline, Some(60));
                assert!(strict);
                assert!(!unique_master);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_type_alias_and_unknown_role() {
        let cli = Cli::try_parse_from(["tentacle", "install", "--type", "master"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Install {
                role: Some(RoleArg::Master),
                ..
            }
        ));
        assert!(Cli::try_parse_from(["tentacle", "install", "--role", "worker"]).is_err());
    }

    #[test]
    fn test_create_defaults_to_five_slaves() {
        let cli = Cli::try_parse_from(["tentacle", "create"]).unwrap();
        assert!(matches!(cli.command, Commands::Create { slaves: 5 }));
    }

    #[test]
    fn test_role_arg_maps_to_selection() {
        assert_eq!(RoleSelection::from(None), RoleSelection::Both);
        assert_eq!(
            RoleSelection::from(Some(RoleArg::Master)),
            RoleSelection::MasterOnly
        );
        assert_eq!(
            RoleSelection::from(Some(RoleArg::Slave)),
            RoleSelection::SlavesOnly
        );
    }

    #[test]
    fn test_format_machine_marks_missing_addresses() {
        let row = format_machine(&Machine::new("42", "slave3"));
        assert!(row.contains("42"));
        assert!(row.contains("slave"));
        assert!(row.trim_end().ends_with('-'));
    }

    #[tokio::test]
    async fn test_install_dispatches_to_listed_fleet() {
        let provider = MemoryFleetProvider::with_machines(fleet());
        let executor = Arc::new(RecordingExecutor::new());

        let outcome = cmd_install(
            &provider,
            Arc::clone(&executor) as Arc<dyn RemoteExecutor>,
            CancellationToken::new(),
            &options(None, "--x=1"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.dispatched, 2);
        assert!(executor.calls().iter().all(|c| c.command.contains("--x=1")));
    }

    #[tokio::test]
    async fn test_install_unique_master_rejects_two_masters() {
        let mut machines = fleet();
        machines.push(Machine::new("3", "master-old").with_public("1.1.1.1"));
        let provider = MemoryFleetProvider::with_machines(machines);
        let executor = Arc::new(RecordingExecutor::new());

        let mut opts = options(None, "");
        opts.unique_master = true;
        let err = cmd_install(
            &provider,
            Arc::clone(&executor) as Arc<dyn RemoteExecutor>,
            CancellationToken::new(),
            &opts,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FleetError>(),
            Some(FleetError::AmbiguousMaster { .. })
        ));
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_install_without_slaves_is_precondition_error() {
        let provider = MemoryFleetProvider::with_machines(vec![Machine::new("1", "master")
            .with_public("1.2.3.4")
            .with_private("10.0.0.1")]);
        let executor = Arc::new(RecordingExecutor::new());

        let err = cmd_install(
            &provider,
            Arc::clone(&executor) as Arc<dyn RemoteExecutor>,
            CancellationToken::new(),
            &options(Some(RoleArg::Slave), ""),
        )
        .await
        .unwrap_err();

        assert!(err.root_cause().to_string().contains("no slave nodes"));
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_and_delete_round_through_provider() {
        let provider = MemoryFleetProvider::new();
        cmd_create(&provider, &Settings::default(), 2).await.unwrap();
        assert_eq!(provider.list().await.unwrap().len(), 3);

        cmd_delete(&provider).await.unwrap();
        assert!(provider.list().await.unwrap().is_empty());
    }
}
