// # agh-sync - DNS rewrite sync CLI
//
// This binary is a THIN integration layer:
// - No diffing, merging or retry logic here (all of it lives in agh-core)
// - Parses arguments, opens the registry, builds the HTTP factory, prints results
//
// ## Configuration
//
// Every global flag can also be set from the environment:
//
// - `AGH_DATA_FILE`: Registry file (default `~/.config/agh-control/data.json`)
// - `AGH_TIMEOUT_SECS`: Per-request HTTP timeout, 1..=300 (default 30)
// - `AGH_DRY_RUN`: List nodes and print the plan without mutating them or the registry
// - `AGH_LOG_LEVEL`: trace, debug, info, warn, error (default warn)
// - `AGH_NODE_PASSWORD`: Password for `node add` when `--password` is omitted
//
// ## Example
//
// ```bash
// agh-sync node add primary --url https://ns1.example.org --username admin
// agh-sync add nas.lan 192.168.1.20
// agh-sync sync --dry-run
// ```

use agh_core::config::{ClientConfig, StoreConfig, SyncConfig};
use agh_core::{Credential, Node, NodeRegistry, RecordSet, SyncEngine, SyncReport, store};
use agh_node_http::HttpNodeClientFactory;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AghExitCode {
    /// Command finished and every node converged
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (registry unreadable, fetch failed, interrupted)
    RuntimeError = 2,
    /// Run finished but at least one node failed
    NodeFailure = 3,
}

impl From<AghExitCode> for ExitCode {
    fn from(code: AghExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep DNS rewrite records identical across a set of DNS-control nodes
#[derive(Parser, Debug)]
#[command(name = "agh-sync", version, about)]
struct Cli {
    /// Registry file holding nodes and canonical records
    #[arg(long, global = true, env = "AGH_DATA_FILE")]
    data_file: Option<PathBuf>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, global = true, env = "AGH_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Print what would change without touching any node or the registry
    #[arg(long, global = true, env = "AGH_DRY_RUN")]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AGH_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Push the canonical records to every node
    Sync,
    /// Pull every node's records and make them the canonical set
    Fetch,
    /// Show the canonical records
    List,
    /// Add or update a canonical record, then sync
    Add { domain: String, answer: String },
    /// Remove a canonical record, then sync
    Del { domain: String },
    /// Manage nodes
    Node {
        #[command(subcommand)]
        command: NodeCommand,
    },
}

#[derive(Subcommand, Debug)]
enum NodeCommand {
    /// Show managed nodes
    List,
    /// Register a node
    Add {
        name: String,

        /// Management URL (https://ns.example.org)
        #[arg(long)]
        url: String,

        /// Account name
        #[arg(long)]
        username: String,

        #[arg(long, env = "AGH_NODE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget a node
    Del { name: String },
}

impl Cli {
    fn sync_config(&self) -> SyncConfig {
        let store = match &self.data_file {
            Some(path) => StoreConfig::File { path: path.clone() },
            None => StoreConfig::default(),
        };
        SyncConfig {
            store,
            client: ClientConfig {
                timeout_secs: self.timeout_secs,
            },
            dry_run: self.dry_run,
        }
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "AGH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return AghExitCode::ConfigError.into();
        }
    };

    let config = cli.sync_config();
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return AghExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return AghExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return AghExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        tokio::select! {
            result = run(cli.command, config) => match result {
                Ok(code) => code,
                Err(e) => {
                    error!("{:#}", e);
                    eprintln!("Error: {:#}", e);
                    AghExitCode::RuntimeError
                }
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Interrupted; nodes may be partially updated.");
                AghExitCode::RuntimeError
            }
        }
    })
    .into()
}

async fn run(command: Command, config: SyncConfig) -> Result<AghExitCode> {
    let registry = store::open(&config.store)
        .await
        .context("Failed to open registry")?;
    debug!("Opened {} registry", config.store.type_name());

    let factory = HttpNodeClientFactory::from_config(&config.client);
    let engine = SyncEngine::new(Box::new(factory), &config)?;

    match command {
        Command::Sync => sync(&engine, registry.as_ref()).await,

        Command::Fetch => {
            println!("Fetching records");
            let report = engine.fetch_into_registry(registry.as_ref()).await?;
            print!("{}", report);
            println!();
            print_records(&report.records);
            if config.dry_run {
                println!("(dry run: registry left unchanged)");
            }
            Ok(AghExitCode::Success)
        }

        Command::List => {
            print_records(&registry.canonical_records().await?);
            Ok(AghExitCode::Success)
        }

        Command::Add { domain, answer } => {
            let change = RecordChange::Set {
                domain: &domain,
                answer: &answer,
            };
            let (previous, canonical) =
                stage_change(registry.as_ref(), change, config.dry_run).await?;
            let verb = if previous.is_some() { "updated" } else { "added" };
            println!("{}Record {}: {} -> {}", dry_run_tag(&config), verb, domain, answer);

            let nodes = registry.list_nodes().await?;
            if nodes.is_empty() {
                println!("Skipping sync: no nodes are being managed yet.");
                return Ok(AghExitCode::Success);
            }
            finish(engine.sync(&nodes, &canonical).await?)
        }

        Command::Del { domain } => {
            let change = RecordChange::Remove { domain: &domain };
            let (previous, canonical) =
                stage_change(registry.as_ref(), change, config.dry_run).await?;
            if previous.is_none() {
                println!("Nothing changed.");
                return Ok(AghExitCode::Success);
            }
            println!("{}Record removed: {}", dry_run_tag(&config), domain);

            let nodes = registry.list_nodes().await?;
            finish(engine.sync(&nodes, &canonical).await?)
        }

        Command::Node { command } => node(command, registry.as_ref()).await,
    }
}

async fn sync(engine: &SyncEngine, registry: &dyn NodeRegistry) -> Result<AghExitCode> {
    finish(engine.sync_registry(registry).await?)
}

/// Print a sync report and pick the exit code
fn finish(report: SyncReport) -> Result<AghExitCode> {
    print!("{}", report);

    if report.has_failures() {
        info!("{} node(s) failed", report.failed_count());
        Ok(AghExitCode::NodeFailure)
    } else {
        Ok(AghExitCode::Success)
    }
}

fn dry_run_tag(config: &SyncConfig) -> &'static str {
    if config.dry_run { "[DRY-RUN] " } else { "" }
}

/// One edit to the canonical record set
#[derive(Debug, Clone, Copy)]
enum RecordChange<'a> {
    Set { domain: &'a str, answer: &'a str },
    Remove { domain: &'a str },
}

/// Apply `change` and return the previous answer plus the canonical set to
/// sync against. With `dry_run` only a local copy is edited and the registry
/// stays as it was.
async fn stage_change(
    registry: &dyn NodeRegistry,
    change: RecordChange<'_>,
    dry_run: bool,
) -> Result<(Option<String>, RecordSet)> {
    if dry_run {
        let mut canonical = registry.canonical_records().await?;
        let previous = match change {
            RecordChange::Set { domain, answer } => {
                canonical.insert(domain.to_string(), answer.to_string())
            }
            RecordChange::Remove { domain } => canonical.remove(domain),
        };
        return Ok((previous, canonical));
    }

    let previous = match change {
        RecordChange::Set { domain, answer } => registry.set_record(domain, answer).await?,
        RecordChange::Remove { domain } => registry.remove_record(domain).await?,
    };
    Ok((previous, registry.canonical_records().await?))
}

async fn node(command: NodeCommand, registry: &dyn NodeRegistry) -> Result<AghExitCode> {
    match command {
        NodeCommand::List => {
            let nodes = registry.list_nodes().await?;
            if nodes.is_empty() {
                println!("No nodes are being managed yet.");
                return Ok(AghExitCode::Success);
            }

            let width = nodes.iter().map(|n| n.name.len()).max().unwrap_or(0);
            println!("Managed nodes");
            for node in &nodes {
                println!("    {:<width$}  @ {}", node.name, node.base_url, width = width);
            }
        }

        NodeCommand::Add {
            name,
            url,
            username,
            password,
        } => {
            let credential = Credential::from_login(&username, &password);
            if registry.add_node(Node::new(&name, url, credential)).await? {
                println!("Node added: {}", name);
            } else {
                println!("Nothing changed.");
            }
        }

        NodeCommand::Del { name } => {
            if registry.remove_node(&name).await? {
                println!("Node removed: {}", name);
            } else {
                println!("Nothing changed.");
            }
        }
    }

    Ok(AghExitCode::Success)
}

fn print_records(records: &RecordSet) {
    if records.is_empty() {
        println!("No records are being managed yet.");
        return;
    }

    let width = records.keys().map(|d| d.len()).max().unwrap_or(0);
    println!("DNS Records");
    for (domain, answer) in records {
        println!("    {:<width$}  -> {}", domain, answer, width = width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "agh-sync",
            "sync",
            "--dry-run",
            "--timeout-secs",
            "5",
            "--data-file",
            "/tmp/data.json",
        ])
        .unwrap();

        let config = cli.sync_config();
        assert!(config.dry_run);
        assert_eq!(config.client.timeout_secs, 5);
        assert_eq!(config.store.type_name(), "file");
        assert!(matches!(cli.command, Command::Sync));
    }

    #[test]
    fn test_node_add_arguments() {
        let cli = Cli::try_parse_from([
            "agh-sync",
            "node",
            "add",
            "primary",
            "--url",
            "https://ns1.example.org",
            "--username",
            "admin",
            "--password",
            "hunter2",
        ])
        .unwrap();

        match cli.command {
            Command::Node {
                command:
                    NodeCommand::Add {
                        name,
                        url,
                        username,
                        password,
                    },
            } => {
                assert_eq!(name, "primary");
                assert_eq!(url, "https://ns1.example.org");
                assert_eq!(username, "admin");
                assert_eq!(password, "hunter2");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let cli =
            Cli::try_parse_from(["agh-sync", "list", "--log-level", "verbose"]).unwrap();
        assert!(cli.level().is_err());
    }

    #[test]
    fn test_out_of_range_timeout_fails_validation() {
        let cli = Cli::try_parse_from(["agh-sync", "list", "--timeout-secs", "0"]).unwrap();
        assert!(cli.sync_config().validate().is_err());
    }

    fn seeded() -> agh_core::MemoryRegistry {
        let mut records = RecordSet::new();
        records.insert("keep.lan".to_string(), "10.0.0.1".to_string());
        agh_core::MemoryRegistry::with_contents(Vec::new(), records)
    }

    #[tokio::test]
    async fn test_dry_run_del_leaves_registry_untouched() {
        let registry = seeded();

        let change = RecordChange::Remove { domain: "keep.lan" };
        let (previous, canonical) = stage_change(&registry, change, true).await.unwrap();

        assert_eq!(previous.as_deref(), Some("10.0.0.1"));
        assert!(canonical.is_empty());
        assert_eq!(registry.canonical_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_add_leaves_registry_untouched() {
        let registry = seeded();

        let change = RecordChange::Set {
            domain: "keep.lan",
            answer: "10.0.0.2",
        };
        let (previous, canonical) = stage_change(&registry, change, true).await.unwrap();

        assert_eq!(previous.as_deref(), Some("10.0.0.1"));
        assert_eq!(canonical.get("keep.lan").map(String::as_str), Some("10.0.0.2"));
        assert_eq!(
            registry
                .canonical_records()
                .await
                .unwrap()
                .get("keep.lan")
                .map(String::as_str),
            Some("10.0.0.1")
        );
    }

    #[tokio::test]
    async fn test_change_is_stored_without_dry_run() {
        let registry = seeded();

        let change = RecordChange::Set {
            domain: "new.lan",
            answer: "10.0.0.9",
        };
        let (previous, canonical) = stage_change(&registry, change, false).await.unwrap();

        assert_eq!(previous, None);
        assert_eq!(canonical, registry.canonical_records().await.unwrap());
        assert_eq!(canonical.len(), 2);

        let change = RecordChange::Remove { domain: "missing.lan" };
        let (previous, _) = stage_change(&registry, change, false).await.unwrap();
        assert_eq!(previous, None);
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(AghExitCode::Success as u8, 0);
        assert_eq!(AghExitCode::ConfigError as u8, 1);
        assert_eq!(AghExitCode::RuntimeError as u8, 2);
        assert_eq!(AghExitCode::NodeFailure as u8, 3);
    }
}
