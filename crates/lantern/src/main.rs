//! Lantern
//!
//! Loads JavaScript dashboard plugins and drives them from the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use lantern::{Config, Host};
use lantern_types::ActionPayload;

/// Run and inspect Lantern JavaScript plugins
#[derive(Parser, Debug)]
#[command(name = "lantern")]
#[command(about = "Run and inspect Lantern JavaScript plugins", long_about = None)]
struct Args {
    /// Path to the configuration file (defaults to ./lantern.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the plugins found in the plugin directory
    List,

    /// Print a plugin's metadata
    Inspect { plugin: String },

    /// Print a plugin's navigation tree
    Navigation { plugin: String },

    /// Render the content of a module plugin path
    Content { plugin: String, path: String },

    /// Print summary sections for an object (JSON or YAML file)
    Print { plugin: String, object: PathBuf },

    /// Print the tab a plugin adds for an object
    Tab { plugin: String, object: PathBuf },

    /// Print the status a plugin reports for an object
    Status { plugin: String, object: PathBuf },

    /// Run a plugin action
    Action {
        plugin: String,
        name: String,

        /// Action payload as a JSON object
        #[arg(long)]
        payload: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?
        .block_on(run(args.command, config))
}

async fn run(command: Command, config: Config) -> Result<()> {
    let host = Host::new(config).await?;

    match command {
        Command::List => list(&host).await,
        Command::Inspect { plugin } => {
            let plugin = host.open(&plugin).await?;
            print_json(plugin.metadata())
        }
        Command::Navigation { plugin } => {
            let plugin = host.open(&plugin).await?;
            print_json(&plugin.navigation().await?)
        }
        Command::Content { plugin, path } => {
            let plugin = host.open(&plugin).await?;
            print_json(&plugin.content(&path).await?)
        }
        Command::Print { plugin, object } => {
            let object = read_object(&object).await?;
            let plugin = host.open(&plugin).await?;
            print_json(&plugin.print(&object).await?)
        }
        Command::Tab { plugin, object } => {
            let object = read_object(&object).await?;
            let plugin = host.open(&plugin).await?;
            print_json(&plugin.print_tab(&object).await?)
        }
        Command::Status { plugin, object } => {
            let object = read_object(&object).await?;
            let plugin = host.open(&plugin).await?;
            print_json(&plugin.object_status(&object).await?)
        }
        Command::Action { plugin, name, payload } => {
            let payload: ActionPayload = match payload {
                Some(raw) => serde_json::from_str(&raw).context("--payload must be a JSON object")?,
                None => ActionPayload::new(),
            };
            let plugin = host.open(&plugin).await?;
            plugin.handle_action(&name, &payload).await?;
            info!("Action {} completed", name);
            Ok(())
        }
    }
}

/// Load every discovered plugin and print one line per plugin. Failures are
/// reported and skipped.
async fn list(host: &Host) -> Result<()> {
    let paths = host.discover().await?;
    if paths.is_empty() {
        info!("No plugins found in {}", host.config().plugin_dir.display());
        return Ok(());
    }

    for path in paths {
        match host.load(&path).await {
            Ok(plugin) => {
                println!("{}\t{}\t{}", plugin.name(), plugin.metadata().description, path.display());
                plugin.close();
            }
            Err(e) => {
                error!("Failed to load plugin {}: {}", path.display(), e);
            }
        }
    }
    Ok(())
}

/// Objects may be given as JSON or YAML.
async fn read_object(path: &Path) -> Result<serde_json::Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("Invalid object in {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
