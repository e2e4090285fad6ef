//! Cloud Run component CLI and container entry point.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cloudrun_service::app::{self, AppState};
use cloudrun_service::config::{AppConfig, ConfigSources, DeploySettings};
use cloudrun_service::deployment::{self, DEFAULT_COMPONENT_NAME};
use cloudrun_service::engine::{MemoryEngine, MemoryEngineConfig};
use cloudrun_service::input::{validate, RawConfig};
use cloudrun_service::metrics;

/// Cloud Run service component and demo container app.
#[derive(Parser, Debug)]
#[command(name = "cloudrun-service")]
#[command(about = "Declare a Cloud Run service component and run the app it deploys")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the container HTTP app (default).
    Serve {
        /// Listen port (defaults to $PORT, then 8080).
        #[arg(short, long)]
        port: Option<u16>,

        /// Message to serve (defaults to $MESSAGE).
        #[arg(long)]
        message: Option<String>,

        /// Do not expose /metrics.
        #[arg(long)]
        no_metrics: bool,
    },

    /// Validate the deployment configuration.
    CheckConfig(DeployArgs),

    /// Print the resource specs the component would submit.
    Plan(DeployArgs),

    /// Create the component on the in-process engine and print its exports.
    Preview {
        #[command(flatten)]
        deploy: DeployArgs,

        /// Simulated engine latency in milliseconds.
        #[arg(long, default_value = "0")]
        latency_ms: u64,
    },
}

#[derive(ClapArgs, Debug)]
struct DeployArgs {
    /// Component name.
    #[arg(long, default_value = DEFAULT_COMPONENT_NAME)]
    name: String,

    /// JSON config file with camelCase keys.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    settings: DeploySettings,
}

impl DeployArgs {
    fn raw(self) -> anyhow::Result<(String, RawConfig)> {
        let sources = ConfigSources::load(self.config.as_deref(), self.settings)?;
        Ok((self.name, sources.into_raw()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("cloudrun_service=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (plain, json) = if args.log_json {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(plain)
        .with(json)
        .with(filter)
        .init();

    // Handle subcommands
    match args.command {
        Some(Command::Serve {
            port,
            message,
            no_metrics,
        }) => cmd_serve(port, message, no_metrics).await,
        Some(Command::CheckConfig(deploy)) => cmd_check_config(deploy),
        Some(Command::Plan(deploy)) => cmd_plan(deploy),
        Some(Command::Preview { deploy, latency_ms }) => cmd_preview(deploy, latency_ms).await,
        None => cmd_serve(None, None, false).await,
    }
}

/// Run the container HTTP app.
async fn cmd_serve(
    port_override: Option<u16>,
    message_override: Option<String>,
    no_metrics: bool,
) -> anyhow::Result<()> {
    let mut config = AppConfig::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Override with CLI args if provided
    if let Some(port) = port_override {
        config.port = port;
    }
    if let Some(message) = message_override {
        config.message = message;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    let mut state = AppState::from_config(&config);
    if !no_metrics {
        let handle = PrometheusBuilder::new().install_recorder()?;
        metrics::init_metrics();
        state = state.with_metrics(handle);
    }

    info!("Serving message: {}", config.message);
    app::serve(state, config.port).await?;
    info!("Server stopped");
    Ok(())
}

/// Validate the deployment configuration.
fn cmd_check_config(deploy: DeployArgs) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("CLOUD RUN COMPONENT - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let (name, raw) = match deploy.raw() {
        Ok(loaded) => {
            println!("OK");
            loaded
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    let input = match validate(&raw) {
        Ok(input) => {
            println!("OK");
            input
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    };

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Component: {}", name);
    println!("  Project: {}", input.project);
    println!("  Location: {}", input.location);
    println!("  Image: {}", input.image_url);
    println!("  Port: {}", input.container_port);
    println!("  CPU: {}", input.cpu);
    println!("  Memory: {}", input.memory);
    println!("  Concurrency: {}", input.concurrency);
    println!("  Message: {}", input.message);
    println!(
        "  Access: {}",
        if input.allow_unauthenticated { "Public" } else { "Private" }
    );
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Print the resource specs as JSON.
fn cmd_plan(deploy: DeployArgs) -> anyhow::Result<()> {
    let (name, raw) = deploy.raw()?;
    let specs = deployment::plan(&name, &raw)?;
    println!("{}", serde_json::to_string_pretty(&specs)?);
    Ok(())
}

/// Create the component on the in-process engine.
async fn cmd_preview(deploy: DeployArgs, latency_ms: u64) -> anyhow::Result<()> {
    let (name, raw) = deploy.raw()?;
    let engine = MemoryEngine::with_config(MemoryEngineConfig {
        latency_ms,
        ..Default::default()
    });

    let created = deployment::deploy(&name, &raw, &engine).await.map_err(|e| {
        error!("Deployment failed: {}", e);
        e
    })?;

    info!("========================================");
    info!("COMPONENT CREATED");
    info!("========================================");
    for record in engine.resources() {
        info!(
            "{} {} {}",
            record.type_token,
            record.name,
            record.id.as_deref().unwrap_or("-")
        );
    }
    info!("========================================");

    match created.exports().await {
        Ok(exports) => {
            println!("{}", serde_json::to_string_pretty(&exports)?);
            Ok(())
        }
        Err(e) => {
            warn!("Component created but outputs did not resolve: {}", e);
            Err(e.into())
        }
    }
}
