//! Redfish Emulator
//!
//! Serves a filesystem-backed Redfish resource tree over HTTP.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

use redfish_emulator::{
    ApiServer, ApiServerConfig, EngineContext, Error, FileStore, FileStoreConfig, MemoryStore,
    ResourceStore, ResourceTypeRegistry, Result,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Redfish Emulator - filesystem-backed Redfish REST resource tree
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API bind address
    #[arg(long, env = "EMULATOR_BIND", default_value = "0.0.0.0:5000")]
    bind: String,

    /// Root directory of the resource tree
    #[arg(long, env = "EMULATOR_ROOT", default_value = "./Resources")]
    root: PathBuf,

    /// REST base URL every resource lives under
    #[arg(long, env = "EMULATOR_REST_BASE", default_value = "/redfish/v1/")]
    rest_base: String,

    /// YAML file with additional resource types
    #[arg(long, env = "EMULATOR_REGISTRY_FILE")]
    registry_file: Option<PathBuf>,

    /// Token clients must send in X-Auth-Token
    #[arg(long, env = "EMULATOR_AUTH_TOKEN")]
    auth_token: Option<String>,

    /// Fsync every document before it replaces the previous version
    #[arg(long, env = "EMULATOR_SYNC_WRITES")]
    sync_writes: bool,

    /// Keep resources in memory only (nothing is read from or written to --root)
    #[arg(long, env = "EMULATOR_EPHEMERAL")]
    ephemeral: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting Redfish Emulator");
    info!("  Version: {}", redfish_emulator::VERSION);
    info!("  Bind: {}", args.bind);
    info!("  REST base: {}", args.rest_base);

    let mut registry = ResourceTypeRegistry::with_builtin()?;
    if let Some(file) = &args.registry_file {
        registry.load_file(file).await?;
    }
    info!("Resource type registry initialized ({} types)", registry.len());

    if args.ephemeral {
        info!("  Store: memory");
        run(&args, Arc::new(MemoryStore::new()), registry).await
    } else {
        info!("  Store: {}", args.root.display());
        let store = FileStore::with_config(FileStoreConfig {
            root_path: args.root.clone(),
            sync_writes: args.sync_writes,
        })
        .await?;
        run(&args, Arc::new(store), registry).await
    }
}

async fn run<S: ResourceStore>(
    args: &Args,
    store: Arc<S>,
    registry: ResourceTypeRegistry,
) -> Result<()> {
    if !store.health_check().await? {
        return Err(Error::Configuration(format!(
            "{} store is not usable",
            store.backend()
        )));
    }

    let ctx = EngineContext::new(store, args.rest_base.clone());
    spawn_event_logger(&ctx);

    let bind_addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| Error::Configuration(format!("Invalid bind address: {}", e)))?;

    let config = ApiServerConfig {
        bind_addr,
        auth_token: args.auth_token.clone(),
        ..Default::default()
    };

    let server = ApiServer::new(config, ctx, Arc::new(registry))?;
    server.run().await?;

    info!("Emulator shutdown complete");
    Ok(())
}

/// Log every lifecycle event at debug level
fn spawn_event_logger<S: ResourceStore>(ctx: &EngineContext<S>) {
    let mut events = ctx.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(
                    kind = %event.kind,
                    resource_type = %event.resource_type,
                    odata_id = %event.odata_id,
                    at = %event.at,
                    "resource event"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = ["hyper=warn", "tower=warn", "tower_http=info", "axum=info"]
        .iter()
        .filter_map(|directive| directive.parse::<Directive>().ok())
        .fold(
            EnvFilter::from_default_env().add_directive(level.into()),
            EnvFilter::add_directive,
        );

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
