use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use veil::{
    build_router, AppState, JitterRange, RealityEngine, SealedHeaders, StaticDataProvider,
    VeilConfig, VeilError,
};
use veil_core::{
    encode, is_valid_mask, Clock, Nonce, Permission, PermissionMask, SealKey, SystemClock,
};

/// Veil: reality resolution engine
///
/// Honest callers see the real data, careless ones a redacted mirror,
/// attackers a convincing shadow.
#[derive(Parser, Debug)]
#[command(name = "veil", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Serve the demo resource behind the HTTP adapter
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        bind: Option<String>,

        /// Port (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Encode permissions (names or Fibonacci ids) into a mask
    Mask {
        #[arg(required = true)]
        permissions: Vec<String>,
    },

    /// Classify an untrusted mask value
    CheckMask {
        #[arg(allow_negative_numbers = true)]
        mask: i64,
    },

    /// Print sealed request headers using the configured secret
    Seal {
        #[arg(long, allow_negative_numbers = true)]
        mask: i64,

        /// Seal context, the HTTP method for the adapter
        #[arg(long, default_value = "GET")]
        context: String,

        #[arg(long)]
        path: String,

        /// Unix epoch milliseconds (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,

        /// Nonce (defaults to a fresh random one)
        #[arg(long)]
        nonce: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("veil=debug,veil_guard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("veil=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<VeilConfig, VeilError> {
    match path {
        Some(p) => VeilConfig::load(p),
        None => {
            let default_path = VeilConfig::default_config_path();
            VeilConfig::load(&default_path)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), VeilError> {
    match cli.command {
        Commands::Init => cmd_init(cli.config.as_ref()),
        Commands::Serve { bind, port } => cmd_serve(cli.config.as_ref(), bind, port).await,
        Commands::Mask { permissions } => cmd_mask(&permissions),
        Commands::CheckMask { mask } => {
            cmd_check_mask(mask);
            Ok(())
        }
        Commands::Seal {
            mask,
            context,
            path,
            timestamp,
            nonce,
        } => cmd_seal(cli.config.as_ref(), mask, &context, &path, timestamp, nonce),
    }
}

fn cmd_init(config_path: Option<&PathBuf>) -> Result<(), VeilError> {
    let config = load_config(config_path)?;
    let save_path = config_path
        .cloned()
        .unwrap_or_else(VeilConfig::default_config_path);
    config.save(&save_path)?;

    println!("Veil initialized.");
    println!("  Config:     {}", save_path.display());
    println!("  Secret env: {}", config.secret_env);
    Ok(())
}

async fn cmd_serve(
    config_path: Option<&PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<(), VeilError> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let engine = Arc::new(RealityEngine::from_config(&config)?);
    let sweeper = engine.sweeper()?.spawn();

    let state = Arc::new(AppState {
        engine: Arc::clone(&engine),
        data: Arc::new(StaticDataProvider::demo()),
        jitter: JitterRange::from(&config.server),
    });
    let router = build_router(state);

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "veil listening");
    println!("Veil guarding http://{}/api/v1/resource", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Err(e) = sweeper.shutdown().await {
        warn!(error = %e, "sweeper did not shut down cleanly");
    }
    info!(
        metrics = ?engine.metrics(),
        cache = ?engine.cache_stats(),
        "veil stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn cmd_mask(permissions: &[String]) -> Result<(), VeilError> {
    let parsed = permissions
        .iter()
        .map(|p| p.parse::<Permission>())
        .collect::<Result<Vec<_>, _>>()?;
    let mask = encode(parsed)?;
    println!("{} ({})", mask.as_i64(), mask.to_binary_string());
    Ok(())
}

fn cmd_check_mask(mask: i64) {
    if !is_valid_mask(mask) {
        println!("{}: invalid (negative, out of range, or adjacent bits)", mask);
        return;
    }
    let Some(parsed) = PermissionMask::from_raw(mask) else {
        println!("{}: invalid", mask);
        return;
    };
    let names: Vec<_> = parsed.permissions().iter().map(|p| p.name()).collect();
    println!(
        "{}: valid ({}) [{}]{}",
        mask,
        parsed.to_binary_string(),
        names.join(", "),
        if parsed.contains(Permission::Read) {
            ""
        } else {
            " -- no read permission"
        }
    );
}

fn cmd_seal(
    config_path: Option<&PathBuf>,
    mask: i64,
    context: &str,
    path: &str,
    timestamp: Option<i64>,
    nonce: Option<String>,
) -> Result<(), VeilError> {
    let config = load_config(config_path)?;
    let secret = config.load_secret()?;
    let key = SealKey::new(secret.as_bytes())?;

    let timestamp =
        timestamp.unwrap_or_else(|| i64::try_from(SystemClock.now_ms()).unwrap_or(i64::MAX));
    let nonce = nonce.map(Nonce::new).unwrap_or_else(Nonce::generate);
    let headers = SealedHeaders::build(&key, mask, context, path, timestamp, &nonce);

    for (name, value) in headers.pairs() {
        println!("{}: {}", name, value);
    }
    Ok(())
}
