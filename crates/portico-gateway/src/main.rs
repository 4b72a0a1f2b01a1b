//! Portico - API gateway entry point.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use portico_config::{ConfigLoader, DEFAULT_ENV_PREFIX};
use portico_gateway::{
    connect_token_store, ConfigReloader, GatewayServer, RequestDispatcher, RouteTableHandle,
    ShutdownSignal, SnapshotBuilder,
};
use portico_telemetry::{init_logging, init_metrics};

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "PORTICO_CONFIG";

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("portico {}", portico_gateway::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        let config = config.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        Self { config }
    }
}

fn print_help() {
    println!(
        r"Portico - API gateway

USAGE:
    portico [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    PORTICO_CONFIG                    Configuration file, when --config is not given
    PORTICO__SERVER__PORT             Listen port (default: 8000)
    PORTICO__GATEWAY__HOST            Externally visible gateway address (required)
    PORTICO__SERVICES__NAMES          Comma-separated service names (required)
    PORTICO__AUTHORITY__ADMIN         Comma-separated admin roles
    PORTICO__AUTHORITY__SELLER        Comma-separated seller roles
    PORTICO__AUTHORITY__MEMBER        Comma-separated member roles
    PORTICO__AUTH__JWT_SECRET         HS256 signing secret (required)
    PORTICO__TOKEN_STORE__KIND        none, memory or redis (default: memory)
    RUST_LOG                          Log filter, overrides logging.level

    Any key can be set as PORTICO__<SECTION>__<KEY>. A .env file in the
    working directory is read first.

EXAMPLES:
    # Run with a configuration file
    portico --config /etc/portico/portico.toml

    # Run from the environment only
    PORTICO__GATEWAY__HOST=https://api.example.com \
    PORTICO__SERVICES__NAMES=orders-service,users-service \
    PORTICO__AUTH__JWT_SECRET=change-me portico
"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new().with_dotenv();
    if let Some(path) = &args.config {
        loader = loader
            .with_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }
    let config = loader
        .with_env_prefix(DEFAULT_ENV_PREFIX)
        .load()
        .context("invalid configuration")?;

    init_logging(&config.logging.to_log_config()).context("failed to initialize logging")?;
    let metrics = if config.metrics.enabled {
        Some(init_metrics().context("failed to initialize metrics")?)
    } else {
        None
    };

    tracing::info!(version = portico_gateway::VERSION, "starting portico");
    if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "configuration loaded");
    }

    let token_store = connect_token_store(&config.token_store)
        .await
        .context("failed to connect token store")?;
    let snapshot = SnapshotBuilder::new(&config, token_store.clone())
        .build()
        .context("failed to build route table")?;
    let routes = RouteTableHandle::new(snapshot);

    let _reloader = match &args.config {
        Some(path) => Some(
            ConfigReloader::new(
                path,
                DEFAULT_ENV_PREFIX,
                routes.clone(),
                config.clone(),
                token_store,
            )
            .spawn()
            .context("failed to watch configuration")?,
        ),
        None => None,
    };

    let dispatcher = RequestDispatcher::new(routes, &config.server).with_metrics(metrics);
    let server = GatewayServer::bind(
        &config.bind_addr(),
        dispatcher,
        Duration::from_secs(config.server.shutdown_timeout_secs),
    )
    .await?;

    server.run(ShutdownSignal::with_os_signals()).await?;
    Ok(())
}
