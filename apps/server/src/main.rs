mod schema;

use std::path::PathBuf;

use anyhow::Context;
use bazaar_backend::RestBackend;
use bazaar_config::load as load_config;
use bazaar_gateway::create_router;
use bazaar_runtime::{telemetry, BackendServices};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "bazaar-server")]
#[command(about = "Bazaar marketplace server (serves HTTP by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Sample table shapes from the hosted backend into a JSON file
    Schema {
        /// Tables to sample
        #[arg(long, value_delimiter = ',', default_value = "items,messages")]
        tables: Vec<String>,
        /// Output directory
        #[arg(long, default_value = ".supabase-schema")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::Schema { tables, out } => fetch_schema(tables, out).await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting Bazaar server");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let app = create_router(services.gateway_state());

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(bazaar_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("server shut down");
    Ok(())
}

async fn fetch_schema(tables: Vec<String>, out: PathBuf) -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let backend = match &config.backend.service_role_key {
        Some(key) => RestBackend::with_api_key(&config.backend, key.clone()),
        None => {
            tracing::warn!("no service role key configured, sampling with the public key");
            RestBackend::new(&config.backend)
        }
    }
    .context("failed to build backend client")?;

    let shapes = schema::sample_tables(&backend, &tables).await;
    let path = schema::write_schema(&out, &shapes)?;
    println!("Schema written to {}", path.display());
    Ok(())
}
