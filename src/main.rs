use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use qrclaim::config::Config;
use qrclaim::db::{self, AppState, queries};
use qrclaim::handlers;
use qrclaim::scans::spawn_scan_flusher;

const POOL_SIZE: u32 = 16;

#[derive(Parser)]
#[command(name = "qrclaim", version, about = "QR redemption code issuance and tracking")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create the database schema and exit
    InitDb,
    /// Mint a batch of codes for a product and print them
    Generate {
        #[arg(long)]
        product_id: i64,
        #[arg(long)]
        quantity: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("qrclaim=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();

    let pool = db::create_pool(&config.database_path, POOL_SIZE)
        .with_context(|| format!("opening database {}", config.database_path))?;
    {
        let conn = pool.get()?;
        db::init_db(&conn).context("initializing schema")?;
    }

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::InitDb => {
            tracing::info!("Database ready at {}", config.database_path);
        }
        Command::Generate {
            product_id,
            quantity,
        } => {
            let mut conn = pool.get()?;
            let created = queries::generate_batch(&mut conn, product_id, quantity)?;
            println!(
                "batch #{} (id {}) serials {}-{}",
                created.batch.sequence_no,
                created.batch.id,
                created.batch.serial_start,
                created.batch.serial_end
            );
            for code in &created.codes {
                println!("{}\t{}", code.serial, code.value);
            }
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config, pool).await?;
        }
    }

    Ok(())
}

async fn serve(config: Config, pool: db::DbPool) -> anyhow::Result<()> {
    if config.admin_api_key.is_none() {
        if config.dev_mode {
            tracing::warn!("ADMIN_API_KEY not set: admin API is OPEN (dev mode)");
        } else {
            tracing::warn!("ADMIN_API_KEY not set: admin API will reject all requests");
        }
    }

    let (scans, flusher) = spawn_scan_flusher(pool.clone(), config.scan_settings());
    let state = AppState::new(pool, scans, &config);

    let app = handlers::app(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    flusher.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
