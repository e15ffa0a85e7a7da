use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ticket_poll::config::{Config, ServerConfig};
use ticket_poll::tickets::issue_tickets;
use ticket_poll::voting::{Catalogue, DEFAULT_TOKEN_BYTES};
use ticket_poll::web::db::{PgStore, PollStore};
use ticket_poll::web::{self, App};

#[derive(Parser, Debug)]
#[command(name = "ticket-poll")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server
    Serve,
    /// Apply migrations and create the poll flag
    Init,
    /// Generate voting tickets and their QR codes
    Tickets {
        /// Number of new tickets
        #[arg(short = 'n', long)]
        count: usize,
        /// Voting page the QR codes point at
        #[arg(long)]
        base_url: String,
        /// Directory for the PNG files
        #[arg(long, default_value = "qr_codes")]
        out: PathBuf,
        /// Random bytes per token
        #[arg(long, default_value_t = DEFAULT_TOKEN_BYTES)]
        bytes: usize,
        /// Skip the store; only write QR codes
        #[arg(long)]
        no_store: bool,
    },
    /// Load categories and studies from a JSON file
    Catalogue { path: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Command::Serve => serve(),
        Command::Init => {
            let store = connect()?;
            let applied = store.init().context("failed to initialise store")?;
            info!("Store ready, {} migrations applied", applied.len());
            Ok(())
        }
        Command::Tickets {
            count,
            base_url,
            out,
            bytes,
            no_store,
        } => tickets(count, &base_url, out, bytes, no_store),
        Command::Catalogue { path } => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let catalogue = Catalogue::from_json(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            let store = connect()?;
            let summary = store
                .load_catalogue(&catalogue)
                .context("failed to load catalogue")?;
            info!(
                categories = summary.categories,
                studies_created = summary.studies_created,
                links = summary.links,
                "Catalogue loaded"
            );
            Ok(())
        }
    }
}

fn connect() -> Result<PgStore> {
    let config = Config::load().context("invalid store configuration")?;
    PgStore::connect(&config.database_url, config.pool_size).context("failed to connect to store")
}

fn tickets(count: usize, base_url: &str, out: PathBuf, nbytes: usize, no_store: bool) -> Result<()> {
    let store = if no_store { None } else { Some(connect()?) };
    let fresh = issue_tickets(
        store.as_ref().map(|store| store as &dyn PollStore),
        count,
        base_url,
        &out,
        nbytes,
    )
    .context("failed to issue tickets")?;
    info!("Issued {} tickets", fresh.len());
    Ok(())
}

fn serve() -> Result<()> {
    let config = ServerConfig::load().context("invalid server configuration")?;
    let store = PgStore::connect(&config.store.database_url, config.store.pool_size)
        .context("failed to connect to store")?;
    let applied = store.init().context("failed to initialise store")?;
    if !applied.is_empty() {
        info!("Applied migrations: {}", applied.join(", "));
    }

    let app = App::new(
        Arc::new(store),
        config.admin_password,
        &config.secret_key,
        config.session_ttl,
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(web::serve(Arc::new(app), config.bind_addr));
    Ok(())
}
