use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use revize_backend::app::verification_use_case::VerificationUseCase;
use revize_backend::config::{Config, MatchStrategy};
use revize_backend::logging;
use revize_backend::numbering::{DocumentClass, EvidenceNumberGenerator};
use revize_backend::observability;
use revize_backend::registry::RegistryMatcher;
use revize_backend::server::{self, AppState};
use revize_backend::storage::{SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "revize_backend")]
#[command(about = "Electrical inspection paperwork backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides configuration)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Look a technician up in the registry and print the outcome as JSON
    Verify {
        #[arg(long)]
        name: String,
        #[arg(long)]
        certificate: String,
        /// full_text or table
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Print the next free evidence number without reserving it
    NextNumber {
        #[arg(long)]
        project: i64,
        /// vv or revision
        #[arg(long)]
        class: String,
        /// Reference date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Create the first administrator account
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
}

fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    let storage = SqliteStorage::open(&config.storage.database_path).with_context(|| {
        format!(
            "opening database {}",
            config.storage.database_path.display()
        )
    })?;
    Ok(Arc::new(storage))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::load().context("loading configuration")?;
    let _guard = logging::init_logging(&config.logging.directory);
    observability::init().context("installing metrics recorder")?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            let storage = open_storage(&config)?;
            let matcher = RegistryMatcher::from_config(&config.registry)?;
            info!(
                port,
                strategy = ?matcher.strategy(),
                database = %config.storage.database_path.display(),
                "Starting API server"
            );
            let state = AppState::new(storage, matcher, config.numbering.max_attempts);
            server::start_server(state, port).await?;
        }
        Commands::Verify {
            name,
            certificate,
            strategy,
        } => {
            let mut matcher = RegistryMatcher::from_config(&config.registry)?;
            if let Some(raw) = strategy {
                let strategy: MatchStrategy = raw.parse()?;
                matcher = matcher.with_strategy(strategy);
            }
            let outcome = matcher.verify(&name, &certificate).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::NextNumber {
            project,
            class,
            date,
        } => {
            let class: DocumentClass = class.parse()?;
            let date = match date {
                Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .with_context(|| format!("invalid date '{}'", raw))?,
                None => Utc::now().date_naive(),
            };
            let generator =
                EvidenceNumberGenerator::new(open_storage(&config)?, config.numbering.max_attempts);
            let number = generator.next_number(project, class, date).await?;
            println!("{}", number);
        }
        Commands::CreateAdmin { name, email } => {
            let storage = open_storage(&config)?;
            let matcher = RegistryMatcher::from_config(&config.registry)?;
            let admin = VerificationUseCase::new(storage, matcher)
                .bootstrap_admin(&name, &email)
                .await?;
            println!("✅ Created admin {} with id {:?}", admin.email, admin.id);
        }
    }
    Ok(())
}
