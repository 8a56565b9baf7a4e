//! Vigil CLI: seed a record store, inspect exams, take a proctored exam
//! from the terminal, and dispatch invitations.
//!
//! Usage:
//!   vigil init <STORE>                 Write a sample record store
//!   vigil info --store --test          Show exam information
//!   vigil check                        Check capture and display capabilities
//!   vigil take --store --test ...      Take an exam
//!   vigil invite --store --test        Send credentials to every student

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(
    name = "vigil",
    about = "Timed, remotely proctored exams",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the standard location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample record store with one open exam
    Init {
        /// Path of the store file to create
        store: PathBuf,

        /// Exam duration in seconds
        #[arg(long, default_value = "600")]
        duration: u64,
    },

    /// Show exam information
    Info {
        /// Record store file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Test id
        #[arg(long)]
        test: Uuid,

        /// Origin used to build the test URL
        #[arg(long)]
        origin: Option<String>,

        /// Print the descriptor as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check capture and display capabilities
    Check,

    /// Take an exam
    Take {
        /// Record store file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Test id
        #[arg(long)]
        test: Uuid,

        /// Student email
        #[arg(long)]
        email: String,

        /// One-time password
        #[arg(long)]
        password: String,

        /// Answer as QUESTION_ID=OPTION, repeatable
        #[arg(long = "answer", value_name = "QID=OPT")]
        answers: Vec<String>,

        /// Monitoring endpoint (overrides config)
        #[arg(long)]
        monitor_url: Option<String>,
    },

    /// Send exam credentials to every student in the store
    Invite {
        /// Record store file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Test id
        #[arg(long)]
        test: Uuid,

        /// Origin used to build the test link
        #[arg(long)]
        origin: Option<String>,

        /// Append messages to this outbox file instead of only logging them
        #[arg(long)]
        outbox: Option<PathBuf>,

        /// Company name shown in the message
        #[arg(long)]
        company: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => vigil_common::config::AppConfig::load_from(path)?,
        None => vigil_common::config::AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    vigil_common::logging::init_logging(&config.logging)?;

    match cli.command {
        Commands::Init { store, duration } => commands::init::run(store, duration).await,
        Commands::Info {
            store,
            test,
            origin,
            json,
        } => {
            let store = store.unwrap_or_else(|| config.store_path.clone());
            let origin = origin.unwrap_or_else(|| config.origin.clone());
            commands::info::run(store, test, origin, json).await
        }
        Commands::Check => commands::check::run(),
        Commands::Take {
            store,
            test,
            email,
            password,
            answers,
            monitor_url,
        } => {
            if let Some(url) = monitor_url {
                config.monitoring.url = url;
            }
            if let Some(store) = store {
                config.store_path = store;
            }
            commands::take::run(config, test, email, password, answers).await
        }
        Commands::Invite {
            store,
            test,
            origin,
            outbox,
            company,
        } => {
            let store = store.unwrap_or_else(|| config.store_path.clone());
            let origin = origin.unwrap_or_else(|| config.origin.clone());
            commands::invite::run(store, test, origin, outbox, company).await
        }
    }
}
