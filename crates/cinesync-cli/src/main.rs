mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::read::ResourceKind;

#[derive(Parser)]
#[command(
    name = "cinesync",
    version,
    about = "Keeps the movies search indices in sync and serves cached reads"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config YAML file
    #[arg(long, short, default_value = "cinesync.yaml", global = true)]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ETL loop until interrupted
    Run,
    /// Run a single ETL iteration
    Once,
    /// Validate the config and reach Postgres, Elasticsearch and Redis
    Check,
    /// Create missing search indices
    InitIndices,
    /// Read one item by id
    Get {
        resource: ResourceKind,
        id: uuid::Uuid,
    },
    /// Read one page of items
    List {
        resource: ResourceKind,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 50)]
        size: u32,
        /// Full-text query against the resource's name or title
        #[arg(long, conflicts_with = "filter")]
        query: Option<String>,
        /// Genre id to filter films by
        #[arg(long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run => commands::run::execute(&cli.config).await,
        Commands::Once => commands::run::execute_once(&cli.config).await,
        Commands::Check => commands::check::execute(&cli.config).await,
        Commands::InitIndices => commands::indices::execute(&cli.config).await,
        Commands::Get { resource, id } => commands::read::get(&cli.config, resource, id).await,
        Commands::List {
            resource,
            page,
            size,
            query,
            filter,
        } => commands::read::list(&cli.config, resource, page, size, query, filter).await,
    }
}
