mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scatter")]
#[command(about = "Chunked multi-provider file storage")]
#[command(version)]
struct Cli {
    /// Path to the scatter config directory (default: ~/.scatter)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize scatter configuration and manifest database
    Init,

    /// Store a new file
    Upload {
        /// Path to the file to store
        path: PathBuf,
        /// Logical name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Store a new version of an existing file
    Update {
        /// File ID to update
        file_id: String,
        /// Path to the new content
        path: PathBuf,
        /// Version notes
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Fetch a file (its current version by default)
    Download {
        /// File ID to fetch
        file_id: String,
        /// Destination path
        dest: PathBuf,
        /// Specific version to fetch
        #[arg(long)]
        version: Option<i64>,
    },

    /// List stored files
    Ls {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// List committed versions of a file
    Versions {
        /// File ID to inspect
        file_id: String,
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Make an older version current again
    Restore {
        /// File ID to restore
        file_id: String,
        /// Version to make current
        version: i64,
    },

    /// Remove a file and all its versions
    Delete {
        /// File ID to remove
        file_id: String,
    },

    /// Re-fetch and re-hash a version without writing output
    Verify {
        /// File ID to verify
        file_id: String,
        /// Specific version to verify
        #[arg(long)]
        version: Option<i64>,
    },

    /// Check reachability of every configured provider
    Probe,

    /// Show current configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scatter=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.config_dir {
        Some(ref dir) => dir.clone(),
        None => scatter_core::config::ScatterConfig::default_base_dir()?,
    };

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Init => commands::init::run(&base_dir),
        Commands::Upload { ref path, ref name } => {
            rt.block_on(commands::upload::run(path, name.as_deref(), &base_dir))
        }
        Commands::Update {
            ref file_id,
            ref path,
            ref notes,
        } => rt.block_on(commands::update::run(file_id, path, notes, &base_dir)),
        Commands::Download {
            ref file_id,
            ref dest,
            version,
        } => rt.block_on(commands::download::run(file_id, dest, version, &base_dir)),
        Commands::Ls { json } => rt.block_on(commands::ls::run(json, &base_dir)),
        Commands::Versions { ref file_id, json } => {
            rt.block_on(commands::versions::run(file_id, json, &base_dir))
        }
        Commands::Restore {
            ref file_id,
            version,
        } => rt.block_on(commands::restore::run(file_id, version, &base_dir)),
        Commands::Delete { ref file_id } => rt.block_on(commands::delete::run(file_id, &base_dir)),
        Commands::Verify {
            ref file_id,
            version,
        } => rt.block_on(commands::verify::run(file_id, version, &base_dir)),
        Commands::Probe => rt.block_on(commands::probe::run(&base_dir)),
        Commands::Config => commands::config::run(&base_dir),
    }
}
