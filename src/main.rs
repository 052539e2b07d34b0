use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use snapshot::cli::{
    handle_config_command, handle_init_command, handle_snapshot_command, SnapshotCommands,
};
use snapshot::config::{paths::SnapshotPaths, settings::Settings};
use snapshot::error::{SnapshotError, SnapshotResult};
use snapshot::logging;

#[derive(Parser)]
#[command(
    name = "db-snapshot",
    version,
    about = "Snapshot a database to S3-compatible storage and load it back",
    long_about = "db-snapshot dumps your database, optionally gzips it, and uploads \
                  it to an S3 bucket (or any S3-compatible store). The same tool \
                  downloads a snapshot and restores it, which makes it handy for \
                  nightly backups and for seeding local development databases."
)]
struct Cli {
    /// Base directory for settings, the operator log and the temp workspace
    #[arg(long, global = true, env = "DB_SNAPSHOT_HOME")]
    home: Option<PathBuf>,

    /// Settings file (defaults to <home>/config.json)
    #[arg(long, global = true, env = "DB_SNAPSHOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Snapshot(SnapshotCommands),

    /// Write a default settings file
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Show resolved paths and settings
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = e.to_string();
            eprintln!("error: {}", message.lines().next().unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> SnapshotResult<()> {
    let mut paths = match cli.home {
        Some(home) => SnapshotPaths::with_base_dir(home),
        None => SnapshotPaths::new()?,
    };
    if let Some(config) = cli.config {
        paths = paths.with_settings_file(config);
    }

    if let Err(e) = logging::init_file_logging(&paths.log_file()) {
        let _ = logging::init_stderr_logging();
        tracing::warn!(error = %e, "operator log unavailable, logging to stderr");
    }

    // snapshot operations log their own failures with stage and run id
    match cli.command {
        Commands::Snapshot(cmd) => {
            let settings = Settings::load(&paths).map_err(logged)?;
            handle_snapshot_command(&paths, &settings, cmd)?;
        }
        Commands::Init { force } => handle_init_command(&paths, force).map_err(logged)?,
        Commands::Config => handle_config_command(&paths).map_err(logged)?,
    }

    Ok(())
}

fn logged(e: SnapshotError) -> SnapshotError {
    tracing::error!(kind = e.kind(), error = %e, "command failed");
    e
}
