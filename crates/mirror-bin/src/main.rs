//! trustline-mirror - mirrors the trust lines of a watched XRPL account.

mod app;
mod store_adapter;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mirror_config_and_utils::{init_logging, Config, Paths};

/// trustline-mirror command-line interface.
#[derive(Parser)]
#[command(name = "trustline-mirror")]
#[command(about = "Mirror the trust lines of a watched XRPL account")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (socket, logs, config). Defaults to ~/.trustline-mirror
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Simulate ledger submissions instead of sending them
    #[arg(long, global = true)]
    test: bool,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mirror in the foreground
    Run {
        /// Start watching immediately instead of waiting for a start request
        #[arg(long)]
        autostart: bool,
    },
    /// Ask a running mirror to start watching
    Start,
    /// Ask a running mirror to stop watching
    Stop,
    /// Show the session of a running mirror
    Status {
        /// Keep printing every change
        #[arg(short, long)]
        follow: bool,
    },
    /// Show recently mirrored trust lines and purchases
    History {
        /// Number of records of each kind
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let mut config = Config::load(&paths)?;
    if cli.test {
        config.test_mode = true;
    }
    if cli.debug {
        config.debug_mode = true;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    // Initialize logging
    let level = if config.debug_mode {
        "debug"
    } else {
        config.log_level.as_str()
    };
    init_logging(level, Some(paths.log_file()));

    match cli.command {
        Some(Commands::Run { autostart }) => {
            app::run_mirror(config, paths, autostart).await?;
        }
        None => {
            app::run_mirror(config, paths, false).await?;
        }
        Some(Commands::Start) => {
            app::start_mirror(&paths).await?;
        }
        Some(Commands::Stop) => {
            app::stop_mirror(&paths).await?;
        }
        Some(Commands::Status { follow }) => {
            app::check_status(&paths, follow).await?;
        }
        Some(Commands::History { limit }) => {
            app::show_history(&paths, limit).await?;
        }
    }

    Ok(())
}
