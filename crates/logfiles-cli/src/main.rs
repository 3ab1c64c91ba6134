use std::path::PathBuf;

use clap::{Parser, Subcommand};
use logfilesd::SettingsOverrides;

mod files;

use files::FilesArgs;

#[derive(Parser)]
#[command(name = "logfiles")]
#[command(about = "Query log files across hosts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon in the foreground.
    Serve {
        /// Address to listen on, e.g. 0.0.0.0:8080.
        #[arg(long)]
        listen: Option<String>,
        /// Directory whose files are served.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Ask a daemon for log lines and print each host's answer.
    Files(FilesArgs),
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run(Cli::parse()).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { listen, log_dir } => {
            logfilesd::telemetry::init_tracing();
            logfilesd::serve_with_overrides(SettingsOverrides {
                listen,
                log_directory: log_dir,
            })
            .await?;
        }
        Commands::Files(args) => {
            files::run_files(args, &mut std::io::stdout()).await?;
        }
    }
    Ok(())
}
