mod commands;
mod config;
mod state;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::SecureScoutConfig;
use state::AppState;

#[derive(Parser)]
#[command(name = "securescout", version, about = "SecureScout marketplace diagnostics")]
struct Cli {
    /// State directory holding config.toml.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full marketplace lifecycle once, narrating each step.
    Demo,
    /// Drive a mixed workload and verify escrow and ledger invariants.
    Audit {
        /// Number of jobs to run through the workload.
        #[arg(long, default_value_t = 12)]
        jobs: u32,
    },
    /// Show or initialize the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Write a default config.toml to the state directory.
    Init,
}

fn state_dir(cli: &Cli) -> PathBuf {
    if let Some(dir) = &cli.state_dir {
        return dir.clone();
    }
    if let Ok(dir) = std::env::var("SECURESCOUT_STATE_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".securescout")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let dir = state_dir(&cli);
    let config = SecureScoutConfig::load(&dir)?;

    match cli.command {
        Command::Demo => {
            let state = AppState::new(config.platform_fee_bps);
            commands::demo::handle(&state).await
        }
        Command::Audit { jobs } => {
            let state = AppState::new(config.platform_fee_bps);
            commands::audit::handle(&state, jobs).await
        }
        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Init => {
                config.save(&dir)?;
                println!("wrote {}", SecureScoutConfig::config_path(&dir).display());
                Ok(())
            }
        },
    }
}
