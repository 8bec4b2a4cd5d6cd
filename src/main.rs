use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fieldsync::commands::{
    ChecklistCommand, ConfigCommand, JobCommand, MaterialCommand, PinCommand, SyncCommand,
};
use fieldsync::config::Config;
use fieldsync::sync::{init_replica, LocalReplica};

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(version)]
#[command(about = "Offline-first field operations client", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage jobs
    Job(JobCommand),

    /// Manage material lines
    Material(MaterialCommand),

    /// Manage location pins
    Pin(PinCommand),

    /// Manage the closeout checklist
    Checklist(ChecklistCommand),

    /// Synchronize with the server
    Sync(SyncCommand),

    /// Inspect configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Job(cmd)) => {
            let replica = open_replica(&config).await?;
            cmd.run(&replica, &config).await?;
        }
        Some(Commands::Material(cmd)) => {
            let replica = open_replica(&config).await?;
            cmd.run(&replica, &config).await?;
        }
        Some(Commands::Pin(cmd)) => {
            let replica = open_replica(&config).await?;
            cmd.run(&replica, &config).await?;
        }
        Some(Commands::Checklist(cmd)) => {
            let replica = open_replica(&config).await?;
            cmd.run(&replica, &config).await?;
        }
        Some(Commands::Sync(cmd)) => {
            let replica = open_replica(&config).await?;
            cmd.run(&replica, &config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

async fn open_replica(config: &Config) -> Result<LocalReplica, sqlx::Error> {
    let pool = init_replica(Some(config.database_path.clone())).await?;
    Ok(LocalReplica::new(pool))
}
