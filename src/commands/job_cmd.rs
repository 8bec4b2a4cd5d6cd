use clap::{Args, Subcommand};
use std::str::FromStr;

use crate::config::Config;
use crate::models::{Job, ProfitChip};
use crate::sync::auto::try_auto_sync;
use crate::sync::LocalReplica;

#[derive(Args)]
pub struct JobCommand {
    #[command(subcommand)]
    pub command: JobSubcommand,
}

#[derive(Subcommand)]
pub enum JobSubcommand {
    /// Create a new job
    Create {
        /// Name of the job
        name: String,

        /// Profitability chip: green, yellow, or red
        #[arg(long, default_value = "green")]
        chip: String,
    },

    /// Update a job's profitability chip
    Chip {
        /// Job ID
        id: String,

        /// New chip value: green, yellow, or red
        chip: String,
    },

    /// List all jobs
    List,
}

impl JobCommand {
    pub async fn run(
        &self,
        replica: &LocalReplica,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            JobSubcommand::Create { name, chip } => {
                if name.trim().is_empty() {
                    return Err("Job name cannot be empty".into());
                }
                let chip = ProfitChip::from_str(chip)?;

                let job = Job::new(name.trim()).with_profit_chip(chip);
                replica.save_job(&job).await?;

                println!("Created job:");
                println!("{}", job);

                try_auto_sync(config, replica.pool()).await;
                Ok(())
            }

            JobSubcommand::Chip { id, chip } => {
                let chip = ProfitChip::from_str(chip)?;

                let mut job = replica
                    .get_job(id)
                    .await?
                    .ok_or_else(|| format!("No job with id '{}'", id))?;

                job.profit_chip = chip;
                job.updated_at = chrono::Utc::now();
                replica.save_job(&job).await?;

                println!("Updated job:");
                println!("{}", job);

                try_auto_sync(config, replica.pool()).await;
                Ok(())
            }

            JobSubcommand::List => {
                let jobs = replica.list_jobs().await?;

                if jobs.is_empty() {
                    println!("No jobs found");
                    return Ok(());
                }

                for job in &jobs {
                    println!("{}", job);
                }
                println!("\nTotal: {} job(s)", jobs.len());
                Ok(())
            }
        }
    }
}
