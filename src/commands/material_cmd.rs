use clap::{Args, Subcommand};

use crate::config::Config;
use crate::models::MaterialLine;
use crate::sync::auto::try_auto_sync;
use crate::sync::LocalReplica;

#[derive(Args)]
pub struct MaterialCommand {
    #[command(subcommand)]
    pub command: MaterialSubcommand,
}

#[derive(Subcommand)]
pub enum MaterialSubcommand {
    /// Book a material line against a job
    Add {
        /// Job ID the material belongs to
        job_id: String,

        /// Stock keeping unit
        #[arg(long)]
        sku: String,

        /// Quantity used
        #[arg(long)]
        quantity: f64,
    },

    /// List all material lines
    List,
}

impl MaterialCommand {
    pub async fn run(
        &self,
        replica: &LocalReplica,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MaterialSubcommand::Add {
                job_id,
                sku,
                quantity,
            } => {
                if sku.trim().is_empty() {
                    return Err("SKU cannot be empty".into());
                }

                let line = MaterialLine::new(job_id, sku.trim(), *quantity);
                replica.save_material(&line).await?;

                println!("Booked material:");
                println!("{}", line);

                try_auto_sync(config, replica.pool()).await;
                Ok(())
            }

            MaterialSubcommand::List => {
                let lines = replica.list_materials().await?;

                if lines.is_empty() {
                    println!("No material lines found");
                    return Ok(());
                }

                for line in &lines {
                    println!("{}", line);
                }
                println!("\nTotal: {} line(s)", lines.len());
                Ok(())
            }
        }
    }
}
