use clap::{Args, Subcommand};

use crate::config::Config;
use crate::models::Pin;
use crate::sync::auto::try_auto_sync;
use crate::sync::LocalReplica;

#[derive(Args)]
pub struct PinCommand {
    #[command(subcommand)]
    pub command: PinSubcommand,
}

#[derive(Subcommand)]
pub enum PinSubcommand {
    /// Drop a location pin for a job
    Add {
        /// Job ID the pin belongs to
        job_id: String,

        /// Pin kind, e.g. pole, anchor, guy
        #[arg(long)]
        kind: String,

        /// Latitude in decimal degrees
        #[arg(long)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long)]
        lng: f64,
    },

    /// List all pins
    List,
}

impl PinCommand {
    pub async fn run(
        &self,
        replica: &LocalReplica,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            PinSubcommand::Add {
                job_id,
                kind,
                lat,
                lng,
            } => {
                if !(-90.0..=90.0).contains(lat) {
                    return Err("Latitude must be between -90 and 90".into());
                }
                if !(-180.0..=180.0).contains(lng) {
                    return Err("Longitude must be between -180 and 180".into());
                }

                let pin = Pin::new(job_id, kind.trim(), *lat, *lng);
                replica.save_pin(&pin).await?;

                println!("Dropped pin:");
                println!("{}", pin);

                try_auto_sync(config, replica.pool()).await;
                Ok(())
            }

            PinSubcommand::List => {
                let pins = replica.list_pins().await?;

                if pins.is_empty() {
                    println!("No pins found");
                    return Ok(());
                }

                for pin in &pins {
                    println!("{}", pin);
                }
                println!("\nTotal: {} pin(s)", pins.len());
                Ok(())
            }
        }
    }
}
