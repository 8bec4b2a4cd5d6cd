use clap::{Args, Subcommand};

use crate::config::Config;
use crate::models::ChecklistItem;
use crate::sync::auto::try_auto_sync;
use crate::sync::LocalReplica;

#[derive(Args)]
pub struct ChecklistCommand {
    #[command(subcommand)]
    pub command: ChecklistSubcommand,
}

#[derive(Subcommand)]
pub enum ChecklistSubcommand {
    /// Add a closeout checklist item
    Add {
        /// The prompt shown to the crew
        prompt: String,

        /// Whether the item must be completed before closeout
        #[arg(long)]
        required: bool,
    },

    /// List all checklist items
    List,
}

impl ChecklistCommand {
    pub async fn run(
        &self,
        replica: &LocalReplica,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ChecklistSubcommand::Add { prompt, required } => {
                if prompt.trim().is_empty() {
                    return Err("Checklist prompt cannot be empty".into());
                }

                let item = ChecklistItem::new(prompt.trim(), *required);
                replica.save_checklist_item(&item).await?;

                println!("Added checklist item:");
                println!("{}", item);

                try_auto_sync(config, replica.pool()).await;
                Ok(())
            }

            ChecklistSubcommand::List => {
                let items = replica.list_checklist().await?;

                if items.is_empty() {
                    println!("No checklist items found");
                    return Ok(());
                }

                for item in &items {
                    println!("{}", item);
                }
                println!("\nTotal: {} item(s)", items.len());
                Ok(())
            }
        }
    }
}
