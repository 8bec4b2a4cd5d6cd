mod checklist_cmd;
mod config_cmd;
mod job_cmd;
mod material_cmd;
mod pin_cmd;
mod sync_cmd;

pub use checklist_cmd::ChecklistCommand;
pub use config_cmd::ConfigCommand;
pub use job_cmd::JobCommand;
pub use material_cmd::MaterialCommand;
pub use pin_cmd::PinCommand;
pub use sync_cmd::SyncCommand;
