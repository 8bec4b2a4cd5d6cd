//! Client-side sync: local replica, outbox, cursor, transport, and the
//! cycle driver.

pub mod auto;
pub mod cursor;
pub mod driver;
pub mod outbox;
pub mod replica;
pub mod transport;

pub use cursor::CursorStore;
pub use driver::{CycleReport, SyncCycleError, SyncDriver};
pub use outbox::OutboxItem;
pub use replica::{init_replica, LocalReplica, ReplicaError};
pub use transport::{check_server, HttpTransport, SyncTransport, TransportError};

/// The four synced entity kinds, as stored in the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Jobs,
    Materials,
    Pins,
    Checklist,
}

impl EntityKind {
    /// Returns the storage name for this entity kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Jobs => "jobs",
            EntityKind::Materials => "materials",
            EntityKind::Pins => "pins",
            EntityKind::Checklist => "checklist",
        }
    }

    /// Parse from storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "jobs" => Some(EntityKind::Jobs),
            "materials" => Some(EntityKind::Materials),
            "pins" => Some(EntityKind::Pins),
            "checklist" => Some(EntityKind::Checklist),
            _ => None,
        }
    }
}
