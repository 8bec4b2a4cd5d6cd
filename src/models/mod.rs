mod checklist;
mod job;
mod material;
mod pin;

pub use checklist::ChecklistItem;
pub use job::{Job, ProfitChip};
pub use material::MaterialLine;
pub use pin::Pin;

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats a timestamp for client-side storage.
///
/// Fixed-width RFC 3339 with microsecond precision and a `Z` suffix, so the
/// lexicographic order of stored values matches chronological order.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a timestamp stored by [`format_ts`] or received from the server.
pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
