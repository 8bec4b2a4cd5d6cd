use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A location pin dropped in the field.
///
/// `kind` is free-form ("pole", "anchor", "guy", ...) rather than an enum so
/// older clients keep working when crews invent new pin kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pin {
    pub id: String,
    #[serde(default)]
    pub org_id: String,
    pub job_id: String,
    pub kind: String,
    pub lat: f64,
    pub lng: f64,
    pub updated_at: DateTime<Utc>,
}

impl Pin {
    /// Creates a new pin with a fresh id, timestamped now.
    pub fn new(job_id: impl Into<String>, kind: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            org_id: String::new(),
            job_id: job_id.into(),
            kind: kind.into(),
            lat,
            lng,
            updated_at: Utc::now(),
        }
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {} @ ({:.5}, {:.5})  (job {})",
            self.id, self.kind, self.lat, self.lng, self.job_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_new() {
        let pin = Pin::new("u1", "guy", 37.7, -122.4);
        assert_eq!(pin.job_id, "u1");
        assert_eq!(pin.kind, "guy");
        assert_eq!(pin.lat, 37.7);
        assert_eq!(pin.lng, -122.4);
    }

    #[test]
    fn test_pin_json_roundtrip() {
        let pin = Pin::new("u1", "anchor", 45.51, -122.68);
        let json = serde_json::to_string(&pin).unwrap();
        let parsed: Pin = serde_json::from_str(&json).unwrap();
        assert_eq!(pin, parsed);
    }
}
