use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A line of material booked against a job.
///
/// `job_id` is a weak reference: the job may not exist locally yet when the
/// line arrives in a pull, and no foreign-key constraint enforces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialLine {
    pub id: String,
    #[serde(default)]
    pub org_id: String,
    pub job_id: String,
    pub sku: String,
    pub quantity: f64,
    pub updated_at: DateTime<Utc>,
}

impl MaterialLine {
    /// Creates a new material line with a fresh id, timestamped now.
    pub fn new(job_id: impl Into<String>, sku: impl Into<String>, quantity: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            org_id: String::new(),
            job_id: job_id.into(),
            sku: sku.into(),
            quantity,
            updated_at: Utc::now(),
        }
    }
}

impl fmt::Display for MaterialLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {} x{}  (job {})",
            self.id, self.sku, self.quantity, self.job_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_line_new() {
        let line = MaterialLine::new("u1", "GUY-WIRE-3/8", 120.0);
        assert_eq!(line.job_id, "u1");
        assert_eq!(line.sku, "GUY-WIRE-3/8");
        assert_eq!(line.quantity, 120.0);
        assert!(!line.id.is_empty());
    }

    #[test]
    fn test_material_line_json_roundtrip() {
        let line = MaterialLine::new("u1", "ANCHOR-8IN", 2.0);
        let json = serde_json::to_string(&line).unwrap();
        let parsed: MaterialLine = serde_json::from_str(&json).unwrap();
        assert_eq!(line, parsed);
    }
}
