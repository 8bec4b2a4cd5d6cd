use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Profitability status tag shown against a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfitChip {
    Green,
    Yellow,
    Red,
}

impl ProfitChip {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfitChip::Green => "green",
            ProfitChip::Yellow => "yellow",
            ProfitChip::Red => "red",
        }
    }
}

impl fmt::Display for ProfitChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProfitChip {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "green" => Ok(ProfitChip::Green),
            "yellow" => Ok(ProfitChip::Yellow),
            "red" => Ok(ProfitChip::Red),
            _ => Err(format!(
                "Invalid profit chip '{}'. Valid options: green, yellow, red",
                s
            )),
        }
    }
}

/// A field job.
///
/// `org_id` is assigned by the server from the authenticated session; the
/// value a client sends is never trusted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub org_id: String,
    pub name: String,
    pub profit_chip: ProfitChip,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a new job with a fresh id, timestamped now.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            org_id: String::new(),
            name: name.into(),
            profit_chip: ProfitChip::Green,
            updated_at: Utc::now(),
        }
    }

    pub fn with_profit_chip(mut self, chip: ProfitChip) -> Self {
        self.profit_chip = chip;
        self
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  [{}]  {}", self.id, self.profit_chip, self.name)
    }
}
