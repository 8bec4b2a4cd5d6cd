use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A closeout checklist item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistItem {
    pub id: String,
    #[serde(default)]
    pub org_id: String,
    pub prompt: String,
    pub required: bool,
    pub updated_at: DateTime<Utc>,
}

impl ChecklistItem {
    /// Creates a new checklist item with a fresh id, timestamped now.
    pub fn new(prompt: impl Into<String>, required: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            org_id: String::new(),
            prompt: prompt.into(),
            required,
            updated_at: Utc::now(),
        }
    }
}

impl fmt::Display for ChecklistItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.required { "[required]" } else { "[optional]" };
        write!(f, "{}  {} {}", self.id, marker, self.prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checklist_item_new() {
        let item = ChecklistItem::new("Photograph pole tag", true);
        assert_eq!(item.prompt, "Photograph pole tag");
        assert!(item.required);
    }

    #[test]
    fn test_checklist_item_json_roundtrip() {
        let item = ChecklistItem::new("Sweep site for hardware", false);
        let json = serde_json::to_string(&item).unwrap();
        let parsed: ChecklistItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item, parsed);
    }

    #[test]
    fn test_checklist_item_display() {
        let item = ChecklistItem::new("Verify guy tension", true);
        let output = format!("{}", item);
        assert!(output.contains("[required]"));
        assert!(output.contains("Verify guy tension"));
    }
}
