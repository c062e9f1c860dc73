use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagKind {
    Recall,
    Warranty,
}

/// Ordered from least to most severe so `max()` picks the worst flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagSeverity {
    Info,
    Warning,
    Red,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceFlag {
    pub kind: FlagKind,
    pub severity: FlagSeverity,
    pub title: String,
    pub message: String,
    pub recommended_action: String,
    pub campaign_number: Option<String>,
    pub coverage: Option<String>,
}

impl ComplianceFlag {
    pub fn is_red(&self) -> bool {
        self.severity == FlagSeverity::Red
    }
}

/// Open recall campaign as returned by the recall registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallRecord {
    pub campaign_number: String,
    pub component: String,
    pub summary: String,
    #[serde(default)]
    pub consequence: String,
    #[serde(default)]
    pub remedy: String,
}
