use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub name: String,
    #[serde(default)]
    pub amount: f64,
}

/// Incoming transaction payload; subtotal and total are derived server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub receiver: String,
    pub items: Vec<ItemDraft>,
    #[serde(default)]
    pub tax: f64,
    pub category: String,
    #[serde(default)]
    pub notes: String,
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Largest,
    Smallest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum StatsScope {
    Month { month: u32, year: i32 },
    Year { year: i32 },
    #[default]
    Overall,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableQuery {
    #[serde(flatten)]
    pub scope: StatsScope,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
}
