use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use dirs::config_dir;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::api::{EntryDraft, SortOrder, StatsScope, TableQuery};
use crate::palette;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub amount: f64,
}

/// A recorded transaction. `subtotal` and `total` are derived when the entry
/// is built and kept in the record so views never re-sum on read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: u64,
    pub receiver: String,
    pub items: Vec<LineItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub category: String,
    #[serde(default)]
    pub notes: String,
    pub month: u32,
    pub year: i32,
    pub created_at: NaiveDate,
}

impl Entry {
    fn in_scope(&self, scope: StatsScope) -> bool {
        match scope {
            StatsScope::Month { month, year } => self.month == month && self.year == year,
            StatsScope::Year { year } => self.year == year,
            StatsScope::Overall => true,
        }
    }
}

/// Aggregated spending for a month, a year, or everything. Category keys are
/// normalized, so "Grocery" and "grocery" land in one bucket.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SpendSummary {
    pub total_spent: f64,
    pub total_entries: usize,
    pub category_totals: IndexMap<String, f64>,
    pub categories: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("entry not found: {id}")]
    EntryNotFound { id: u64 },
    #[error("receiver must not be empty")]
    MissingReceiver,
    #[error("category must not be empty")]
    MissingCategory,
    #[error("at least one named item is required")]
    NoItems,
    #[error("invalid month: {month}")]
    InvalidMonth { month: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerPersistenceError {
    #[error("config directory unavailable")]
    MissingConfigDir,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerSnapshot {
    next_id: u64,
    entries: Vec<Entry>,
}

#[derive(Clone, Debug, Default)]
pub struct Ledger {
    entries: Vec<Entry>,
    next_id: u64,
}

impl Ledger {
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, id: u64) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entries_for(&self, month: u32, year: i32) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|entry| entry.month == month && entry.year == year)
            .collect()
    }

    pub fn add(&mut self, draft: EntryDraft) -> Result<&Entry, LedgerError> {
        let id = self.next_id;
        let today = chrono::Utc::now().date_naive();
        let entry = build_entry(id, draft, today)?;
        self.next_id += 1;
        self.entries.push(entry);
        Ok(self.entries.last().expect("entry just pushed"))
    }

    pub fn update(&mut self, id: u64, draft: EntryDraft) -> Result<&Entry, LedgerError> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(LedgerError::EntryNotFound { id })?;

        let created_at = self.entries[index].created_at;
        self.entries[index] = build_entry(id, draft, created_at)?;
        Ok(&self.entries[index])
    }

    pub fn remove(&mut self, id: u64) -> Result<Entry, LedgerError> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(LedgerError::EntryNotFound { id })?;
        Ok(self.entries.remove(index))
    }

    /// Distinct normalized categories across all entries, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .entries
            .iter()
            .map(|entry| palette::normalize(&entry.category))
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    /// Distinct receivers across all entries, sorted.
    pub fn receivers(&self) -> Vec<String> {
        let mut receivers: Vec<String> = self
            .entries
            .iter()
            .map(|entry| entry.receiver.trim().to_string())
            .collect();
        receivers.sort();
        receivers.dedup();
        receivers
    }

    /// Oldest recorded (year, month) bucket, used to bound month navigation.
    pub fn earliest_month(&self) -> Option<(i32, u32)> {
        self.entries
            .iter()
            .map(|entry| (entry.year, entry.month))
            .min()
    }

    pub fn summary(&self, scope: StatsScope) -> SpendSummary {
        let mut summary = SpendSummary::default();
        for entry in self.entries.iter().filter(|entry| entry.in_scope(scope)) {
            let key = palette::normalize(&entry.category);
            *summary.category_totals.entry(key).or_insert(0.0) += entry.total;
            summary.total_spent += entry.total;
            summary.total_entries += 1;
        }
        summary.categories = summary.category_totals.keys().cloned().collect();
        summary
    }

    /// Scope, filter, and sort entries for the table view. The free-text
    /// query matches receiver, category, item names and amounts, notes, and
    /// the money fields, all case-insensitively.
    pub fn search(&self, query: &TableQuery) -> Vec<&Entry> {
        let category = query.category.as_deref().map(palette::normalize);
        let needle = query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_lowercase);

        let mut matches: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|entry| entry.in_scope(query.scope))
            .filter(|entry| match &category {
                Some(filter) => palette::normalize(&entry.category) == *filter,
                None => true,
            })
            .filter(|entry| match &needle {
                Some(needle) => entry_matches(entry, needle),
                None => true,
            })
            .collect();

        match query.sort {
            SortOrder::Largest => matches.sort_by(|a, b| b.total.total_cmp(&a.total)),
            SortOrder::Smallest => matches.sort_by(|a, b| a.total.total_cmp(&b.total)),
        }
        matches
    }

    /// Header row plus one formatted row per matching entry. File encoding is
    /// the caller's concern.
    pub fn export_rows(&self, query: &TableQuery) -> Vec<Vec<String>> {
        let mut rows = vec![vec![
            "Receiver".to_string(),
            "Category".to_string(),
            "Items Summary".to_string(),
            "Subtotal".to_string(),
            "Tax".to_string(),
            "Total".to_string(),
            "Notes".to_string(),
        ]];

        for entry in self.search(query) {
            let items = entry
                .items
                .iter()
                .map(|item| format!("{} (${:.2})", item.name, item.amount))
                .collect::<Vec<_>>()
                .join("; ");
            rows.push(vec![
                entry.receiver.clone(),
                palette::normalize(&entry.category),
                items,
                format!("{:.2}", entry.subtotal),
                format!("{:.2}", entry.tax),
                format!("{:.2}", entry.total),
                entry.notes.clone(),
            ]);
        }
        rows
    }

    pub fn save(&self) -> Result<(), LedgerPersistenceError> {
        let path = get_storage_path()?;
        self.save_to_path(path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), LedgerPersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let snapshot = LedgerSnapshot {
            next_id: self.next_id,
            entries: self.entries.clone(),
        };

        let data = serde_json::to_vec_pretty(&snapshot)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn load() -> Result<Self, LedgerPersistenceError> {
        let path = get_storage_path()?;
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, LedgerPersistenceError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => {
                let snapshot: LedgerSnapshot = serde_json::from_str(&contents)?;
                Ok(Self {
                    entries: snapshot.entries,
                    next_id: snapshot.next_id,
                })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }
}

fn build_entry(id: u64, draft: EntryDraft, created_at: NaiveDate) -> Result<Entry, LedgerError> {
    let receiver = draft.receiver.trim();
    if receiver.is_empty() {
        return Err(LedgerError::MissingReceiver);
    }
    if draft.category.trim().is_empty() {
        return Err(LedgerError::MissingCategory);
    }
    if !(1..=12).contains(&draft.month) {
        return Err(LedgerError::InvalidMonth { month: draft.month });
    }

    let items: Vec<LineItem> = draft
        .items
        .into_iter()
        .filter(|item| !item.name.trim().is_empty())
        .map(|item| LineItem {
            name: item.name.trim().to_string(),
            amount: item.amount,
        })
        .collect();
    if items.is_empty() {
        return Err(LedgerError::NoItems);
    }

    let subtotal: f64 = items.iter().map(|item| item.amount).sum();
    let total = subtotal + draft.tax;

    Ok(Entry {
        id,
        receiver: receiver.to_string(),
        items,
        subtotal,
        tax: draft.tax,
        total,
        category: draft.category.trim().to_string(),
        notes: draft.notes,
        month: draft.month,
        year: draft.year,
        created_at,
    })
}

fn entry_matches(entry: &Entry, needle: &str) -> bool {
    if entry.receiver.to_lowercase().contains(needle)
        || entry.category.to_lowercase().contains(needle)
        || entry.notes.to_lowercase().contains(needle)
    {
        return true;
    }

    if entry.items.iter().any(|item| {
        item.name.to_lowercase().contains(needle) || format!("{:.2}", item.amount).contains(needle)
    }) {
        return true;
    }

    format!("{:.2}", entry.subtotal).contains(needle)
        || format!("{:.2}", entry.tax).contains(needle)
        || format!("{:.2}", entry.total).contains(needle)
}

pub fn get_storage_path() -> Result<PathBuf, LedgerPersistenceError> {
    if let Ok(custom) = env::var("HAMAI_LEDGER_PATH") {
        return Ok(PathBuf::from(custom));
    }
    let base = config_dir().ok_or(LedgerPersistenceError::MissingConfigDir)?;
    Ok(base.join("hamai").join("ledger.json"))
}
