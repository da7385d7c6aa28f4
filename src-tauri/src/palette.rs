//! Category color registry. Categories are free-form user strings; every
//! category ever seen gets exactly one display color, stable across
//! restarts, shared by the table, the pie chart, and the inline editors.
//! Palette values are 6-digit hex so the frontend can apply them directly.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dirs::config_dir;
use indexmap::IndexMap;
use rand::Rng;

/// Fixed allocation order. The first entry not currently in use is handed to
/// the next new category; only after all 28 are taken do we synthesize colors.
pub const PALETTE: [&str; 28] = [
    "#22c55e", // green
    "#3b82f6", // blue
    "#f97316", // orange
    "#0ea5e9", // sky
    "#a855f7", // purple
    "#14b8a6", // teal
    "#ef4444", // red
    "#6366f1", // indigo
    "#eab308", // yellow
    "#10b981", // emerald
    "#06b6d4", // cyan
    "#8b5cf6", // violet
    "#f59e0b", // amber
    "#84cc16", // lime
    "#64748b", // slate
    "#2dd4bf", // turquoise
    "#f43f5e", // rose
    "#0d9488", // teal dark
    "#7c3aed", // purple dark
    "#dc2626", // red dark
    "#059669", // emerald dark
    "#0284c7", // sky dark
    "#c026d3", // fuchsia
    "#ea580c", // orange dark
    "#65a30d", // lime dark
    "#0891b2", // cyan dark
    "#9333ea", // violet dark
    "#be123c", // rose dark
];

/// Key used when a label is empty or missing.
pub const FALLBACK_CATEGORY: &str = "other";

/// Canonical form of a category label: trimmed, lowercased, never empty.
/// All lookups and inserts go through this; nothing else lowercases.
pub fn normalize(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        FALLBACK_CATEGORY.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// First palette color not present among the current assignment values, or a
/// synthesized HSL color once the palette is exhausted. Pure; callers decide
/// whether the result gets recorded.
pub fn allocate(assignments: &IndexMap<String, String>) -> String {
    for color in PALETTE {
        if !assignments.values().any(|used| used == color) {
            return color.to_string();
        }
    }
    overflow_color()
}

fn overflow_color() -> String {
    let mut rng = rand::rng();
    let hue: u16 = rng.random_range(0..360);
    let saturation: u8 = rng.random_range(60..90);
    let lightness: u8 = rng.random_range(45..60);
    format!("hsl({hue}, {saturation}%, {lightness}%)")
}

#[derive(Debug, thiserror::Error)]
pub enum PaletteStoreError {
    #[error("config directory unavailable")]
    MissingConfigDir,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Persistent category -> color mapping.
///
/// Insertion order is preserved, so iteration (and the persisted JSON) is
/// deterministic for a given allocation history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryColors {
    assignments: IndexMap<String, String>,
}

impl Default for CategoryColors {
    fn default() -> Self {
        Self {
            assignments: seed_assignments(),
        }
    }
}

fn seed_assignments() -> IndexMap<String, String> {
    let mut assignments = IndexMap::new();
    assignments.insert("grocery".to_string(), "#22c55e".to_string());
    assignments.insert("utilities".to_string(), "#3b82f6".to_string());
    assignments.insert("rent".to_string(), "#f97316".to_string());
    assignments
}

impl CategoryColors {
    /// Raw read: the color for `label` if one has been assigned. Never
    /// allocates.
    pub fn color_for(&self, label: &str) -> Option<&str> {
        self.assignments.get(&normalize(label)).map(String::as_str)
    }

    /// Resolve without recording: the existing color if the category is
    /// known, otherwise what `allocate` would hand out right now. The
    /// computed color is not stored, so repeated calls for distinct unknown
    /// labels may return the same value.
    pub fn peek(&self, label: &str) -> String {
        match self.color_for(label) {
            Some(color) => color.to_string(),
            None => allocate(&self.assignments),
        }
    }

    /// Resolve-or-allocate: the existing color if present, otherwise the
    /// first free palette color (or an overflow color), recorded before
    /// returning. Callers that want the assignment to survive a restart
    /// follow up with [`CategoryColors::save`].
    pub fn resolve(&mut self, label: &str) -> String {
        let key = normalize(label);
        if let Some(color) = self.assignments.get(&key) {
            return color.clone();
        }
        let color = allocate(&self.assignments);
        self.assignments.insert(key, color.clone());
        color
    }

    /// Batch resolve. Each newly allocated color is inserted before the next
    /// label is considered, so one call never hands the same palette color to
    /// two labels. Returns true if any assignment was added.
    pub fn ensure<I, S>(&mut self, labels: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut changed = false;
        for label in labels {
            let key = normalize(label.as_ref());
            if self.assignments.contains_key(&key) {
                continue;
            }
            let color = allocate(&self.assignments);
            self.assignments.insert(key, color);
            changed = true;
        }
        changed
    }

    pub fn assignments(&self) -> &IndexMap<String, String> {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn save(&self) -> Result<(), PaletteStoreError> {
        let path = storage_path()?;
        self.save_to_path(path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), PaletteStoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec_pretty(&self.assignments)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Load the persisted mapping. Absence, unreadable content, or malformed
    /// JSON all degrade to the default seed; this never fails and never
    /// writes.
    pub fn load() -> Self {
        match storage_path() {
            Ok(path) => Self::load_from_path(path),
            Err(err) => {
                tracing::warn!(?err, "category color store path unavailable, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                tracing::warn!(?err, path = %path.display(), "failed to read category colors");
                return Self::default();
            }
        };

        match serde_json::from_str::<IndexMap<String, String>>(&contents) {
            Ok(assignments) => Self { assignments },
            Err(err) => {
                tracing::warn!(?err, path = %path.display(), "corrupt category color store, using defaults");
                Self::default()
            }
        }
    }
}

pub fn storage_path() -> Result<PathBuf, PaletteStoreError> {
    if let Ok(custom) = env::var("HAMAI_COLORS_PATH") {
        return Ok(PathBuf::from(custom));
    }
    let base = config_dir().ok_or(PaletteStoreError::MissingConfigDir)?;
    Ok(base.join("hamai").join("category_colors.json"))
}
