use std::sync::Mutex;

pub mod api;
pub mod chat;
pub mod ledger;
pub mod palette;

pub struct AppState {
    ledger: Mutex<ledger::Ledger>,
    colors: Mutex<palette::CategoryColors>,
}

impl AppState {
    pub fn new() -> Self {
        let ledger = ledger::Ledger::load().unwrap_or_default();
        let colors = palette::CategoryColors::load();
        Self {
            ledger: Mutex::new(ledger),
            colors: Mutex::new(colors),
        }
    }

    pub fn get_ledger(&self) -> std::sync::MutexGuard<'_, ledger::Ledger> {
        self.ledger.lock().expect("ledger lock poisoned")
    }

    pub fn get_colors(&self) -> std::sync::MutexGuard<'_, palette::CategoryColors> {
        self.colors.lock().expect("color registry lock poisoned")
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub mod commands {
    use super::*;
    use indexmap::IndexMap;
    use tauri::State;

    #[tauri::command]
    pub fn entry_count(state: State<AppState>) -> Result<usize, String> {
        let ledger = state.get_ledger();
        Ok(ledger.entry_count())
    }

    #[tauri::command]
    pub fn add_entry(
        state: State<AppState>,
        draft: api::EntryDraft,
    ) -> Result<ledger::Entry, String> {
        let mut ledger = state.get_ledger();
        let entry = ledger.add(draft).map_err(|err| err.to_string())?.clone();
        if let Err(err) = ledger.save() {
            tracing::warn!(?err, "failed to save ledger after add");
        }
        drop(ledger);

        // New categories get their color the moment the entry lands, so the
        // table and the chart agree on first render.
        let mut colors = state.get_colors();
        if colors.ensure([entry.category.as_str()]) {
            if let Err(err) = colors.save() {
                tracing::warn!(?err, "failed to save category colors after add");
            }
        }

        Ok(entry)
    }

    #[tauri::command]
    pub fn update_entry(
        state: State<AppState>,
        id: u64,
        draft: api::EntryDraft,
    ) -> Result<ledger::Entry, String> {
        let mut ledger = state.get_ledger();
        let entry = ledger
            .update(id, draft)
            .map_err(|err| err.to_string())?
            .clone();
        if let Err(err) = ledger.save() {
            tracing::warn!(?err, "failed to save ledger after update");
        }
        drop(ledger);

        let mut colors = state.get_colors();
        if colors.ensure([entry.category.as_str()]) {
            if let Err(err) = colors.save() {
                tracing::warn!(?err, "failed to save category colors after update");
            }
        }

        Ok(entry)
    }

    #[tauri::command]
    pub fn delete_entry(state: State<AppState>, id: u64) -> Result<(), String> {
        let mut ledger = state.get_ledger();
        ledger.remove(id).map_err(|err| err.to_string())?;
        if let Err(err) = ledger.save() {
            tracing::warn!(?err, "failed to save ledger after delete");
        }
        Ok(())
    }

    #[tauri::command]
    pub fn get_entry(state: State<AppState>, id: u64) -> Result<ledger::Entry, String> {
        let ledger = state.get_ledger();
        ledger
            .entry(id)
            .cloned()
            .ok_or_else(|| format!("entry not found: {id}"))
    }

    #[tauri::command]
    pub fn entries_for_month(
        state: State<AppState>,
        month: u32,
        year: i32,
    ) -> Result<Vec<ledger::Entry>, String> {
        let ledger = state.get_ledger();
        Ok(ledger
            .entries_for(month, year)
            .into_iter()
            .cloned()
            .collect())
    }

    #[tauri::command]
    pub fn spending_summary(
        state: State<AppState>,
        scope: api::StatsScope,
    ) -> Result<ledger::SpendSummary, String> {
        let ledger = state.get_ledger();
        Ok(ledger.summary(scope))
    }

    #[tauri::command]
    pub fn search_entries(
        state: State<AppState>,
        query: api::TableQuery,
    ) -> Result<Vec<ledger::Entry>, String> {
        let ledger = state.get_ledger();
        Ok(ledger.search(&query).into_iter().cloned().collect())
    }

    #[tauri::command]
    pub fn export_rows(
        state: State<AppState>,
        query: api::TableQuery,
    ) -> Result<Vec<Vec<String>>, String> {
        let ledger = state.get_ledger();
        Ok(ledger.export_rows(&query))
    }

    #[tauri::command]
    pub fn earliest_recorded_month(state: State<AppState>) -> Result<Option<(i32, u32)>, String> {
        let ledger = state.get_ledger();
        Ok(ledger.earliest_month())
    }

    #[tauri::command]
    pub fn list_categories(state: State<AppState>) -> Result<Vec<String>, String> {
        let ledger = state.get_ledger();
        Ok(ledger.categories())
    }

    #[tauri::command]
    pub fn list_receivers(state: State<AppState>) -> Result<Vec<String>, String> {
        let ledger = state.get_ledger();
        Ok(ledger.receivers())
    }

    /// Read-only view of the current category -> color assignments.
    #[tauri::command]
    pub fn category_colors(state: State<AppState>) -> Result<IndexMap<String, String>, String> {
        let colors = state.get_colors();
        Ok(colors.assignments().clone())
    }

    #[tauri::command]
    pub fn resolve_category_color(
        state: State<AppState>,
        label: String,
    ) -> Result<String, String> {
        let mut colors = state.get_colors();
        let known = colors.color_for(&label).is_some();
        let color = colors.resolve(&label);
        if !known {
            if let Err(err) = colors.save() {
                tracing::warn!(?err, "failed to save category colors after resolve");
            }
        }
        Ok(color)
    }

    #[tauri::command]
    pub fn ensure_category_colors(
        state: State<AppState>,
        labels: Vec<String>,
    ) -> Result<(), String> {
        let mut colors = state.get_colors();
        if colors.ensure(&labels) {
            if let Err(err) = colors.save() {
                tracing::warn!(?err, "failed to save category colors after ensure");
            }
        }
        Ok(())
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            chat::register(app.handle().clone());
            Ok(())
        })
        .manage(AppState::new())
        .invoke_handler(tauri::generate_handler![
            commands::entry_count,
            commands::add_entry,
            commands::update_entry,
            commands::delete_entry,
            commands::get_entry,
            commands::entries_for_month,
            commands::spending_summary,
            commands::search_entries,
            commands::export_rows,
            commands::earliest_recorded_month,
            commands::list_categories,
            commands::list_receivers,
            commands::category_colors,
            commands::resolve_category_color,
            commands::ensure_category_colors
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
