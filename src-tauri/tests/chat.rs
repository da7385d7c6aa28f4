use std::sync::mpsc;
use std::time::Duration;
use std::{env, sync::Mutex, sync::MutexGuard, sync::OnceLock};

use hamai_lib::{chat, commands, AppState};
use tauri::{Listener, Manager};
use tempfile::TempDir;

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

struct StoreEnvGuard {
    _dir: TempDir,
    _guard: MutexGuard<'static, ()>,
}

impl StoreEnvGuard {
    fn new() -> Self {
        let guard = ENV_MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .expect("lock env mutex");
        let dir = tempfile::tempdir().expect("create temp dir");
        env::set_var("HAMAI_LEDGER_PATH", dir.path().join("ledger.json"));
        env::set_var("HAMAI_COLORS_PATH", dir.path().join("category_colors.json"));
        Self {
            _dir: dir,
            _guard: guard,
        }
    }
}

impl Drop for StoreEnvGuard {
    fn drop(&mut self) {
        env::remove_var("HAMAI_LEDGER_PATH");
        env::remove_var("HAMAI_COLORS_PATH");
    }
}

fn build_test_app() -> (
    tauri::App<tauri::test::MockRuntime>,
    tauri::WebviewWindow<tauri::test::MockRuntime>,
) {
    tauri::test::mock_builder()
        .manage(AppState::new())
        .invoke_handler(tauri::generate_handler![
            commands::entry_count,
            commands::add_entry,
            commands::spending_summary
        ])
        .setup(|app| {
            chat::register(app.handle().clone());
            Ok(())
        })
        .build(tauri::test::mock_context(tauri::test::noop_assets()))
        .and_then(|app| {
            let webview =
                tauri::WebviewWindowBuilder::new(&app, "main", Default::default()).build()?;
            Ok((app, webview))
        })
        .expect("failed to build app")
}

#[test]
fn mrham_answers_with_a_spending_digest() {
    let _env = StoreEnvGuard::new();
    let (_app, webview) = build_test_app();
    let handle = webview.app_handle();
    let (tx, rx) = mpsc::channel::<String>();

    let _listener = handle.listen_any("mrham-answer", move |event| {
        tx.send(event.payload().to_string()).unwrap();
    });

    chat::handle_payload(handle, r#"{"text":"How am I doing?"}"#);

    let response_json = rx
        .recv_timeout(Duration::from_millis(100))
        .expect("receive mrham answer");

    let value: serde_json::Value = serde_json::from_str(&response_json).expect("parse response");
    let text = value["text"].as_str().expect("answer text");
    assert!(text.contains("don't see any transactions"));
}

#[test]
fn mrham_ignores_malformed_and_empty_questions() {
    let _env = StoreEnvGuard::new();
    let (_app, webview) = build_test_app();
    let handle = webview.app_handle();
    let (tx, rx) = mpsc::channel::<String>();

    let _listener = handle.listen_any("mrham-answer", move |event| {
        tx.send(event.payload().to_string()).unwrap();
    });

    chat::handle_payload(handle, "not json");
    chat::handle_payload(handle, r#"{"text":"   "}"#);

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}
