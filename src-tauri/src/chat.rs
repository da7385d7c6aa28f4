//! Mr. Ham event plumbing. The frontend emits questions, we answer with a
//! digest built from the ledger; natural-language answering proper lives in
//! the backend collaborator, not here.

use serde::{Deserialize, Serialize};
use tauri::{AppHandle, Emitter, Listener, Manager, Runtime};
use tracing::error;

use crate::api::StatsScope;
use crate::ledger::SpendSummary;
use crate::AppState;

const QUESTION_EVENT: &str = "mrham-question";
const ANSWER_EVENT: &str = "mrham-answer";

#[derive(Debug, Deserialize)]
struct QuestionPayload {
    text: String,
}

#[derive(Clone, Debug, Serialize)]
struct AnswerPayload {
    text: String,
}

pub fn register<R: Runtime>(app: AppHandle<R>) {
    let handle = app.clone();

    app.listen_any(QUESTION_EVENT, move |event| {
        handle_payload(&handle, event.payload());
    });
}

pub fn handle_payload<R: Runtime>(handle: &AppHandle<R>, payload: &str) {
    if payload.is_empty() {
        return;
    }

    let question: QuestionPayload = match serde_json::from_str(payload) {
        Ok(question) => question,
        Err(err) => {
            error!(?err, "failed to parse mrham-question payload");
            return;
        }
    };

    if question.text.trim().is_empty() {
        return;
    }

    let summary = {
        let state = handle.state::<AppState>();
        let ledger = state.get_ledger();
        ledger.summary(StatsScope::Overall)
    };

    let response = AnswerPayload {
        text: digest(&summary),
    };

    if let Err(err) = handle.emit(ANSWER_EVENT, response) {
        error!(?err, "failed to emit mrham-answer event");
    }
}

fn digest(summary: &SpendSummary) -> String {
    if summary.total_entries == 0 {
        return "Oink! I don't see any transactions yet. Add a few and ask me again.".to_string();
    }

    let top = summary
        .category_totals
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1));

    match top {
        Some((category, amount)) => format!(
            "Oink oink! You've recorded {} transactions totalling ${:.2}. Your biggest category is {} at ${:.2}.",
            summary.total_entries, summary.total_spent, category, amount
        ),
        None => format!(
            "Oink oink! You've recorded {} transactions totalling ${:.2}.",
            summary.total_entries, summary.total_spent
        ),
    }
}
