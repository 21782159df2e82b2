//! Plain-text rendering of controller state.

use std::fmt::Write as _;

use client_core::{ChatSnapshot, DiagnosisPayload, DiagnosisView};
use shared::{domain::ChatRole, protocol::ChatTurn};

pub const NO_DIAGNOSIS: &str = "No Finance Health Summary available.";
pub const EMPTY_CHAT: &str = "Your conversation starts here...";
pub const THINKING: &str = "AI is thinking...";

/// `display_name` is the name the user signed up with, never the raw id.
pub fn diagnosis(result: Option<&DiagnosisPayload>, display_name: Option<&str>) -> String {
    let Some(result) = result else {
        return format!("{NO_DIAGNOSIS}\n");
    };

    let mut out = match display_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("Hello, {name}\n"),
        None => String::new(),
    };
    out.push_str("Here's your personalized Finance Health Summary\n");
    match result.view() {
        DiagnosisView::Structured(diagnosis) => {
            if let Some(summary) = diagnosis.summary.filter(|s| !s.trim().is_empty()) {
                let _ = write!(out, "\nSummary\n  {summary}\n");
            }
            push_list(&mut out, "Top Insights", &diagnosis.insights);
            push_list(&mut out, "Recommendations", &diagnosis.recommendations);
        }
        DiagnosisView::RawText(raw) => {
            let _ = write!(out, "\n{}\n", raw.trim());
        }
        DiagnosisView::Opaque(value) => {
            let body =
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
            let _ = write!(out, "\n{body}\n");
        }
    }
    out
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "\n{title}\n");
    for item in items {
        let _ = writeln!(out, "  - {item}");
    }
}

pub fn turn(turn: &ChatTurn) -> String {
    match turn.role {
        ChatRole::User => format!("you> {}", turn.content),
        ChatRole::Assistant => format!("ai>  {}", turn.content),
    }
}

/// Lines for the transcript from `from` onwards, followed by the status line
/// the chat view shows under it.
pub fn chat_update(snapshot: &ChatSnapshot, from: usize) -> Vec<String> {
    let mut lines: Vec<String> = snapshot.history.iter().skip(from).map(turn).collect();

    if snapshot.history.is_empty() && !snapshot.chat_loading && snapshot.chat_error.is_none() {
        lines.push(EMPTY_CHAT.to_string());
    }
    if snapshot.chat_loading {
        lines.push(THINKING.to_string());
    }
    if let Some(error) = &snapshot.chat_error {
        lines.push(format!("Error: {error}"));
    }
    lines
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
