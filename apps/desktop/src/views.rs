use std::io::Write;

use anyhow::Result;
use client_core::{ChatError, ChatScope, DiagnosisScope};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::render;

pub const CLEAR_COMMAND: &str = "/clear";
pub const QUIT_COMMAND: &str = "/quit";

pub async fn run_diagnosis(
    scope: &DiagnosisScope,
    refresh: bool,
    display_name: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    if scope.current().is_none() {
        writeln!(out, "User not authenticated. Cannot load insights.")?;
        write!(out, "{}", render::diagnosis(None, None))?;
        return Ok(());
    }

    let outcome = if refresh {
        scope.refresh_diagnosis().await
    } else {
        scope.ensure_diagnosis().await
    };
    if let Err(err) = &outcome {
        warn!(error = %err, "financial diagnosis unavailable");
        writeln!(out, "Error: {err}")?;
    }

    let snapshot = scope.diagnosis().snapshot();
    write!(out, "{}", render::diagnosis(snapshot.result.as_ref(), display_name))?;
    Ok(())
}

/// Line-oriented chat: one message per input line until EOF or `/quit`.
pub async fn run_chat<R>(scope: &ChatScope, input: R, out: &mut impl Write) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    if scope.current().is_none() {
        writeln!(out, "User not authenticated. Cannot send message.")?;
        return Ok(());
    }

    let mut shown = 0;
    print_update(scope, out, &mut shown)?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            writeln!(out, "Please enter a message.")?;
            continue;
        }
        if trimmed == QUIT_COMMAND {
            break;
        }
        if trimmed == CLEAR_COMMAND {
            scope.clear_history();
            shown = 0;
            print_update(scope, out, &mut shown)?;
            continue;
        }

        match scope.send_message(&line).await {
            Ok(_) => {}
            // Remote failures are rendered from `chat_error`.
            Err(ChatError::Remote { message, .. }) => debug!(%message, "chat send failed"),
            Err(err) => writeln!(out, "{err}")?,
        }
        print_update(scope, out, &mut shown)?;
    }

    Ok(())
}

fn print_update(scope: &ChatScope, out: &mut impl Write, shown: &mut usize) -> Result<()> {
    let snapshot = scope.chat().snapshot();
    for line in render::chat_update(&snapshot, *shown) {
        writeln!(out, "{line}")?;
    }
    *shown = snapshot.history.len();
    Ok(())
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
