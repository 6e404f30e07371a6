use std::io::Write;

use parley_types::RenderEvent;
use tokio::sync::mpsc::UnboundedReceiver;

/// Writes render events to stdout as they arrive
///
/// Text updates carry the whole message, so only the unseen suffix is
/// printed; when the text is rewritten (placeholder replaced) the line
/// starts over.
pub async fn print_events(mut rx: UnboundedReceiver<RenderEvent>) {
    let mut printed = String::new();
    let mut thought = String::new();
    let mut stdout = std::io::stdout();

    while let Some(event) = rx.recv().await {
        match event {
            RenderEvent::MessageStarted { .. } => {
                printed.clear();
                let _ = write!(stdout, "assistant> ");
            }
            RenderEvent::TextUpdated { text, .. } => {
                match text.strip_prefix(printed.as_str()) {
                    Some(suffix) => {
                        let _ = write!(stdout, "{}", suffix);
                    }
                    None => {
                        let _ = write!(stdout, "\nassistant> {}", text);
                    }
                }
                printed = text;
            }
            RenderEvent::StepAppended { step, .. } => {
                let _ = write!(stdout, "\n  [step {}] {}", step.loop_num, step.thought);
                thought = step.thought;
            }
            RenderEvent::StepExtended { step, .. } => {
                if let Some(suffix) = step.thought.strip_prefix(thought.as_str()) {
                    let _ = write!(stdout, "{}", suffix);
                }
                thought = step.thought;
            }
            RenderEvent::ReferenceResolved {
                reference_id, url, ..
            } => {
                let _ = write!(stdout, "\n  [{}] {}", reference_id, url);
            }
            RenderEvent::ReferenceFailed { reference_id, .. } => {
                let _ = write!(stdout, "\n  [{}] unavailable", reference_id);
            }
            RenderEvent::TurnFinalized { message } => {
                if !printed.is_empty() || message.text.is_empty() {
                    let _ = writeln!(stdout);
                } else {
                    let _ = writeln!(stdout, "assistant> {}", message.text);
                }
                printed.clear();
            }
            RenderEvent::TurnAborted { message: None } => {
                let _ = writeln!(stdout, "\n[cancelled]");
            }
            RenderEvent::TurnAborted { message: Some(_) } => {
                let _ = writeln!(stdout, "[cancelled, partial answer kept]");
            }
            RenderEvent::SessionStarted { session_id } => {
                let _ = writeln!(stdout, "[new session {}]", session_id);
            }
            RenderEvent::SessionLoaded {
                session_id,
                messages,
            } => {
                let _ = writeln!(stdout, "[session {}]", session_id);
                for message in messages.iter().filter(|m| !m.text.is_empty()) {
                    let _ = writeln!(stdout, "{}> {}", message.role.as_str(), message.text);
                }
            }
            RenderEvent::FeedbackChanged { feedback, .. } => {
                let _ = writeln!(stdout, "[feedback: {:?}]", feedback);
            }
            RenderEvent::LoadingChanged { .. } | RenderEvent::UserMessageAdded { .. } => {}
        }
        let _ = stdout.flush();
    }
}
