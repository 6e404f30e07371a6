//! Text rendering seam and the default reference scanner
//!
//! The engine never interprets markdown itself. It hands the accumulated
//! text to a [`ContentRenderer`] and keeps whatever opaque reference ids the
//! renderer reports, so they can be resolved when the turn finalizes.

use serde_json::Value;

/// Placeholder id the backend emits for contracts it could not identify
const MISSING_ID: &str = "N/A";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedContent {
    /// Renderer output handed to the display layer
    pub display: String,
    /// Opaque reference ids found in the text, in discovery order
    pub references: Vec<String>,
}

/// Turns accumulated message text into display output
pub trait ContentRenderer: Send + Sync {
    fn render(&self, text: &str) -> RenderedContent;
}

/// Default renderer: normalizes the text and scans it for embedded references
///
/// Recognized forms:
/// - a fenced ```` ```image ```` block holding `{"contract": "<id>"}`
/// - an inline code span `` `image {"contract": "<id>"}` ``
/// - a fenced ```` ```report ```` block holding `{"contractId": "<id>",
///   "directReports": [{"contractId": "<id>"}, ...]}`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceScanner;

impl ContentRenderer for ReferenceScanner {
    fn render(&self, text: &str) -> RenderedContent {
        let display = normalize_display_text(text);
        let references = scan_references(&display);
        RenderedContent {
            display,
            references,
        }
    }
}

/// Strips leading whitespace from every line so indented prose never turns
/// into a code block, collapses escaped paragraph breaks and drops the
/// "Photo/Documents" label the backend leaks into answers
pub fn normalize_display_text(text: &str) -> String {
    text.split('\n')
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n")
        .replace("\\n\\n", "\n")
        .replace("Photo/Documents", "")
}

fn scan_references(text: &str) -> Vec<String> {
    let mut references = Vec::new();
    let mut fence: Option<(String, String)> = None;

    for line in text.lines() {
        match fence.as_mut() {
            None => {
                if let Some(info) = line.strip_prefix("```") {
                    fence = Some((info.trim().to_string(), String::new()));
                } else {
                    scan_inline(line, &mut references);
                }
            }
            Some((info, body)) => {
                if line.trim_start().starts_with("```") {
                    scan_block(info, body, &mut references);
                    fence = None;
                } else {
                    body.push_str(line);
                    body.push('\n');
                }
            }
        }
    }

    // An unterminated fence runs to the end of the text
    if let Some((info, body)) = fence {
        scan_block(&info, &body, &mut references);
    }

    references
}

fn scan_block(info: &str, body: &str, references: &mut Vec<String>) {
    let lang = info.split_whitespace().next().unwrap_or_default();
    match lang {
        "image" => {
            if let Some(value) = parse_json(body) {
                push_reference(value.get("contract"), references);
            }
        }
        "report" => {
            if let Some(value) = parse_json(body) {
                push_reference(value.get("contractId"), references);
                if let Some(reports) = value.get("directReports").and_then(Value::as_array) {
                    for report in reports {
                        push_reference(report.get("contractId"), references);
                    }
                }
            }
        }
        _ => {}
    }
}

fn scan_inline(line: &str, references: &mut Vec<String>) {
    let mut rest = line;
    while let Some(start) = rest.find('`') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('`') else {
            break;
        };
        if let Some(json) = after[..end].strip_prefix("image") {
            if let Some(value) = parse_json(json) {
                push_reference(value.get("contract"), references);
            }
        }
        rest = &after[end + 1..];
    }
}

fn parse_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Some(value),
        Err(e) => {
            // Mid-stream the block is usually still incomplete
            tracing::trace!("Skipping unparsable reference block: {}", e);
            None
        }
    }
}

fn push_reference(value: Option<&Value>, references: &mut Vec<String>) {
    if let Some(id) = value.and_then(Value::as_str) {
        if !id.is_empty() && id != MISSING_ID {
            references.push(id.to_string());
        }
    }
}
