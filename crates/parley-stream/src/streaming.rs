use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type the backend uses for streamed frames; seen with no content on
/// record it stands for a failed answer.
pub const STREAMING_EVENT: &str = "streaming";

/// Content carried by one decoded event
///
/// The backend nests it at `data.choices[0].delta`: a string `content` is
/// answer text, an object `content` is a structured thought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeltaPayload {
    Text {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<String>,
    },

    Thought {
        thought: String,
        loop_num: i64,
    },
}

impl DeltaPayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            step: None,
        }
    }

    pub fn text_in_step(content: impl Into<String>, step: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            step: Some(step.into()),
        }
    }

    pub fn thought(thought: impl Into<String>, loop_num: i64) -> Self {
        Self::Thought {
            thought: thought.into(),
            loop_num,
        }
    }

    /// Parse the `data` field of one event
    ///
    /// Returns `Ok(None)` for well-formed frames that carry nothing to apply
    /// (keep-alives, role-only deltas, empty content, thoughts without text).
    pub fn parse(data: &str) -> Result<Option<Self>> {
        let value: Value = serde_json::from_str(data).context("Invalid JSON in event data")?;

        if !value.is_object() {
            anyhow::bail!("Event data is not a JSON object");
        }

        let Some(delta) = value.pointer("/data/choices/0/delta") else {
            return Ok(None);
        };

        let payload = match delta.get("content") {
            Some(Value::String(content)) if !content.is_empty() => Some(Self::Text {
                content: content.clone(),
                step: delta.get("step").and_then(step_id),
            }),
            Some(Value::Object(object)) => object
                .get("thought")
                .and_then(Value::as_str)
                .filter(|thought| !thought.is_empty())
                .map(|thought| Self::Thought {
                    thought: thought.to_string(),
                    loop_num: object.get("loop_num").and_then(Value::as_i64).unwrap_or(0),
                }),
            _ => None,
        };

        Ok(payload)
    }
}

// Falsy identifiers ("" and 0) mean "no step"
fn step_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}
