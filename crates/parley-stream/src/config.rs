use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_streaming() -> bool {
    true
}

/// Where and how chat requests are sent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub url: String,
    /// Extra request headers, passed through untouched
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_streaming")]
    pub streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            streaming: true,
            timeout_secs: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_defaults_on() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"url":"http://localhost/chat"}"#).unwrap();

        assert!(config.streaming);
        assert!(config.headers.is_empty());
        assert_eq!(config.timeout_secs, None);
    }

    #[test]
    fn test_builder() {
        let config = TransportConfig::new("http://localhost/chat")
            .header("Authorization", "Bearer t")
            .streaming(false)
            .timeout_secs(30);

        assert!(!config.streaming);
        assert_eq!(config.headers.get("Authorization").map(String::as_str), Some("Bearer t"));
        assert_eq!(config.timeout_secs, Some(30));
    }
}
