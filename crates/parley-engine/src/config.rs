use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_intermediate_steps() -> bool {
    true
}

/// Who is chatting and what travels with every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub user_id: String,
    /// Generated when absent
    #[serde(default)]
    pub session_id: Option<String>,
    /// Apply structured thoughts as intermediate steps
    #[serde(default = "default_intermediate_steps")]
    pub intermediate_steps: bool,
    /// Extra fields merged into the request `input`
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl SessionConfig {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: None,
            intermediate_steps: true,
            params: Map::new(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_intermediate_steps(mut self, enabled: bool) -> Self {
        self.intermediate_steps = enabled;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}
