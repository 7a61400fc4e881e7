use serde::{Deserialize, Serialize};

/// Coordinator submitting a decision, recorded in the conflict notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_name: Option<String>,
}

impl UserContext {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            user_name: None,
        }
    }

    pub fn with_name(user_id: String, name: Option<String>) -> Self {
        Self {
            user_id,
            user_name: name,
        }
    }

    /// Context for detection passes and other internal operations
    pub fn system() -> Self {
        Self {
            user_id: "system".to_string(),
            user_name: Some("System".to_string()),
        }
    }

    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(&self.user_id)
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::system()
    }
}
