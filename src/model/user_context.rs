use serde::{Deserialize, Serialize};

/// Author of an authoring session, taken from request headers and stamped
/// onto artifacts when they are saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

impl UserContext {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            user_email: None,
            user_name: None,
        }
    }

    pub fn with_details(user_id: String, email: Option<String>, name: Option<String>) -> Self {
        Self {
            user_id,
            user_email: email,
            user_name: name,
        }
    }

    /// Author used for catalog loading and other internal writes
    pub fn system() -> Self {
        Self {
            user_id: "system".to_string(),
            user_email: Some("system@cds-authoring.internal".to_string()),
            user_name: Some("System".to_string()),
        }
    }

    /// Fallback author when no identity headers are present
    pub fn default_user() -> Self {
        Self {
            user_id: "dev-user".to_string(),
            user_email: Some("dev@localhost".to_string()),
            user_name: Some("Development User".to_string()),
        }
    }

    /// Name for log lines: display name when known, id otherwise
    pub fn label(&self) -> &str {
        self.user_name.as_deref().unwrap_or(&self.user_id)
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::default_user()
    }
}
