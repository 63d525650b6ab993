//! Signed-in user identity, persisted across daemon restarts.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// User id sent to the recognizer when nobody is signed in.
const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl SessionContext {
    /// Load the saved session; a missing file is a signed-out session.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read session {:?}: {e}", path))?;
        serde_json::from_str(&text).map_err(|e| format!("Invalid session file {:?}: {e}", path))
    }

    /// Persist the session. Signing out removes the file.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if !self.is_signed_in() {
            if path.exists() {
                std::fs::remove_file(path)
                    .map_err(|e| format!("Failed to remove session {:?}: {e}", path))?;
            }
            return Ok(());
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to encode session: {e}"))?;
        std::fs::write(path, text).map_err(|e| format!("Failed to write session {:?}: {e}", path))
    }

    pub fn sign_in(&mut self, user_id: String, access_token: String, email: String) {
        self.user_id = Some(user_id);
        self.access_token = Some(access_token);
        self.email = Some(email);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id().is_some()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Identity reported to the recognizer.
    pub fn recognition_user(&self) -> &str {
        self.user_id().unwrap_or(ANONYMOUS)
    }
}
