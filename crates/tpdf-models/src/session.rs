//! Anonymous session types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// An anonymous browsing session, persisted under `session:<id>`.
///
/// Sessions own jobs exclusively: a job id appears in at most one session's
/// job set, and ownership checks gate renames and history listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Owning user tag (a guest tag unless real auth is layered on top)
    pub user_tag: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Refreshed on every read
    pub last_activity: DateTime<Utc>,
    /// Free-form user settings, merged (not replaced) on save
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,
}

impl Session {
    pub fn new(user_tag: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_tag: user_tag.into(),
            created_at: now,
            last_activity: now,
            settings: HashMap::new(),
        }
    }

    /// Mark the session as just used.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// One entry in a session's job history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionJobEntry {
    pub job_id: JobId,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_advances_last_activity() {
        let mut session = Session::new("guest_1");
        let before = session.last_activity;
        session.touch();
        assert!(session.last_activity >= before);
        assert_eq!(session.created_at, before);
    }

    #[test]
    fn settings_default_to_empty_on_deserialize() {
        let json = r#"{"user_tag":"guest_2","created_at":"2026-01-01T00:00:00Z","last_activity":"2026-01-01T00:00:00Z"}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert!(session.settings.is_empty());
    }
}
