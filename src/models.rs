use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of activity a session tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    #[default]
    Study,
    Quiz,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Study => "study",
            ActivityType::Quiz => "quiz",
        }
    }
}

/// User-editable fields describing a session before it starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub user_id: String,
    pub course_id: String,
    pub module: String,
    pub topic: String,
    pub activity_type: ActivityType,
}

impl Default for SessionDraft {
    fn default() -> Self {
        Self {
            user_id: "1".to_string(),
            course_id: String::new(),
            module: "Module 1".to_string(),
            topic: String::new(),
            activity_type: ActivityType::Study,
        }
    }
}

impl SessionDraft {
    /// Names of required fields that are blank. `module` is optional.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.user_id.is_empty() {
            missing.push("user_id");
        }
        if self.course_id.is_empty() {
            missing.push("course_id");
        }
        if self.topic.is_empty() {
            missing.push("topic");
        }
        missing
    }

    pub fn apply(&mut self, patch: DraftPatch) {
        if let Some(user_id) = patch.user_id {
            self.user_id = user_id;
        }
        if let Some(course_id) = patch.course_id {
            self.course_id = course_id;
        }
        if let Some(module) = patch.module {
            self.module = module;
        }
        if let Some(topic) = patch.topic {
            self.topic = topic;
        }
        if let Some(activity_type) = patch.activity_type {
            self.activity_type = activity_type;
        }
    }

    /// Draft left behind after a stop: course and topic cleared,
    /// module and activity type kept as sticky defaults.
    pub fn after_stop(&self) -> Self {
        Self {
            course_id: String::new(),
            topic: String::new(),
            ..self.clone()
        }
    }
}

/// Partial update to a draft
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftPatch {
    pub user_id: Option<String>,
    pub course_id: Option<String>,
    pub module: Option<String>,
    pub topic: Option<String>,
    pub activity_type: Option<ActivityType>,
}

/// Controller status, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Starting,
    Active,
    Stopping,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Starting => "starting",
            SessionStatus::Active => "active",
            SessionStatus::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// A session the remote has acknowledged as started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub session_id: Option<String>,
    pub started_fields: SessionDraft,
    pub started_at: DateTime<Utc>,
    pub clock_seconds: u64,
}

/// Read-only snapshot of the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SessionState {
    Idle { draft: SessionDraft },
    Starting { draft: SessionDraft },
    Active { session: ActiveSession },
    Stopping { session: ActiveSession },
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Idle { .. } => SessionStatus::Idle,
            SessionState::Starting { .. } => SessionStatus::Starting,
            SessionState::Active { .. } => SessionStatus::Active,
            SessionState::Stopping { .. } => SessionStatus::Stopping,
        }
    }

    pub fn session(&self) -> Option<&ActiveSession> {
        match self {
            SessionState::Active { session } | SessionState::Stopping { session } => Some(session),
            _ => None,
        }
    }

    pub fn draft(&self) -> Option<&SessionDraft> {
        match self {
            SessionState::Idle { draft } | SessionState::Starting { draft } => Some(draft),
            _ => None,
        }
    }

    pub fn clock_seconds(&self) -> u64 {
        self.session().map(|s| s.clock_seconds).unwrap_or(0)
    }
}

/// Body of `POST /sessions/start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartPayload {
    pub user_id: String,
    pub course_id: String,
    pub module: String,
    pub topic: String,
    pub activity_type: ActivityType,
}

impl From<&SessionDraft> for StartPayload {
    fn from(draft: &SessionDraft) -> Self {
        Self {
            user_id: draft.user_id.clone(),
            course_id: draft.course_id.clone(),
            module: draft.module.clone(),
            topic: draft.topic.clone(),
            activity_type: draft.activity_type,
        }
    }
}

/// Caller-supplied stop details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopRequest {
    pub notes: Option<String>,
    pub quiz_score: Option<f64>,
    pub quiz_passed: Option<bool>,
}

/// Body of `POST /sessions/stop`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopPayload {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_passed: Option<bool>,
}

impl StopPayload {
    /// The user always comes from the session being stopped.
    pub fn for_session(session: &SessionDraft, request: StopRequest) -> Self {
        Self {
            user_id: session.user_id.clone(),
            notes: request.notes,
            quiz_score: request.quiz_score,
            quiz_passed: request.quiz_passed,
        }
    }
}

/// Summary of a session the remote acknowledged as stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoppedSession {
    pub session_id: Option<String>,
    pub started_fields: SessionDraft,
    pub elapsed_seconds: u64,
}

/// Error envelope returned by the shell. `data` carries machine-readable detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> SessionDraft {
        SessionDraft {
            user_id: "u1".to_string(),
            course_id: "c1".to_string(),
            module: "M1".to_string(),
            topic: "t1".to_string(),
            activity_type: ActivityType::Quiz,
        }
    }

    #[test]
    fn test_missing_fields_ignores_module() {
        let draft = SessionDraft {
            module: String::new(),
            ..filled()
        };
        assert!(draft.missing_fields().is_empty());

        let blank = SessionDraft {
            course_id: String::new(),
            topic: String::new(),
            ..filled()
        };
        assert_eq!(blank.missing_fields(), vec!["course_id", "topic"]);
    }

    #[test]
    fn test_whitespace_counts_as_filled() {
        let draft = SessionDraft {
            course_id: " ".to_string(),
            topic: "  ".to_string(),
            ..filled()
        };
        assert!(draft.missing_fields().is_empty());
    }

    #[test]
    fn test_after_stop_keeps_sticky_fields() {
        let next = filled().after_stop();
        assert_eq!(next.course_id, "");
        assert_eq!(next.topic, "");
        assert_eq!(next.module, "M1");
        assert_eq!(next.user_id, "u1");
        assert_eq!(next.activity_type, ActivityType::Quiz);
    }

    #[test]
    fn test_patch_only_touches_given_fields() {
        let mut draft = SessionDraft::default();
        draft.apply(DraftPatch {
            topic: Some("ownership".to_string()),
            ..Default::default()
        });
        assert_eq!(draft.topic, "ownership");
        assert_eq!(draft.module, "Module 1");
    }

    #[test]
    fn test_stop_payload_omits_absent_fields() {
        let payload = StopPayload::for_session(
            &filled(),
            StopRequest {
                notes: Some("done".to_string()),
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({ "user_id": "u1", "notes": "done" }));
    }

    #[test]
    fn test_state_serializes_with_status_tag() {
        let state = SessionState::Idle {
            draft: SessionDraft::default(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["draft"]["activity_type"], "study");
    }
}
