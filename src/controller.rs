//! Session lifecycle controller.
//!
//! Owns the single session state cell. Every remote effect round-trips
//! through a transient state (`Starting` / `Stopping`) so a duplicate call
//! made while the first is suspended is rejected instead of racing the
//! network. The state lock is never held across an await.
//!
//! `request_start` and `request_stop` must be driven to completion once
//! polled; dropping them mid-flight leaves the transient state in place.
//! Callers that may be cancelled should spawn them.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::clock::ElapsedClock;
use crate::error::ControllerError;
use crate::models::{
    ActiveSession, DraftPatch, SessionDraft, SessionState, SessionStatus, StartPayload,
    StopPayload, StopRequest, StoppedSession,
};
use crate::remote::{session_id_from_ack, SessionRemote};

/// Session identity held while active. The elapsed count lives in the clock.
#[derive(Debug, Clone)]
struct SessionRecord {
    session_id: Option<String>,
    started_fields: SessionDraft,
    started_at: DateTime<Utc>,
}

#[derive(Debug)]
enum Phase {
    Idle(SessionDraft),
    Starting(SessionDraft),
    Active(SessionRecord),
    Stopping(SessionRecord),
}

impl Phase {
    fn status(&self) -> SessionStatus {
        match self {
            Phase::Idle(_) => SessionStatus::Idle,
            Phase::Starting(_) => SessionStatus::Starting,
            Phase::Active(_) => SessionStatus::Active,
            Phase::Stopping(_) => SessionStatus::Stopping,
        }
    }
}

pub struct SessionController<R> {
    remote: R,
    clock: ElapsedClock,
    phase: Mutex<Phase>,
}

impl<R: SessionRemote> SessionController<R> {
    pub fn new(remote: R, clock: ElapsedClock, draft: SessionDraft) -> Self {
        Self {
            remote,
            clock,
            phase: Mutex::new(Phase::Idle(draft)),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn clock(&self) -> &ElapsedClock {
        &self.clock
    }

    pub fn subscribe_clock(&self) -> watch::Receiver<u64> {
        self.clock.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status()
    }

    pub fn current_state(&self) -> SessionState {
        match &*self.lock() {
            Phase::Idle(draft) => SessionState::Idle {
                draft: draft.clone(),
            },
            Phase::Starting(draft) => SessionState::Starting {
                draft: draft.clone(),
            },
            Phase::Active(record) => SessionState::Active {
                session: self.snapshot(record),
            },
            Phase::Stopping(record) => SessionState::Stopping {
                session: self.snapshot(record),
            },
        }
    }

    /// Edit the draft. Ignored unless idle; returns whether it applied.
    pub fn update_draft(&self, patch: DraftPatch) -> bool {
        let mut phase = self.lock();
        match &mut *phase {
            Phase::Idle(draft) => {
                draft.apply(patch);
                true
            }
            other => {
                tracing::debug!(status = %other.status(), "ignoring draft edit");
                false
            }
        }
    }

    pub async fn request_start(&self) -> Result<ActiveSession, ControllerError> {
        let draft = {
            let mut phase = self.lock();
            let draft = match &*phase {
                Phase::Idle(draft) => draft.clone(),
                other => {
                    return Err(ControllerError::InvalidState {
                        operation: "start",
                        status: other.status(),
                    })
                }
            };
            let missing = draft.missing_fields();
            if !missing.is_empty() {
                return Err(ControllerError::Validation { missing });
            }
            *phase = Phase::Starting(draft.clone());
            draft
        };

        let payload = StartPayload::from(&draft);
        match self.remote.start(&payload).await {
            Ok(ack) => {
                let record = SessionRecord {
                    session_id: session_id_from_ack(&ack),
                    started_fields: draft,
                    started_at: Utc::now(),
                };
                let mut phase = self.lock();
                self.clock.arm();
                let session = self.snapshot(&record);
                tracing::info!(
                    course_id = %record.started_fields.course_id,
                    topic = %record.started_fields.topic,
                    session_id = ?record.session_id,
                    "session started"
                );
                *phase = Phase::Active(record);
                Ok(session)
            }
            Err(err) => {
                tracing::warn!(error = %err, "start rejected, back to idle");
                *self.lock() = Phase::Idle(draft);
                Err(ControllerError::StartFailed(err))
            }
        }
    }

    pub async fn request_stop(&self, request: StopRequest) -> Result<StoppedSession, ControllerError> {
        let record = {
            let mut phase = self.lock();
            let record = match &*phase {
                Phase::Active(record) => record.clone(),
                other => {
                    return Err(ControllerError::InvalidState {
                        operation: "stop",
                        status: other.status(),
                    })
                }
            };
            *phase = Phase::Stopping(record.clone());
            record
        };

        let payload = StopPayload::for_session(&record.started_fields, request);
        match self.remote.stop(&payload).await {
            Ok(_) => {
                let mut phase = self.lock();
                let elapsed_seconds = self.clock.disarm();
                tracing::info!(
                    course_id = %record.started_fields.course_id,
                    elapsed_seconds,
                    "session stopped"
                );
                *phase = Phase::Idle(record.started_fields.after_stop());
                Ok(StoppedSession {
                    session_id: record.session_id,
                    started_fields: record.started_fields,
                    elapsed_seconds,
                })
            }
            Err(err) => {
                // The remote never committed the stop: keep the session and its clock running
                tracing::warn!(error = %err, "stop rejected, session still active");
                *self.lock() = Phase::Active(record);
                Err(ControllerError::StopFailed(err))
            }
        }
    }

    /// Drop the active session locally without telling the remote.
    pub fn reset_local(&self) -> Result<ActiveSession, ControllerError> {
        let mut phase = self.lock();
        let record = match &*phase {
            Phase::Active(record) => record.clone(),
            other => {
                return Err(ControllerError::InvalidState {
                    operation: "reset",
                    status: other.status(),
                })
            }
        };
        let clock_seconds = self.clock.disarm();
        tracing::warn!(
            course_id = %record.started_fields.course_id,
            clock_seconds,
            "discarding active session locally; remote may still consider it open"
        );
        *phase = Phase::Idle(record.started_fields.clone());
        Ok(ActiveSession {
            session_id: record.session_id,
            started_fields: record.started_fields,
            started_at: record.started_at,
            clock_seconds,
        })
    }

    fn snapshot(&self, record: &SessionRecord) -> ActiveSession {
        ActiveSession {
            session_id: record.session_id.clone(),
            started_fields: record.started_fields.clone(),
            started_at: record.started_at,
            clock_seconds: self.clock.read(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::scripted::{Call, ScriptedRemote};

    fn controller(draft: SessionDraft) -> SessionController<ScriptedRemote> {
        SessionController::new(ScriptedRemote::new(), ElapsedClock::default(), draft)
    }

    fn ready_draft() -> SessionDraft {
        SessionDraft {
            course_id: "c1".to_string(),
            topic: "t1".to_string(),
            ..SessionDraft::default()
        }
    }

    #[tokio::test]
    async fn test_start_requires_course_and_topic() {
        let ctrl = controller(SessionDraft::default());

        let err = ctrl.request_start().await.unwrap_err();
        match err {
            ControllerError::Validation { missing } => {
                assert_eq!(missing, vec!["course_id", "topic"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(ctrl.remote().calls().is_empty());
        assert_eq!(ctrl.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn test_draft_edits_only_while_idle() {
        let ctrl = controller(ready_draft());
        assert!(ctrl.update_draft(DraftPatch {
            module: Some("M2".to_string()),
            ..Default::default()
        }));

        ctrl.request_start().await.unwrap();
        assert!(!ctrl.update_draft(DraftPatch {
            topic: Some("other".to_string()),
            ..Default::default()
        }));

        let state = ctrl.current_state();
        let session = state.session().unwrap();
        assert_eq!(session.started_fields.module, "M2");
        assert_eq!(session.started_fields.topic, "t1");
    }

    #[tokio::test]
    async fn test_start_sends_full_draft() {
        let ctrl = controller(ready_draft());
        ctrl.request_start().await.unwrap();

        assert_eq!(
            ctrl.remote().calls(),
            vec![Call::Start(StartPayload::from(&ready_draft()))]
        );
    }

    #[tokio::test]
    async fn test_failed_start_returns_to_idle_with_draft() {
        let ctrl = controller(ready_draft());
        ctrl.remote()
            .push_start(Err(ScriptedRemote::rejection("/sessions/start")));

        let err = ctrl.request_start().await.unwrap_err();
        assert!(matches!(err, ControllerError::StartFailed(_)));
        assert_eq!(
            ctrl.current_state(),
            SessionState::Idle {
                draft: ready_draft()
            }
        );
        assert!(!ctrl.clock.is_armed());
    }

    #[tokio::test]
    async fn test_stop_from_idle_is_invalid() {
        let ctrl = controller(ready_draft());
        let err = ctrl.request_stop(StopRequest::default()).await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::InvalidState {
                operation: "stop",
                status: SessionStatus::Idle
            }
        ));
        assert!(ctrl.remote().calls().is_empty());
    }

    #[tokio::test]
    async fn test_stop_uses_session_user() {
        let ctrl = controller(SessionDraft {
            user_id: "u9".to_string(),
            ..ready_draft()
        });
        ctrl.request_start().await.unwrap();
        ctrl.request_stop(StopRequest {
            quiz_score: Some(8.5),
            quiz_passed: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();

        let calls = ctrl.remote().calls();
        assert_eq!(
            calls[1],
            Call::Stop(StopPayload {
                user_id: "u9".to_string(),
                notes: None,
                quiz_score: Some(8.5),
                quiz_passed: Some(true),
            })
        );
    }

    #[tokio::test]
    async fn test_session_id_taken_from_ack() {
        let ctrl = controller(ready_draft());
        ctrl.remote()
            .push_start(Ok(serde_json::json!({ "session_id": "s-1" })));

        let session = ctrl.request_start().await.unwrap();
        assert_eq!(session.session_id.as_deref(), Some("s-1"));

        let stopped = ctrl.request_stop(StopRequest::default()).await.unwrap();
        assert_eq!(stopped.session_id.as_deref(), Some("s-1"));
    }

    #[tokio::test]
    async fn test_reset_local_restores_draft() {
        let ctrl = controller(ready_draft());
        ctrl.request_start().await.unwrap();

        let discarded = ctrl.reset_local().unwrap();
        assert_eq!(discarded.started_fields, ready_draft());
        assert_eq!(
            ctrl.current_state(),
            SessionState::Idle {
                draft: ready_draft()
            }
        );
        assert!(!ctrl.clock.is_armed());
        // No remote stop was issued
        assert_eq!(ctrl.remote().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_local_requires_active() {
        let ctrl = controller(ready_draft());
        assert!(matches!(
            ctrl.reset_local(),
            Err(ControllerError::InvalidState {
                operation: "reset",
                status: SessionStatus::Idle
            })
        ));
    }
}
