//! Study-session tracker core.
//!
//! A [`SessionController`] drives one session at a time through
//! idle → starting → active → stopping against a remote session service,
//! while an [`ElapsedClock`] counts the active session's seconds.

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod remote;
pub mod shell;


pub use clock::{format_elapsed, ElapsedClock};
pub use config::TrackerConfig;
pub use controller::SessionController;
pub use error::{ConfigError, ControllerError, RemoteError};
pub use models::{
    ActiveSession, ActivityType, DraftPatch, SessionDraft, SessionState, SessionStatus,
    StopRequest, StoppedSession,
};
pub use remote::{HttpRemote, SessionRemote};
