//! Error taxonomy shared by the match store, lifecycle service, channel
//! registry and message relay.
//!
//! REST handlers turn these into HTTP statuses (see [`crate::appresult`]),
//! the socket layer turns them into `error` events carrying [`CoreError::code`].

use axum::extract::rejection::JsonRejection;
use thiserror::Error;

use crate::matching::MatchId;

/// Coarse classes a caller can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input; correct it and retry.
    Validation,
    /// No usable credential was presented.
    Unauthenticated,
    /// The caller lacks rights for the target resource.
    Authorization,
    /// An invariant would be violated; refresh state and re-evaluate.
    Conflict,
    /// Stale or unknown id.
    NotFound,
    /// The connection to the client failed; reconnect and resume.
    Transport,
    Internal,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("missing or invalid credential")]
    Unauthenticated,

    #[error("{0}")]
    NotAuthorized(String),

    #[error("match {0} is not active")]
    MatchNotActive(MatchId),

    #[error("not a member of match {0}")]
    NotAMember(MatchId),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("malformed profile: {0}")]
    Profile(#[from] serde_json::Error),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::NotAuthorized(_) | Self::MatchNotActive(_) | Self::NotAMember(_) => {
                ErrorKind::Authorization
            }
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Database(_) | Self::Migration(_) | Self::Profile(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code, sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::NotAuthorized(_) => "not_authorized",
            Self::MatchNotActive(_) => "match_not_active",
            Self::NotAMember(_) => "not_a_member",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Transport(_) => "transport",
            Self::Database(_) | Self::Migration(_) | Self::Profile(_) => "internal",
        }
    }

    /// Message safe to show to a client. Internal failures are not echoed.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal server error".to_owned(),
            _ => self.to_string(),
        }
    }

    pub(crate) fn not_authorized(msg: impl Into<String>) -> Self {
        Self::NotAuthorized(msg.into())
    }

    pub(crate) fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Turn a unique-index violation into a [`CoreError::Conflict`]; anything
    /// else stays a database error.
    pub(crate) fn unique_as_conflict(err: sqlx::Error, msg: impl Into<String>) -> Self {
        let unique = err
            .as_database_error()
            .is_some_and(|db_err| db_err.is_unique_violation());
        if unique {
            Self::Conflict(msg.into())
        } else {
            Self::Database(err)
        }
    }
}

impl From<JsonRejection> for CoreError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}
