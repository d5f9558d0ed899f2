use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type UserId = i64;
pub type RequestId = i64;
pub type MatchId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MatchStatus {
    Active,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Active => "active",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

/// A student's ask to be mentored by one alumni.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub id: RequestId,
    pub student_id: UserId,
    pub alumni_id: UserId,
    pub cover_letter: String,
    pub status: RequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub decided_at: Option<OffsetDateTime>,
}

/// The committed pairing spawned by an approved request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub student_id: UserId,
    pub alumni_id: UserId,
    pub status: MatchStatus,
    pub created_from_request_id: RequestId,
    #[serde(with = "time::serde::rfc3339")]
    pub matched_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
}

impl Match {
    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.student_id == user_id || self.alumni_id == user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// Result of deciding a request. `activated` is set only on approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub request: MatchRequest,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub activated: Option<Match>,
}
