//! Match store: `MatchRequest` and `Match` records and their transitions.
//!
//! Every check that protects the one-active-match-per-student rule runs
//! inside the student's [`KeyedLocks`] scope and the same transaction as the
//! insert it guards. The partial unique indexes in the schema back this up.

use sqlx::{Sqlite, SqlitePool, Transaction};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::auth::Identity;
use crate::config::MatchingConfig;
use crate::error::CoreError;

use super::locks::{KeyedLocks, LockKey};
use super::{
    Decision, DecisionOutcome, Match, MatchId, MatchRequest, MatchStatus, RequestId,
    RequestStatus, UserId,
};

const REQUEST_COLUMNS: &str = "id,student_id,alumni_id,cover_letter,status,created_at,decided_at";
const MATCH_COLUMNS: &str =
    "id,student_id,alumni_id,status,created_from_request_id,matched_at,ended_at";

#[derive(Clone)]
pub struct MatchStore {
    db_pool: SqlitePool,
    locks: KeyedLocks,
    rules: MatchingConfig,
}

impl MatchStore {
    pub fn new(db_pool: SqlitePool, rules: MatchingConfig) -> Self {
        Self { db_pool, locks: KeyedLocks::default(), rules }
    }

    pub fn rules(&self) -> &MatchingConfig {
        &self.rules
    }

    pub async fn create_request(
        &self,
        student_id: UserId,
        alumni_id: UserId,
        cover_letter: &str,
    ) -> Result<MatchRequest, CoreError> {
        let cover_letter = cover_letter.trim();
        let len = cover_letter.chars().count();
        if len < self.rules.cover_letter_min_len {
            return Err(CoreError::validation(format!(
                "cover letter must be at least {} characters",
                self.rules.cover_letter_min_len
            )));
        }
        if len > self.rules.cover_letter_max_len {
            return Err(CoreError::validation(format!(
                "cover letter must be at most {} characters",
                self.rules.cover_letter_max_len
            )));
        }
        if student_id == alumni_id {
            return Err(CoreError::validation("cannot request yourself as a mentor"));
        }

        let _student = self.locks.acquire(LockKey::Student(student_id)).await;
        let mut tx = self.begin_write().await?;

        if let Some(active) = active_match_in(&mut tx, student_id).await? {
            return Err(CoreError::conflict(format!(
                "student {student_id} already has active match {}",
                active.id
            )));
        }

        let pending: Option<(RequestId,)> = sqlx::query_as(
            "SELECT id FROM match_requests WHERE student_id=? AND alumni_id=? AND status='pending'",
        )
        .bind(student_id)
        .bind(alumni_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some((id,)) = pending {
            return Err(CoreError::conflict(format!(
                "request {id} to this mentor is already pending"
            )));
        }

        if self.rules.block_rerequest_after_reject {
            let rejected: Option<(RequestId,)> = sqlx::query_as(
                "SELECT id FROM match_requests WHERE student_id=? AND alumni_id=? AND status='rejected' LIMIT 1",
            )
            .bind(student_id)
            .bind(alumni_id)
            .fetch_optional(&mut *tx)
            .await?;
            if rejected.is_some() {
                return Err(CoreError::conflict("this mentor has already declined your request"));
            }
        }

        let request: MatchRequest = sqlx::query_as(&format!(
            "INSERT INTO match_requests (student_id,alumni_id,cover_letter,status,created_at)
             VALUES (?,?,?,'pending',?) RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(student_id)
        .bind(alumni_id)
        .bind(cover_letter)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CoreError::unique_as_conflict(e, "a request to this mentor is already pending"))?;

        tx.commit().await?;
        info!(request_id = request.id, student_id, alumni_id, "match request created");
        Ok(request)
    }

    /// Approve or reject a pending request. Approval inserts the match in
    /// the same transaction that marks the request approved.
    pub async fn decide_request(
        &self,
        request_id: RequestId,
        decision: Decision,
        decider: &Identity,
    ) -> Result<DecisionOutcome, CoreError> {
        let request = self
            .find_request(request_id)
            .await?
            .filter(|r| r.status == RequestStatus::Pending)
            .ok_or_else(|| CoreError::not_found(format!("no pending request {request_id}")))?;

        if !decider.is_admin() && decider.user_id != request.alumni_id {
            return Err(CoreError::not_authorized(
                "only the requested mentor or an admin can decide this request",
            ));
        }

        match decision {
            Decision::Reject => {
                let request = self
                    .close_request(request_id, RequestStatus::Rejected)
                    .await?;
                info!(request_id, decider = decider.user_id, "match request rejected");
                Ok(DecisionOutcome { request, activated: None })
            }
            Decision::Approve => self.approve(request).await,
        }
    }

    async fn approve(&self, request: MatchRequest) -> Result<DecisionOutcome, CoreError> {
        let _student = self.locks.acquire(LockKey::Student(request.student_id)).await;
        let _alumni = match self.rules.mentor_capacity {
            Some(_) => Some(self.locks.acquire(LockKey::Alumni(request.alumni_id)).await),
            None => None,
        };

        let mut tx = self.begin_write().await?;

        let status: Option<RequestStatus> =
            sqlx::query_scalar("SELECT status FROM match_requests WHERE id=?")
                .bind(request.id)
                .fetch_optional(&mut *tx)
                .await?;
        if status != Some(RequestStatus::Pending) {
            return Err(CoreError::not_found(format!("no pending request {}", request.id)));
        }

        if let Some(active) = active_match_in(&mut tx, request.student_id).await? {
            if self.rules.auto_reject_on_conflict {
                set_request_status(&mut tx, request.id, RequestStatus::Rejected).await?;
                tx.commit().await?;
                debug!(request_id = request.id, "losing approval auto-rejected");
            }
            return Err(CoreError::conflict(format!(
                "student {} already has active match {}",
                request.student_id, active.id
            )));
        }

        if let Some(capacity) = self.rules.mentor_capacity {
            let (active,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM matches WHERE alumni_id=? AND status='active'",
            )
            .bind(request.alumni_id)
            .fetch_one(&mut *tx)
            .await?;
            if active >= i64::from(capacity) {
                return Err(CoreError::conflict(format!(
                    "mentor has reached the limit of {capacity} active matches"
                )));
            }
        }

        let now = OffsetDateTime::now_utc();
        let approved = set_request_status(&mut tx, request.id, RequestStatus::Approved).await?;
        let activated: Match = sqlx::query_as(&format!(
            "INSERT INTO matches (student_id,alumni_id,status,created_from_request_id,matched_at)
             VALUES (?,?,'active',?,?) RETURNING {MATCH_COLUMNS}"
        ))
        .bind(request.student_id)
        .bind(request.alumni_id)
        .bind(request.id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CoreError::unique_as_conflict(e, "student already has an active match"))?;

        tx.commit().await?;
        info!(
            request_id = request.id,
            match_id = activated.id,
            student_id = request.student_id,
            alumni_id = request.alumni_id,
            "match activated"
        );

        Ok(DecisionOutcome { request: approved, activated: Some(activated) })
    }

    /// Withdraw a pending request. Its student or an admin.
    pub async fn cancel_request(
        &self,
        request_id: RequestId,
        actor: &Identity,
    ) -> Result<MatchRequest, CoreError> {
        let request = self
            .find_request(request_id)
            .await?
            .filter(|r| r.status == RequestStatus::Pending)
            .ok_or_else(|| CoreError::not_found(format!("no pending request {request_id}")))?;

        if !actor.is_admin() && actor.user_id != request.student_id {
            return Err(CoreError::not_authorized(
                "only the requesting student or an admin can cancel this request",
            ));
        }

        let request = self.close_request(request_id, RequestStatus::Cancelled).await?;
        info!(request_id, actor = actor.user_id, "match request cancelled");
        Ok(request)
    }

    /// Move an active match to `completed` or `cancelled`. Either participant
    /// or an admin.
    pub async fn finish_match(
        &self,
        match_id: MatchId,
        actor: &Identity,
        status: MatchStatus,
    ) -> Result<Match, CoreError> {
        debug_assert!(status != MatchStatus::Active);

        let found = self
            .find_match(match_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no match {match_id}")))?;
        if !actor.is_admin() && !found.is_participant(actor.user_id) {
            return Err(CoreError::not_authorized("you are not a participant of this match"));
        }

        let ended: Match = sqlx::query_as(&format!(
            "UPDATE matches SET status=?, ended_at=? WHERE id=? AND status='active' RETURNING {MATCH_COLUMNS}"
        ))
        .bind(status)
        .bind(OffsetDateTime::now_utc())
        .bind(match_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("match {match_id} is not active")))?;

        info!(match_id, actor = actor.user_id, status = status.as_str(), "match ended");
        Ok(ended)
    }

    pub async fn find_request(&self, id: RequestId) -> Result<Option<MatchRequest>, CoreError> {
        Ok(
            sqlx::query_as(&format!("SELECT {REQUEST_COLUMNS} FROM match_requests WHERE id=?"))
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    pub async fn find_match(&self, id: MatchId) -> Result<Option<Match>, CoreError> {
        Ok(
            sqlx::query_as(&format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id=?"))
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    pub async fn active_match_for(&self, student_id: UserId) -> Result<Option<Match>, CoreError> {
        Ok(sqlx::query_as(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE student_id=? AND status='active'"
        ))
        .bind(student_id)
        .fetch_optional(&self.db_pool)
        .await?)
    }

    /// Requests the user sent or received, newest first.
    pub async fn requests_involving(&self, user_id: UserId) -> Result<Vec<MatchRequest>, CoreError> {
        Ok(sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM match_requests WHERE student_id=? OR alumni_id=? ORDER BY id DESC"
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?)
    }

    /// Active matches a user takes part in.
    pub async fn active_matches_involving(&self, user_id: UserId) -> Result<Vec<Match>, CoreError> {
        Ok(sqlx::query_as(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE (student_id=? OR alumni_id=?) AND status='active' ORDER BY id"
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?)
    }

    /// Writers take the database write lock at `BEGIN`. A deferred
    /// transaction that reads first cannot upgrade while another connection
    /// writes, and fails with `database is locked` instead of waiting.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, CoreError> {
        Ok(self.db_pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    async fn close_request(
        &self,
        request_id: RequestId,
        status: RequestStatus,
    ) -> Result<MatchRequest, CoreError> {
        let mut tx = self.begin_write().await?;
        let request = set_request_status(&mut tx, request_id, status).await?;
        tx.commit().await?;
        Ok(request)
    }
}

async fn active_match_in(
    tx: &mut Transaction<'_, Sqlite>,
    student_id: UserId,
) -> Result<Option<Match>, CoreError> {
    Ok(sqlx::query_as(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches WHERE student_id=? AND status='active'"
    ))
    .bind(student_id)
    .fetch_optional(&mut **tx)
    .await?)
}

/// Pending -> `status`. A request that is no longer pending is not found.
async fn set_request_status(
    tx: &mut Transaction<'_, Sqlite>,
    request_id: RequestId,
    status: RequestStatus,
) -> Result<MatchRequest, CoreError> {
    sqlx::query_as(&format!(
        "UPDATE match_requests SET status=?, decided_at=? WHERE id=? AND status='pending' RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(status)
    .bind(OffsetDateTime::now_utc())
    .bind(request_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| CoreError::not_found(format!("no pending request {request_id}")))
}
