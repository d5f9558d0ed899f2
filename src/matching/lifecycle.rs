//! Role and approval checks in front of the match store, plus closing the
//! chat channel when a match ends.

use sqlx::SqlitePool;

use crate::auth::{self, ApprovalStatus, Identity, Role};
use crate::channels::ChannelRegistry;
use crate::error::CoreError;
use crate::profiles::{self, Profile, StudentProfile};

use super::policy::{rank_candidates, Candidate};
use super::{
    Decision, DecisionOutcome, Match, MatchId, MatchRequest, MatchStatus, MatchStore, RequestId,
    UserId,
};

const DEFAULT_CANDIDATES: usize = 20;
const MAX_CANDIDATES: usize = 100;

#[derive(Clone)]
pub struct Lifecycle {
    db_pool: SqlitePool,
    store: MatchStore,
    registry: ChannelRegistry,
}

impl Lifecycle {
    pub fn new(db_pool: SqlitePool, store: MatchStore, registry: ChannelRegistry) -> Self {
        Self { db_pool, store, registry }
    }

    pub async fn create_request(
        &self,
        caller: &Identity,
        alumni_id: UserId,
        cover_letter: &str,
    ) -> Result<MatchRequest, CoreError> {
        caller.require_role(&[Role::Student])?;
        caller.require_approved()?;

        let mentor = auth::find_user(&self.db_pool, alumni_id)
            .await?
            .filter(|user| user.role == Role::Alumni && user.approval_status == ApprovalStatus::Approved)
            .ok_or_else(|| CoreError::validation(format!("user {alumni_id} is not an approved mentor")))?;

        self.store.create_request(caller.user_id, mentor.id, cover_letter).await
    }

    pub async fn decide(
        &self,
        caller: &Identity,
        request_id: RequestId,
        decision: Decision,
    ) -> Result<DecisionOutcome, CoreError> {
        caller.require_role(&[Role::Alumni, Role::Admin])?;
        caller.require_approved()?;
        self.store.decide_request(request_id, decision, caller).await
    }

    pub async fn cancel_request(
        &self,
        caller: &Identity,
        request_id: RequestId,
    ) -> Result<MatchRequest, CoreError> {
        caller.require_role(&[Role::Student, Role::Admin])?;
        caller.require_approved()?;
        self.store.cancel_request(request_id, caller).await
    }

    /// The mentorship ran its course.
    pub async fn end_match(&self, caller: &Identity, match_id: MatchId) -> Result<Match, CoreError> {
        caller.require_approved()?;
        self.finish(caller, match_id, MatchStatus::Completed).await
    }

    pub async fn cancel_match(&self, caller: &Identity, match_id: MatchId) -> Result<Match, CoreError> {
        caller.require_approved()?;
        self.finish(caller, match_id, MatchStatus::Cancelled).await
    }

    pub async fn admin_cancel_match(
        &self,
        caller: &Identity,
        match_id: MatchId,
    ) -> Result<Match, CoreError> {
        caller.require_role(&[Role::Admin])?;
        self.finish(caller, match_id, MatchStatus::Cancelled).await
    }

    pub async fn admin_cancel_request(
        &self,
        caller: &Identity,
        request_id: RequestId,
    ) -> Result<MatchRequest, CoreError> {
        caller.require_role(&[Role::Admin])?;
        self.store.cancel_request(request_id, caller).await
    }

    pub async fn requests(&self, caller: &Identity) -> Result<Vec<MatchRequest>, CoreError> {
        caller.require_approved()?;
        self.store.requests_involving(caller.user_id).await
    }

    pub async fn active_matches(&self, caller: &Identity) -> Result<Vec<Match>, CoreError> {
        caller.require_approved()?;
        self.store.active_matches_involving(caller.user_id).await
    }

    /// Approved alumni ranked for the calling student. Scores only order the
    /// list; every approved alumni can be requested.
    pub async fn candidates(
        &self,
        caller: &Identity,
        limit: Option<usize>,
    ) -> Result<Vec<Candidate>, CoreError> {
        caller.require_role(&[Role::Student])?;
        caller.require_approved()?;

        let student = match profiles::load(&self.db_pool, caller.user_id).await? {
            Some(Profile::Student(profile)) => profile,
            _ => StudentProfile::default(),
        };
        let directory = profiles::alumni_directory(&self.db_pool).await?;

        let mut ranked = rank_candidates(&student, directory);
        ranked.truncate(limit.unwrap_or(DEFAULT_CANDIDATES).min(MAX_CANDIDATES));
        Ok(ranked)
    }

    /// Commit the terminal status first, then close the channel so no send
    /// can slip in after the match is gone.
    async fn finish(
        &self,
        caller: &Identity,
        match_id: MatchId,
        status: MatchStatus,
    ) -> Result<Match, CoreError> {
        let ended = self.store.finish_match(match_id, caller, status).await?;
        self.registry.evict(match_id, status).await;
        Ok(ended)
    }
}
