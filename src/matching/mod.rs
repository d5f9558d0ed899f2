//! Match requests, matches and the rules that move them between states.

mod active;
mod candidates;
mod decide;
mod lifecycle;
mod locks;
mod model;
mod policy;
mod request;
mod store;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub use lifecycle::Lifecycle;
pub use model::{
    Decision, DecisionOutcome, Match, MatchId, MatchRequest, MatchStatus, RequestId,
    RequestStatus, UserId,
};
pub use policy::{rank_candidates, score_candidate, Candidate};
pub use store::MatchStore;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/match/request", post(request::create_request))
        .route("/match/requests", get(request::list_requests))
        .route("/match/request/{id}/cancel", post(request::cancel_request))
        .route("/match/{id}/approve", post(decide::approve))
        .route("/match/{id}/reject", post(decide::reject))
        .route("/match/active", get(active::active_matches))
        .route("/match/{id}/end", post(active::end_match))
        .route("/match/{id}/cancel", post(active::cancel_match))
        .route("/match/candidates", get(candidates::candidates))
}
