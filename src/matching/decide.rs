use axum::{
    debug_handler,
    extract::{Path, State},
    Json,
};

use crate::{auth::Caller, AppResult, AppState};

use super::{Decision, DecisionOutcome, Lifecycle, RequestId};

/// `{request, match}` on success.
#[debug_handler(state = AppState)]
pub(crate) async fn approve(
    State(lifecycle): State<Lifecycle>,
    Caller(caller): Caller,
    Path(request_id): Path<RequestId>,
) -> AppResult<Json<DecisionOutcome>> {
    Ok(Json(lifecycle.decide(&caller, request_id, Decision::Approve).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn reject(
    State(lifecycle): State<Lifecycle>,
    Caller(caller): Caller,
    Path(request_id): Path<RequestId>,
) -> AppResult<Json<DecisionOutcome>> {
    Ok(Json(lifecycle.decide(&caller, request_id, Decision::Reject).await?))
}
