use axum::{
    debug_handler,
    extract::{Path, State},
    Json,
};
use tracing::warn;

use crate::{
    auth::Caller,
    matching::{Lifecycle, Match, MatchId, MatchRequest, RequestId},
    AppResult, AppState,
};

#[debug_handler(state = AppState)]
pub(crate) async fn cancel_match(
    State(lifecycle): State<Lifecycle>,
    Caller(caller): Caller,
    Path(match_id): Path<MatchId>,
) -> AppResult<Json<Match>> {
    let cancelled = lifecycle.admin_cancel_match(&caller, match_id).await?;
    warn!(match_id, admin = caller.user_id, "match cancelled by admin");
    Ok(Json(cancelled))
}

#[debug_handler(state = AppState)]
pub(crate) async fn cancel_request(
    State(lifecycle): State<Lifecycle>,
    Caller(caller): Caller,
    Path(request_id): Path<RequestId>,
) -> AppResult<Json<MatchRequest>> {
    let cancelled = lifecycle.admin_cancel_request(&caller, request_id).await?;
    warn!(request_id, admin = caller.user_id, "request cancelled by admin");
    Ok(Json(cancelled))
}
