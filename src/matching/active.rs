use axum::{
    debug_handler,
    extract::{Path, State},
    Json,
};

use crate::{auth::Caller, AppResult, AppState};

use super::{Lifecycle, Match, MatchId};

#[debug_handler(state = AppState)]
pub(crate) async fn active_matches(
    State(lifecycle): State<Lifecycle>,
    Caller(caller): Caller,
) -> AppResult<Json<Vec<Match>>> {
    Ok(Json(lifecycle.active_matches(&caller).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn end_match(
    State(lifecycle): State<Lifecycle>,
    Caller(caller): Caller,
    Path(match_id): Path<MatchId>,
) -> AppResult<Json<Match>> {
    Ok(Json(lifecycle.end_match(&caller, match_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn cancel_match(
    State(lifecycle): State<Lifecycle>,
    Caller(caller): Caller,
    Path(match_id): Path<MatchId>,
) -> AppResult<Json<Match>> {
    Ok(Json(lifecycle.cancel_match(&caller, match_id).await?))
}
