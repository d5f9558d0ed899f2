use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{auth::Caller, AppResult, AppState};

use super::{Lifecycle, MatchRequest, RequestId, UserId};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewRequest {
    alumni_id: UserId,
    cover_letter: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_request(
    State(lifecycle): State<Lifecycle>,
    Caller(caller): Caller,
    payload: Result<Json<NewRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<MatchRequest>)> {
    let Json(NewRequest { alumni_id, cover_letter }) = payload?;
    let request = lifecycle.create_request(&caller, alumni_id, &cover_letter).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_requests(
    State(lifecycle): State<Lifecycle>,
    Caller(caller): Caller,
) -> AppResult<Json<Vec<MatchRequest>>> {
    Ok(Json(lifecycle.requests(&caller).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn cancel_request(
    State(lifecycle): State<Lifecycle>,
    Caller(caller): Caller,
    Path(request_id): Path<RequestId>,
) -> AppResult<Json<MatchRequest>> {
    Ok(Json(lifecycle.cancel_request(&caller, request_id).await?))
}
