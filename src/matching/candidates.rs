use axum::{
    debug_handler,
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{auth::Caller, AppResult, AppState};

use super::{Candidate, Lifecycle};

#[derive(Deserialize)]
pub(crate) struct CandidatesQuery {
    limit: Option<usize>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn candidates(
    State(lifecycle): State<Lifecycle>,
    Caller(caller): Caller,
    Query(CandidatesQuery { limit }): Query<CandidatesQuery>,
) -> AppResult<Json<Vec<Candidate>>> {
    Ok(Json(lifecycle.candidates(&caller, limit).await?))
}
