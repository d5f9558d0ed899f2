use axum::{
    debug_handler,
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{auth::Caller, matching::MatchId, AppResult, AppState};

use super::{msg::Message, registry::ChannelRegistry};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HistoryQuery {
    after_id: Option<i64>,
    limit: Option<u32>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn match_messages(
    State(registry): State<ChannelRegistry>,
    Caller(caller): Caller,
    Path(match_id): Path<MatchId>,
    Query(HistoryQuery { after_id, limit }): Query<HistoryQuery>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(registry.history(&caller, match_id, after_id, limit).await?))
}
