use axum::{debug_handler, extract::{rejection::JsonRejection, State}, Json};
use sqlx::SqlitePool;
use tracing::info;

use crate::{auth::Caller, error::CoreError, AppResult, AppState};

use super::Profile;

#[debug_handler(state = AppState)]
pub(crate) async fn own_profile(
    State(db_pool): State<SqlitePool>,
    Caller(caller): Caller,
) -> AppResult<Json<Profile>> {
    let Some(profile) = super::load(&db_pool, caller.user_id).await? else {
        return Err(CoreError::not_found("no profile yet").into());
    };
    Ok(Json(profile))
}

#[debug_handler(state = AppState)]
pub(crate) async fn put_profile(
    State(db_pool): State<SqlitePool>,
    Caller(caller): Caller,
    payload: Result<Json<Profile>, JsonRejection>,
) -> AppResult<Json<Profile>> {
    let Json(profile) = payload?;

    if profile.role() != caller.role {
        return Err(CoreError::validation(format!(
            "a {:?} account cannot store a {:?} profile",
            caller.role,
            profile.role()
        ))
        .into());
    }
    profile.validate()?;

    super::save(&db_pool, caller.user_id, &profile).await?;
    info!(user_id = caller.user_id, "profile updated");
    Ok(Json(profile))
}
