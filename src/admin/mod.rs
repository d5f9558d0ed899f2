//! Admin overrides, mounted under `/admin`.

mod cancel;

use axum::{routing::post, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/matches/{id}/cancel", post(cancel::cancel_match))
        .route("/requests/{id}/cancel", post(cancel::cancel_request))
}
