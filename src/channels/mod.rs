//! Real-time messaging for active matches: one channel per match, joined
//! over `/ws`, with persistent history.

mod history;
mod msg;
mod protocol;
mod registry;
mod relay;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use msg::{Message, MessageLog};
pub use protocol::{ClientEvent, ServerEvent};
pub use registry::{ChannelRegistry, JoinOutcome, SessionHandle, SessionId};
pub use relay::Relay;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::match_ws))
        .route("/match/{id}/messages", get(history::match_messages))
}
