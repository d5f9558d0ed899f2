use axum::{
    debug_handler,
    extract::{
        ws::{Message as Frame, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

use crate::{
    auth::{bearer_token, Gate, Identity},
    error::CoreError,
    AppResult, AppState,
};

use super::{
    protocol::{ClientEvent, ServerEvent},
    registry::{ChannelRegistry, SessionHandle},
    relay::Relay,
};

#[derive(Deserialize)]
pub(crate) struct WsQuery {
    token: Option<String>,
}

/// Browsers cannot set headers on a socket upgrade, so the credential may
/// also come as `?token=`.
#[debug_handler(state = AppState)]
pub(crate) async fn match_ws(
    State(gate): State<Gate>,
    State(registry): State<ChannelRegistry>,
    State(relay): State<Relay>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let token = bearer_token(&headers)
        .map(str::to_owned)
        .or(query.token)
        .ok_or(CoreError::Unauthenticated)?;
    let identity = gate.verify(&token).await?;
    identity.require_approved()?;

    Ok(ws.on_upgrade(move |socket| run_session(socket, identity, registry, relay)))
}

async fn run_session(socket: WebSocket, identity: Identity, registry: ChannelRegistry, relay: Relay) {
    let (session, outbox) = registry.open_session(identity);
    let (sender, mut receiver) = socket.split();
    info!(session_id = %session.id(), user_id = identity.user_id, "session connected");

    let mut writer = tokio::spawn(forward(outbox, sender));

    loop {
        // a session that fell behind is closed; the client resumes with afterId
        let frame = tokio::select! {
            frame = receiver.next() => frame,
            () = session.lagged() => {
                warn!(session_id = %session.id(), "outbox full, closing session");
                break;
            }
        };
        let Some(frame) = frame else {
            break;
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                debug!(session_id = %session.id(), %err, "socket read failed");
                break;
            }
        };

        match frame {
            Frame::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => dispatch(event, &session, &registry, &relay).await,
                Err(err) => reply(
                    &session,
                    ServerEvent::error(&CoreError::validation(format!("malformed event: {err}")), None, None),
                ),
            },
            Frame::Binary(_) => reply(
                &session,
                ServerEvent::error(&CoreError::validation("expected a text frame"), None, None),
            ),
            Frame::Close(_) => break,
            Frame::Ping(_) | Frame::Pong(_) => {}
        }

        if writer.is_finished() {
            break;
        }
    }

    registry.leave(session.id()).await;
    writer.abort();
    info!(session_id = %session.id(), user_id = identity.user_id, "session closed");
}

/// Writer half: drains the outbox into the socket until either side closes.
async fn forward(
    mut outbox: Receiver<ServerEvent>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Frame>,
) {
    while let Some(event) = outbox.recv().await {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "unserializable event dropped");
                continue;
            }
        };
        if let Err(err) = sender.send(Frame::Text(text.into())).await {
            debug!(%err, "socket write failed");
            break;
        }
    }
}

async fn dispatch(event: ClientEvent, session: &SessionHandle, registry: &ChannelRegistry, relay: &Relay) {
    match event {
        ClientEvent::JoinMatch { match_id, after_id } => {
            if let Err(err) = registry.join(match_id, session, after_id).await {
                reply(session, ServerEvent::error(&err, Some(match_id), None));
            }
        }
        ClientEvent::SendMessage { match_id, content, client_ref } => {
            if let Err(err) = relay.send(match_id, session, &content, client_ref.clone()).await {
                reply(session, ServerEvent::error(&err, Some(match_id), client_ref));
            }
        }
        ClientEvent::LeaveMatch { match_id } => {
            registry.part(session.id(), match_id).await;
        }
    }
}

/// A full outbox already flags the session for closing, so a reply that
/// cannot be queued is only logged.
fn reply(session: &SessionHandle, event: ServerEvent) {
    if let Err(err) = session.deliver(event) {
        debug!(session_id = %session.id(), %err, "reply not queued");
    }
}
