use tracing::debug;

use crate::error::CoreError;
use crate::matching::MatchId;

use super::msg::{Message, MessageLog};
use super::protocol::ServerEvent;
use super::registry::{ChannelRegistry, SessionHandle};

/// Persists a message and fans it out to the channel.
#[derive(Clone)]
pub struct Relay {
    registry: ChannelRegistry,
    log: MessageLog,
    max_len: usize,
}

impl Relay {
    pub fn new(registry: ChannelRegistry, log: MessageLog, max_len: usize) -> Self {
        Self { registry, log, max_len }
    }

    /// Append `content` to the match history and deliver it.
    ///
    /// Id assignment and delivery both happen under the channel lock, so
    /// every member, the sender's `message-sent` included, sees ids in the
    /// same order.
    pub async fn send(
        &self,
        match_id: MatchId,
        session: &SessionHandle,
        content: &str,
        client_ref: Option<String>,
    ) -> Result<Message, CoreError> {
        if content.trim().is_empty() {
            return Err(CoreError::validation("message cannot be empty"));
        }
        if content.chars().count() > self.max_len {
            return Err(CoreError::validation(format!(
                "message must be at most {} characters",
                self.max_len
            )));
        }

        let channel = self
            .registry
            .lookup(match_id)
            .ok_or(CoreError::NotAMember(match_id))?;
        let mut state = channel.state.lock().await;
        if state.closed || !state.members.contains_key(&session.id()) {
            return Err(CoreError::NotAMember(match_id));
        }

        let message = self
            .log
            .append(match_id, session.identity().user_id, content)
            .await?;

        let mut lagging = Vec::new();
        for (id, member) in &state.members {
            if *id != session.id()
                && member.deliver(ServerEvent::NewMessage { message: message.clone() }).is_err()
            {
                lagging.push(*id);
            }
        }
        if session
            .deliver(ServerEvent::MessageSent { message: message.clone(), client_ref })
            .is_err()
        {
            lagging.push(session.id());
        }

        debug!(
            match_id,
            message_id = message.id,
            sender_id = message.sender_id,
            recipients = state.members.len() - 1,
            dropped = lagging.len(),
            "message relayed"
        );
        if !lagging.is_empty() {
            self.registry.drop_lagging(match_id, &channel, &mut state, &lagging);
        }
        Ok(message)
    }
}
