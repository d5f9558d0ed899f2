//! Channel registry: which live sessions are joined to which match channel.
//!
//! Every channel owns one async lock. Join, send and evict all run under it,
//! so a member never sees a message it was not present for and never misses
//! one that was relayed while it was joined. A channel left empty is marked
//! `closed` and dropped from the map; anyone still holding the old `Arc`
//! retries against a fresh one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Identity;
use crate::config::ChatConfig;
use crate::error::CoreError;
use crate::matching::{MatchId, MatchStatus, MatchStore};

use super::msg::{Message, MessageLog};
use super::protocol::ServerEvent;

pub type SessionId = Uuid;

/// One live socket connection and its bounded outbox.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    identity: Identity,
    outbox: mpsc::Sender<ServerEvent>,
    lagged: Arc<Notify>,
}

impl SessionHandle {
    pub fn new(identity: Identity, outbox_len: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (outbox, rx) = mpsc::channel(outbox_len);
        let session = Self { id: Uuid::now_v7(), identity, outbox, lagged: Arc::default() };
        (session, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Queue an event for the writer task without waiting.
    ///
    /// A full outbox means the socket stopped draining. The session is
    /// flagged through [`SessionHandle::lagged`] so its connection closes and
    /// the client resumes with `afterId`.
    pub(crate) fn deliver(&self, event: ServerEvent) -> Result<(), CoreError> {
        self.outbox.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => {
                self.lagged.notify_one();
                CoreError::Transport(format!("outbox of session {} is full", self.id))
            }
            TrySendError::Closed(_) => {
                CoreError::Transport(format!("session {} is closed", self.id))
            }
        })
    }

    /// Resolves once a delivery found the outbox full.
    pub async fn lagged(&self) {
        self.lagged.notified().await;
    }
}

#[derive(Default)]
pub(crate) struct Channel {
    pub(crate) state: Mutex<ChannelState>,
}

#[derive(Default)]
pub(crate) struct ChannelState {
    pub(crate) members: HashMap<SessionId, SessionHandle>,
    pub(crate) closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// Newly joined; this history was pushed to the session.
    Joined(Vec<Message>),
    AlreadyJoined,
}

#[derive(Clone)]
pub struct ChannelRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    channels: DashMap<MatchId, Arc<Channel>>,
    /// Reverse index so a disconnect can part every channel at once.
    sessions: DashMap<SessionId, HashSet<MatchId>>,
    store: MatchStore,
    log: MessageLog,
    chat: ChatConfig,
}

impl ChannelRegistry {
    pub fn new(store: MatchStore, log: MessageLog, chat: ChatConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                channels: DashMap::new(),
                sessions: DashMap::new(),
                store,
                log,
                chat,
            }),
        }
    }

    /// A session whose outbox holds `chat.outbox_len` events.
    pub fn open_session(&self, identity: Identity) -> (SessionHandle, mpsc::Receiver<ServerEvent>) {
        SessionHandle::new(identity, self.inner.chat.outbox_len)
    }

    /// Register `session` on the match channel and push its history.
    ///
    /// Without `after_id` the newest page is sent, oldest first. With it,
    /// the page following that id is sent for resuming after a reconnect.
    pub async fn join(
        &self,
        match_id: MatchId,
        session: &SessionHandle,
        after_id: Option<i64>,
    ) -> Result<JoinOutcome, CoreError> {
        loop {
            let channel = self.channel_for(match_id);
            let mut state = channel.state.lock().await;
            if state.closed {
                continue;
            }
            if state.members.contains_key(&session.id) {
                return Ok(JoinOutcome::AlreadyJoined);
            }

            let history = match self.admit(match_id, session, after_id).await {
                Ok(history) => history,
                Err(err) => {
                    if state.members.is_empty() {
                        self.retire(match_id, &channel, &mut state);
                    }
                    return Err(err);
                }
            };

            let pushed = session.deliver(ServerEvent::History { match_id, messages: history.clone() });
            if let Err(err) = pushed {
                if state.members.is_empty() {
                    self.retire(match_id, &channel, &mut state);
                }
                return Err(err);
            }

            state.members.insert(session.id, session.clone());
            self.inner
                .sessions
                .entry(session.id)
                .or_default()
                .insert(match_id);

            debug!(
                match_id,
                session_id = %session.id,
                user_id = session.identity.user_id,
                members = state.members.len(),
                "joined channel"
            );
            return Ok(JoinOutcome::Joined(history));
        }
    }

    /// Drop one membership. Returns whether the session was a member.
    pub async fn part(&self, session_id: SessionId, match_id: MatchId) -> bool {
        self.forget(session_id, match_id);

        let Some(channel) = self.lookup(match_id) else {
            return false;
        };
        let mut state = channel.state.lock().await;
        let removed = state.members.remove(&session_id).is_some();
        if state.members.is_empty() && !state.closed {
            self.retire(match_id, &channel, &mut state);
        }
        removed
    }

    /// Drop every membership of a disconnected session.
    pub async fn leave(&self, session_id: SessionId) {
        let Some((_, joined)) = self.inner.sessions.remove(&session_id) else {
            return;
        };
        for match_id in joined {
            self.part(session_id, match_id).await;
        }
    }

    /// Close the channel of a match that just ended and tell every member.
    /// Returns how many sessions were removed.
    pub async fn evict(&self, match_id: MatchId, status: MatchStatus) -> usize {
        let Some((_, channel)) = self.inner.channels.remove(&match_id) else {
            return 0;
        };

        let mut state = channel.state.lock().await;
        state.closed = true;
        let members: Vec<SessionHandle> = state.members.drain().map(|(_, s)| s).collect();
        for member in &members {
            if let Err(err) = member.deliver(ServerEvent::MatchEnded { match_id, status }) {
                debug!(match_id, session_id = %member.id, %err, "match-ended not queued");
            }
            self.forget(member.id, match_id);
        }

        info!(match_id, status = status.as_str(), evicted = members.len(), "channel closed");
        members.len()
    }

    /// Stored history for REST callers. Participants may read it whatever
    /// the match status; admins may always read it.
    pub async fn history(
        &self,
        caller: &Identity,
        match_id: MatchId,
        after_id: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, CoreError> {
        let found = self
            .inner
            .store
            .find_match(match_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no match {match_id}")))?;
        if !caller.is_admin() && !found.is_participant(caller.user_id) {
            return Err(CoreError::not_authorized("you are not a participant of this match"));
        }

        let chat = &self.inner.chat;
        let limit = limit.unwrap_or(chat.history_page).clamp(1, chat.max_history_page);
        match after_id {
            Some(after_id) => self.inner.log.after(match_id, after_id, limit).await,
            None => self.inner.log.recent(match_id, limit).await,
        }
    }

    pub(crate) fn lookup(&self, match_id: MatchId) -> Option<Arc<Channel>> {
        self.inner
            .channels
            .get(&match_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Remove members that could not take a delivery. Called under the
    /// channel lock by whoever saw the failure.
    pub(crate) fn drop_lagging(
        &self,
        match_id: MatchId,
        channel: &Arc<Channel>,
        state: &mut ChannelState,
        lagging: &[SessionId],
    ) {
        for session_id in lagging {
            if state.members.remove(session_id).is_some() {
                self.forget(*session_id, match_id);
                warn!(match_id, session_id = %session_id, "slow session dropped from channel");
            }
        }
        if state.members.is_empty() && !state.closed {
            self.retire(match_id, channel, state);
        }
    }

    fn forget(&self, session_id: SessionId, match_id: MatchId) {
        if let Some(mut joined) = self.inner.sessions.get_mut(&session_id) {
            joined.remove(&match_id);
        }
        self.inner.sessions.remove_if(&session_id, |_, joined| joined.is_empty());
    }

    fn channel_for(&self, match_id: MatchId) -> Arc<Channel> {
        Arc::clone(&self.inner.channels.entry(match_id).or_default())
    }

    /// Checks run under the channel lock before a session is registered.
    async fn admit(
        &self,
        match_id: MatchId,
        session: &SessionHandle,
        after_id: Option<i64>,
    ) -> Result<Vec<Message>, CoreError> {
        let found = self
            .inner
            .store
            .find_match(match_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no match {match_id}")))?;

        let identity = &session.identity;
        let observer = identity.is_admin() && self.inner.chat.admin_observers;
        if !observer && !found.is_participant(identity.user_id) {
            return Err(CoreError::not_authorized("you are not a participant of this match"));
        }
        if found.status != MatchStatus::Active {
            return Err(CoreError::MatchNotActive(match_id));
        }

        let page = self.inner.chat.history_page;
        match after_id {
            Some(after_id) => self.inner.log.after(match_id, after_id, page).await,
            None => self.inner.log.recent(match_id, page).await,
        }
    }

    fn retire(&self, match_id: MatchId, channel: &Arc<Channel>, state: &mut ChannelState) {
        state.closed = true;
        self.inner
            .channels
            .remove_if(&match_id, |_, current| Arc::ptr_eq(current, channel));
    }
}
