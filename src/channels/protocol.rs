//! JSON frames exchanged over `/ws`, tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::matching::{MatchId, MatchStatus};

use super::msg::Message;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinMatch {
        match_id: MatchId,
        #[serde(default)]
        after_id: Option<i64>,
    },
    SendMessage {
        match_id: MatchId,
        content: String,
        #[serde(default)]
        client_ref: Option<String>,
    },
    LeaveMatch {
        match_id: MatchId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    History {
        match_id: MatchId,
        messages: Vec<Message>,
    },
    NewMessage {
        message: Message,
    },
    /// Acknowledgement to the sender only.
    MessageSent {
        message: Message,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
    },
    MatchEnded {
        match_id: MatchId,
        status: MatchStatus,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        match_id: Option<MatchId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
    },
}

impl ServerEvent {
    pub fn error(err: &CoreError, match_id: Option<MatchId>, client_ref: Option<String>) -> Self {
        Self::Error {
            code: err.code().to_owned(),
            message: err.public_message(),
            match_id,
            client_ref,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn client_frames_parse() {
        let join: ClientEvent =
            serde_json::from_value(json!({ "type": "join-match", "matchId": 3 })).unwrap();
        assert_eq!(join, ClientEvent::JoinMatch { match_id: 3, after_id: None });

        let send: ClientEvent = serde_json::from_value(json!({
            "type": "send-message",
            "matchId": 3,
            "content": "hello",
            "clientRef": "draft-1",
        }))
        .unwrap();
        assert_eq!(
            send,
            ClientEvent::SendMessage {
                match_id: 3,
                content: "hello".into(),
                client_ref: Some("draft-1".into()),
            }
        );

        assert!(serde_json::from_value::<ClientEvent>(json!({ "type": "shout" })).is_err());
    }

    #[test]
    fn error_frame_carries_code_and_ref() {
        let event = ServerEvent::error(&CoreError::MatchNotActive(9), Some(9), Some("r1".into()));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "error",
                "code": "match_not_active",
                "message": "match 9 is not active",
                "matchId": 9,
                "clientRef": "r1",
            })
        );

        let ended = ServerEvent::MatchEnded { match_id: 2, status: MatchStatus::Cancelled };
        assert_eq!(
            serde_json::to_value(&ended).unwrap(),
            json!({ "type": "match-ended", "matchId": 2, "status": "cancelled" })
        );
    }
}
