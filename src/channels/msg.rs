use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::error::CoreError;
use crate::matching::{MatchId, MatchStatus, UserId};

const MESSAGE_COLUMNS: &str = "id,match_id,sender_id,content,created_at";

/// One chat utterance. `id` is the per-match sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub match_id: MatchId,
    pub sender_id: UserId,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Persistent, append-only message history.
#[derive(Clone)]
pub struct MessageLog {
    db_pool: SqlitePool,
}

impl MessageLog {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Store a message under the next sequence number of its match.
    ///
    /// The match status is read by the same statement that inserts, so a
    /// match cancelled a moment earlier can never gain a message.
    pub async fn append(
        &self,
        match_id: MatchId,
        sender_id: UserId,
        content: &str,
    ) -> Result<Message, CoreError> {
        let inserted: Option<Message> = sqlx::query_as(&format!(
            "INSERT INTO messages (match_id,id,sender_id,content,created_at)
             SELECT ?1, (SELECT COALESCE(MAX(id),0)+1 FROM messages WHERE match_id=?1), ?2, ?3, ?4
             WHERE EXISTS (SELECT 1 FROM matches WHERE id=?1 AND status='active')
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(match_id)
        .bind(sender_id)
        .bind(content)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db_pool)
        .await?;

        if let Some(message) = inserted {
            return Ok(message);
        }

        let status: Option<MatchStatus> = sqlx::query_scalar("SELECT status FROM matches WHERE id=?")
            .bind(match_id)
            .fetch_optional(&self.db_pool)
            .await?;
        match status {
            None => Err(CoreError::not_found(format!("no match {match_id}"))),
            Some(_) => Err(CoreError::MatchNotActive(match_id)),
        }
    }

    /// The newest `limit` messages, oldest first.
    pub async fn recent(&self, match_id: MatchId, limit: u32) -> Result<Vec<Message>, CoreError> {
        let mut messages: Vec<Message> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE match_id=? ORDER BY id DESC LIMIT ?"
        ))
        .bind(match_id)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    /// Up to `limit` messages after `after_id`, ascending.
    pub async fn after(
        &self,
        match_id: MatchId,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<Message>, CoreError> {
        Ok(sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE match_id=? AND id>? ORDER BY id ASC LIMIT ?"
        ))
        .bind(match_id)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::testing::{self, active_match, approved};

    #[tokio::test]
    async fn ids_are_per_match_and_gap_free() {
        let db_pool = testing::memory_pool().await;
        let m = active_match(&db_pool).await.matched;
        let log = MessageLog::new(db_pool.clone());

        for expected in 1..=3 {
            let message = log.append(m.id, m.student_id, "hi").await.unwrap();
            assert_eq!(message.id, expected);
            assert_eq!(message.match_id, m.id);
        }
    }

    #[tokio::test]
    async fn ended_match_refuses_messages() {
        let db_pool = testing::memory_pool().await;
        let pair = active_match(&db_pool).await;
        let m = pair.matched.clone();
        let log = MessageLog::new(db_pool.clone());
        log.append(m.id, m.student_id, "before").await.unwrap();

        let admin = approved(&db_pool, "Root", Role::Admin).await;
        pair.store.finish_match(m.id, &admin, MatchStatus::Cancelled).await.unwrap();

        let err = log.append(m.id, m.student_id, "after").await.unwrap_err();
        assert!(matches!(err, CoreError::MatchNotActive(id) if id == m.id));
        let err = log.append(4242, m.student_id, "nowhere").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn history_pages() {
        let db_pool = testing::memory_pool().await;
        let m = active_match(&db_pool).await.matched;
        let log = MessageLog::new(db_pool.clone());
        for n in 1..=5 {
            log.append(m.id, m.alumni_id, &format!("message {n}")).await.unwrap();
        }

        let recent: Vec<i64> = log.recent(m.id, 2).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(recent, vec![4, 5]);

        let after: Vec<i64> = log.after(m.id, 2, 2).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(after, vec![3, 4]);

        assert!(log.after(m.id, 5, 10).await.unwrap().is_empty());
    }
}
