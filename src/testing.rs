//! Fixtures for unit tests.

use sqlx::SqlitePool;

use crate::auth::{ApprovalStatus, Identity, Role};
use crate::config::{DatabaseConfig, MatchingConfig};
use crate::matching::{Decision, Match, MatchStore, UserId};

pub(crate) async fn memory_pool() -> SqlitePool {
    crate::db::connect(&DatabaseConfig::in_memory())
        .await
        .expect("in-memory database")
}

pub(crate) fn token_for(user_id: UserId) -> String {
    format!("token-{user_id}")
}

/// Insert a user with a bearer token of [`token_for`] its id.
pub(crate) async fn seed_user(
    db_pool: &SqlitePool,
    name: &str,
    role: Role,
    approval_status: ApprovalStatus,
) -> Identity {
    let (user_id,): (UserId,) =
        sqlx::query_as("INSERT INTO users (name,role,approval_status) VALUES (?,?,?) RETURNING id")
            .bind(name)
            .bind(role)
            .bind(approval_status)
            .fetch_one(db_pool)
            .await
            .expect("insert user");

    sqlx::query("INSERT INTO auth_tokens (token,user_id) VALUES (?,?)")
        .bind(token_for(user_id))
        .bind(user_id)
        .execute(db_pool)
        .await
        .expect("insert token");

    Identity { user_id, role, approval_status }
}

pub(crate) async fn approved(db_pool: &SqlitePool, name: &str, role: Role) -> Identity {
    seed_user(db_pool, name, role, ApprovalStatus::Approved).await
}

/// A cover letter of exactly `len` characters with no surrounding whitespace.
pub(crate) fn letter(len: usize) -> String {
    let mut letter: String = "I would love your guidance on systems work. "
        .chars()
        .cycle()
        .take(len.saturating_sub(1))
        .collect();
    letter.push('.');
    letter
}

/// An approved student/alumni pair with an active match between them.
pub(crate) struct Pair {
    pub store: MatchStore,
    pub student: Identity,
    pub alumni: Identity,
    pub matched: Match,
}

pub(crate) async fn active_match(db_pool: &SqlitePool) -> Pair {
    let store = MatchStore::new(db_pool.clone(), MatchingConfig::default());
    let student = approved(db_pool, "Sam", Role::Student).await;
    let alumni = approved(db_pool, "Ada", Role::Alumni).await;

    let request = store
        .create_request(student.user_id, alumni.user_id, &letter(60))
        .await
        .expect("create request");
    let matched = store
        .decide_request(request.id, Decision::Approve, &alumni)
        .await
        .expect("approve request")
        .activated
        .expect("approval activates a match");

    Pair { store, student, alumni, matched }
}
