use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::CoreError;

use super::Identity;

/// Verify a bearer credential.
#[async_trait]
pub trait IdentityGate: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, CoreError>;
}

/// Shared handle stored in the app state.
#[derive(Clone)]
pub struct Gate(Arc<dyn IdentityGate>);

impl Gate {
    pub fn new(gate: impl IdentityGate + 'static) -> Self {
        Self(Arc::new(gate))
    }

    pub async fn verify(&self, token: &str) -> Result<Identity, CoreError> {
        self.0.verify(token).await
    }
}

/// Reads the token table the identity system writes.
#[derive(Clone)]
pub struct SqliteIdentityGate {
    db_pool: SqlitePool,
}

impl SqliteIdentityGate {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl IdentityGate for SqliteIdentityGate {
    async fn verify(&self, token: &str) -> Result<Identity, CoreError> {
        sqlx::query_as::<_, Identity>(
            "SELECT u.id AS user_id, u.role, u.approval_status
             FROM auth_tokens t JOIN users u ON u.id = t.user_id
             WHERE t.token = ? AND t.revoked = 0",
        )
        .bind(token)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(CoreError::Unauthenticated)
    }
}
