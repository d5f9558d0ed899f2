//! Identity gate: everything the core knows about who is calling.
//!
//! Credentials are issued elsewhere; here they are only verified, and the
//! resulting [`Identity`] is handed explicitly to every service call.

mod caller;
mod gate;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::CoreError;
use crate::matching::UserId;

pub use caller::{bearer_token, Caller};
pub use gate::{Gate, IdentityGate, SqliteIdentityGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Student,
    Alumni,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// The verified caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
    pub approval_status: ApprovalStatus,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_role(&self, allowed: &[Role]) -> Result<(), CoreError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(CoreError::not_authorized(format!(
                "{:?} accounts cannot perform this action",
                self.role
            )))
        }
    }

    /// Admins are implicitly approved.
    pub fn require_approved(&self) -> Result<(), CoreError> {
        if self.is_admin() || self.approval_status == ApprovalStatus::Approved {
            Ok(())
        } else {
            Err(CoreError::not_authorized("account is not approved"))
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub approval_status: ApprovalStatus,
}

pub async fn find_user(db_pool: &SqlitePool, id: UserId) -> Result<Option<User>, CoreError> {
    Ok(
        sqlx::query_as("SELECT id,name,role,approval_status FROM users WHERE id=?")
            .bind(id)
            .fetch_optional(db_pool)
            .await?,
    )
}
