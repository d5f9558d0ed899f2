//! Matching profiles: the attributes the matching policy scores.

mod update;

use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::auth::Role;
use crate::error::CoreError;
use crate::matching::UserId;
use crate::AppState;

const MAX_TAGS: usize = 30;
const MAX_TAG_LEN: usize = 64;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(update::own_profile).put(update::put_profile))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Profile {
    Student(StudentProfile),
    Alumni(AlumniProfile),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentProfile {
    pub interests: Vec<String>,
    pub skills: Vec<String>,
    pub academic_focus: Option<String>,
    /// Free-form slots such as `"weekday-evenings"`.
    pub availability: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlumniProfile {
    pub expertise: Vec<String>,
    pub skills: Vec<String>,
    pub academic_focus: Option<String>,
    pub availability: Vec<String>,
    pub company: Option<String>,
    pub graduation_year: Option<i32>,
}

impl Profile {
    pub fn role(&self) -> Role {
        match self {
            Profile::Student(_) => Role::Student,
            Profile::Alumni(_) => Role::Alumni,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Profile::Student(p) => {
                check_tags("interests", &p.interests)?;
                check_tags("skills", &p.skills)?;
                check_tags("availability", &p.availability)?;
                check_text("academicFocus", p.academic_focus.as_deref())
            }
            Profile::Alumni(p) => {
                check_tags("expertise", &p.expertise)?;
                check_tags("skills", &p.skills)?;
                check_tags("availability", &p.availability)?;
                check_text("academicFocus", p.academic_focus.as_deref())?;
                check_text("company", p.company.as_deref())?;
                match p.graduation_year {
                    Some(year) if !(1900..=2100).contains(&year) => Err(CoreError::validation(
                        format!("graduationYear {year} is out of range"),
                    )),
                    _ => Ok(()),
                }
            }
        }
    }
}

fn check_tags(field: &str, tags: &[String]) -> Result<(), CoreError> {
    if tags.len() > MAX_TAGS {
        return Err(CoreError::validation(format!("{field} has more than {MAX_TAGS} entries")));
    }
    for tag in tags {
        check_text(field, Some(tag))?;
        if tag.trim().is_empty() {
            return Err(CoreError::validation(format!("{field} contains an empty entry")));
        }
    }
    Ok(())
}

fn check_text(field: &str, text: Option<&str>) -> Result<(), CoreError> {
    match text {
        Some(text) if text.chars().count() > MAX_TAG_LEN => Err(CoreError::validation(format!(
            "{field} entries must be at most {MAX_TAG_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

pub async fn load(db_pool: &SqlitePool, user_id: UserId) -> Result<Option<Profile>, CoreError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT body FROM profiles WHERE user_id=?")
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;

    match row {
        Some((body,)) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

pub async fn save(db_pool: &SqlitePool, user_id: UserId, profile: &Profile) -> Result<(), CoreError> {
    sqlx::query(
        "INSERT INTO profiles (user_id,body,updated_at) VALUES (?,?,?)
         ON CONFLICT(user_id) DO UPDATE SET body=excluded.body, updated_at=excluded.updated_at",
    )
    .bind(user_id)
    .bind(serde_json::to_string(profile)?)
    .bind(OffsetDateTime::now_utc())
    .execute(db_pool)
    .await?;
    Ok(())
}

/// Every approved alumni with its profile, by id. Alumni who never stored
/// a profile get an empty one.
pub async fn alumni_directory(
    db_pool: &SqlitePool,
) -> Result<Vec<(UserId, String, AlumniProfile)>, CoreError> {
    let rows: Vec<(UserId, String, Option<String>)> = sqlx::query_as(
        "SELECT u.id, u.name, p.body FROM users u LEFT JOIN profiles p ON p.user_id = u.id
         WHERE u.role='alumni' AND u.approval_status='approved' ORDER BY u.id",
    )
    .fetch_all(db_pool)
    .await?;

    rows.into_iter()
        .map(|(id, name, body)| -> Result<_, CoreError> {
            let profile = match body.as_deref().map(serde_json::from_str::<Profile>).transpose()? {
                Some(Profile::Alumni(profile)) => profile,
                _ => AlumniProfile::default(),
            };
            Ok((id, name, profile))
        })
        .collect()
}
