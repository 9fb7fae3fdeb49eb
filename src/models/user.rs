use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use crate::error::{AppError, Result};

/// User model
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub user_name: String,
    /// JSON object holding the free-form profile fields
    pub profile: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Stored profile fields; an error if the column does not hold a JSON object
    pub fn profile_fields(&self) -> Result<Map<String, Value>> {
        serde_json::from_str(&self.profile).map_err(|e| {
            AppError::Internal(format!("Profile of user #{} is corrupt: {}", self.id, e))
        })
    }
}

/// User response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub user_name: String,
    pub profile: Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let profile = user.profile_fields().unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Map::new()
        });
        Self {
            id: user.id,
            user_name: user.user_name,
            profile,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Create user request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    #[serde(alias = "userName")]
    pub user_name: String,
    #[serde(default)]
    pub profile: Map<String, Value>,
}

/// Partial user update; absent fields are left as they are
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default, alias = "userName")]
    pub user_name: Option<String>,
    #[serde(default)]
    pub profile: Option<Map<String, Value>>,
}

/// One page of users
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub total: i64,
    pub user_list: Vec<UserResponse>,
}
