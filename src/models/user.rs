//! User model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Local role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Competitor,
    Admin,
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// start.gg user ID (also used as document ID)
    pub startgg_user_id: u64,
    /// gamerTag, or `user_{id}` when the account has no player profile
    pub name: String,
    /// Email address (may be None if not shared)
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// When user first connected
    pub created_at: String,
    /// Last login timestamp
    pub last_active: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// User's OAuth tokens (encrypted in Firestore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTokens {
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64); start.gg may not issue one
    pub refresh_token_encrypted: Option<String>,
    /// When the access token expires (ISO 8601); unknown is treated as expiring
    pub expires_at: Option<String>,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
}

/// Profile returned by `/api/me`.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub startgg_user_id: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.startgg_user_id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            startgg_user_id: user.startgg_user_id.to_string(),
        }
    }
}
