use serde::{Deserialize, Serialize};

// -- Roles --

/// Caller role carried in the JWT. `SuperAdmin` may delete any gallery item
/// regardless of ownership; everything else is plain ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    SuperAdmin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Parse a role as stored in the users table. Unknown values fall back
    /// to the unprivileged role.
    pub fn from_db(s: &str) -> Role {
        match s {
            "super_admin" => Role::SuperAdmin,
            _ => Role::User,
        }
    }
}

// -- JWT Claims --

/// Canonical claims shared by the REST middleware and the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// User identity returned from register/login. The password hash is never
/// part of any response type.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: AuthUser,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: String,
}

// -- Gallery --

#[derive(Debug, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub file_type: String,
    pub file_path: String,
    pub caption: Option<String>,
    pub created_at: String,
}

// -- Date requests --

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequestBody {
    #[serde(default)]
    pub request_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DateRequest {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub request_type: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub created_at: String,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    #[serde(default)]
    pub receiver_id: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub sender_username: String,
    pub receiver_username: String,
    pub message: String,
    pub read_status: bool,
    pub created_at: String,
}

// -- Notifications --

#[derive(Debug, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub read_status: bool,
    pub sent_email: bool,
    pub sent_sms: bool,
    pub created_at: String,
}

// -- Shared response shapes --

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}
