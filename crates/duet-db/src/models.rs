/// Database row types — these map directly to SQLite rows.
/// Distinct from the duet-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
}

pub struct GalleryRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub file_type: String,
    pub file_path: String,
    pub caption: Option<String>,
    pub created_at: String,
}

pub struct DateRequestRow {
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

pub struct ChatMessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub sender_username: String,
    pub receiver_username: String,
    pub message: String,
    pub read_status: bool,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub message: String,
    pub read_status: bool,
    pub sent_email: bool,
    pub sent_sms: bool,
    pub created_at: String,
}
