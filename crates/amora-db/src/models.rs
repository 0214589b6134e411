/// Database row types — these map directly to SQLite rows.
/// Distinct from amora-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct LikeRow {
    pub source_id: String,
    pub target_id: String,
    pub created_at: String,
}

/// The other user of a like relationship, as listed for the caller.
pub struct LikedUserRow {
    pub user_id: String,
    pub username: String,
    pub liked_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub recipient_id: String,
    pub recipient_username: String,
    pub content: String,
    pub date_read: Option<String>,
    pub message_sent: String,
    pub sender_deleted: bool,
    pub recipient_deleted: bool,
}

/// Result of a participant deleting a message on their side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// No message with that id.
    NotFound,
    /// The caller is neither sender nor recipient. Nothing was changed.
    NotParticipant,
    /// The caller's flag is set; the other party can still see the message.
    Hidden,
    /// Both flags are set and the row was removed.
    Purged,
}
