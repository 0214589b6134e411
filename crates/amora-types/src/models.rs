use serde::{Deserialize, Serialize};

/// Which side of the like relationship a listing shows.
///
/// Parsing is lenient: names are matched case-insensitively and anything
/// unrecognised falls back to [`LikesPredicate::Liked`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LikesPredicate {
    /// Users the caller liked.
    #[default]
    Liked,
    /// Users who liked the caller.
    LikedBy,
    /// Users the caller liked who also liked the caller back.
    Matched,
}

impl LikesPredicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Liked => "liked",
            Self::LikedBy => "likedBy",
            Self::Matched => "matched",
        }
    }
}

impl From<&str> for LikesPredicate {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "likedby" => Self::LikedBy,
            "matched" => Self::Matched,
            _ => Self::Liked,
        }
    }
}

/// Named view over a user's messages. Defaults to `Unread`; unknown names
/// fall back to the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContainer {
    /// Messages received by the caller.
    Inbox,
    /// Messages sent by the caller.
    Outbox,
    /// Received messages not yet read.
    #[default]
    Unread,
}

impl MessageContainer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "Inbox",
            Self::Outbox => "Outbox",
            Self::Unread => "Unread",
        }
    }
}

impl From<&str> for MessageContainer {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "inbox" => Self::Inbox,
            "outbox" => Self::Outbox,
            _ => Self::Unread,
        }
    }
}

/// Serialized into the `Pagination` response header of paged listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationHeader {
    pub current_page: u32,
    pub items_per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationHeader {
    pub fn new(current_page: u32, items_per_page: u32, total_items: u64) -> Self {
        let per_page = u64::from(items_per_page.max(1));
        let total_pages = total_items.div_ceil(per_page) as u32;
        Self {
            current_page,
            items_per_page,
            total_items,
            total_pages,
        }
    }
}
