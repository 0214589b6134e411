use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use amora_db::Database;
use amora_db::models::{DeleteOutcome, MessageRow};
use amora_types::api::{Claims, CreateMessageRequest, MessageResponse};
use amora_types::models::{MessageContainer, PaginationHeader};

use crate::auth::normalize_username;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{self, Page};
use crate::{AppState, parse_timestamp, parse_uuid, run_blocking};

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    /// `Inbox`, `Outbox` or `Unread` (default).
    pub container: Option<String>,
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
}

/// Direct messages between two users. Each side deletes independently; the
/// row is purged once both have.
pub struct MessageService<'a> {
    db: &'a Database,
}

impl<'a> MessageService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create_message(
        &self,
        caller: &Claims,
        recipient_username: &str,
        content: &str,
    ) -> ApiResult<MessageResponse> {
        let recipient_username = normalize_username(recipient_username);

        if recipient_username == normalize_username(&caller.username) {
            return Err(ApiError::BadRequest("You cannot send messages to yourself".into()));
        }
        if content.trim().is_empty() {
            return Err(ApiError::BadRequest("Message content cannot be empty".into()));
        }

        let recipient_id = self
            .db
            .resolve_user(&recipient_username)?
            .ok_or_else(|| ApiError::NotFound(format!("User {} not found", recipient_username)))?;

        let id = Uuid::new_v4().to_string();
        let row = self
            .db
            .insert_message(&id, &caller.sub.to_string(), &recipient_id, content)?;

        info!("Message {} sent from {} to {}", id, caller.username, recipient_username);
        Ok(to_response(row))
    }

    pub fn get_messages_for_user(
        &self,
        caller: &Claims,
        container: MessageContainer,
        page: Page,
    ) -> ApiResult<(Vec<MessageResponse>, PaginationHeader)> {
        let (rows, total) = self.db.get_messages_for_user(
            &caller.sub.to_string(),
            container,
            page.size,
            page.offset(),
        )?;

        let messages = rows.into_iter().map(to_response).collect();
        Ok((messages, page.header(total)))
    }

    /// Conversation with `other_username`, oldest first. Unknown users have
    /// an empty thread.
    pub fn get_message_thread(
        &self,
        caller: &Claims,
        other_username: &str,
    ) -> ApiResult<Vec<MessageResponse>> {
        let other_username = normalize_username(other_username);
        let Some(other_id) = self.db.resolve_user(&other_username)? else {
            return Ok(vec![]);
        };

        let rows = self.db.get_message_thread(&caller.sub.to_string(), &other_id)?;
        Ok(rows.into_iter().map(to_response).collect())
    }

    /// Hides the message from the caller. Returns whether it was purged.
    /// Deleting again from the same side is a no-op.
    pub fn delete_message(&self, caller: &Claims, message_id: &str) -> ApiResult<bool> {
        let not_found = || ApiError::NotFound(format!("Message {} not found", message_id));

        let id: Uuid = message_id.parse().map_err(|_| not_found())?;

        match self.db.delete_message_for(&id.to_string(), &caller.sub.to_string())? {
            DeleteOutcome::NotFound => Err(not_found()),
            DeleteOutcome::NotParticipant => {
                warn!("{} tried to delete message {} they are not part of", caller.username, id);
                Err(ApiError::Unauthorized("You are not part of this conversation".into()))
            }
            DeleteOutcome::Hidden => Ok(false),
            DeleteOutcome::Purged => {
                info!("Message {} deleted by both parties, purged", id);
                Ok(true)
            }
        }
    }
}

fn to_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: parse_uuid(&row.id),
        sender_id: parse_uuid(&row.sender_id),
        sender_username: row.sender_username,
        recipient_id: parse_uuid(&row.recipient_id),
        recipient_username: row.recipient_username,
        content: row.content,
        date_read: row.date_read.as_deref().map(parse_timestamp),
        message_sent: parse_timestamp(&row.message_sent),
    }
}

/// POST /api/messages
pub async fn create_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateMessageRequest>, ApiError>,
) -> ApiResult<Json<MessageResponse>> {
    let message = run_blocking(&state, move |db| {
        MessageService::new(db).create_message(&claims, &req.recipient_username, &req.content)
    })
    .await?;

    Ok(Json(message))
}

/// GET /api/messages?container=Outbox&page_number=1&page_size=10
pub async fn get_messages_for_user(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let container = query
        .container
        .as_deref()
        .map(MessageContainer::from)
        .unwrap_or_default();
    let page = Page::new(query.page_number, query.page_size);
    debug!("Listing {} messages for {}", container.as_str(), claims.username);

    let (messages, header) = run_blocking(&state, move |db| {
        MessageService::new(db).get_messages_for_user(&claims, container, page)
    })
    .await?;

    Ok((pagination::header_pair(&header)?, Json(messages)))
}

/// GET /api/messages/thread/{username}
pub async fn get_message_thread(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let thread = run_blocking(&state, move |db| {
        MessageService::new(db).get_message_thread(&claims, &username)
    })
    .await?;

    Ok(Json(thread))
}

/// DELETE /api/messages/{id}
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let purged =
        run_blocking(&state, move |db| MessageService::new(db).delete_message(&claims, &id))
            .await?;

    Ok(Json(json!({ "purged": purged })))
}
