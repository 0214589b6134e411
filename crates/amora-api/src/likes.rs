use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, info};

use amora_db::Database;
use amora_types::api::{Claims, LikeResponse, LikedUserResponse};
use amora_types::models::{LikesPredicate, PaginationHeader};

use crate::auth::normalize_username;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{self, Page};
use crate::{AppState, parse_timestamp, parse_uuid, run_blocking};

#[derive(Debug, Default, Deserialize)]
pub struct LikesQuery {
    /// `liked` (default), `likedBy` or `matched`.
    pub predicate: Option<String>,
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
}

/// Records and lists one-directional likes. A match is never stored; it is
/// the pair Like(A, B) + Like(B, A) found at query time.
pub struct LikeService<'a> {
    db: &'a Database,
}

impl<'a> LikeService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn add_like(&self, caller: &Claims, target_username: &str) -> ApiResult<LikeResponse> {
        let target_username = normalize_username(target_username);

        let target_id = self
            .db
            .resolve_user(&target_username)?
            .ok_or_else(|| ApiError::NotFound(format!("User {} not found", target_username)))?;

        if target_id == caller.sub.to_string() {
            return Err(ApiError::BadRequest("You cannot like yourself".into()));
        }

        let like = self
            .db
            .insert_like(&caller.sub.to_string(), &target_id)?
            .ok_or_else(|| ApiError::BadRequest(format!("You already like {}", target_username)))?;

        info!("{} liked {}", caller.username, target_username);
        Ok(LikeResponse {
            source_username: caller.username.clone(),
            target_username,
            created_at: parse_timestamp(&like.created_at),
        })
    }

    pub fn get_likes(
        &self,
        caller: &Claims,
        predicate: LikesPredicate,
        page: Page,
    ) -> ApiResult<(Vec<LikedUserResponse>, PaginationHeader)> {
        let (rows, total) =
            self.db
                .get_likes(&caller.sub.to_string(), predicate, page.size, page.offset())?;

        let users = rows
            .into_iter()
            .map(|row| LikedUserResponse {
                user_id: parse_uuid(&row.user_id),
                username: row.username,
                liked_at: parse_timestamp(&row.liked_at),
            })
            .collect();

        Ok((users, page.header(total)))
    }
}

/// POST /api/likes/{username}
pub async fn add_like(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<LikeResponse>> {
    let like =
        run_blocking(&state, move |db| LikeService::new(db).add_like(&claims, &username)).await?;
    Ok(Json(like))
}

/// GET /api/likes?predicate=likedBy&page_number=1&page_size=10
pub async fn get_user_likes(
    State(state): State<AppState>,
    Query(query): Query<LikesQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let predicate = query
        .predicate
        .as_deref()
        .map(LikesPredicate::from)
        .unwrap_or_default();
    let page = Page::new(query.page_number, query.page_size);
    debug!("Listing {} likes for {}", predicate.as_str(), claims.username);

    let (users, header) =
        run_blocking(&state, move |db| LikeService::new(db).get_likes(&claims, predicate, page))
            .await?;

    Ok((pagination::header_pair(&header)?, Json(users)))
}
