use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use genremnant_types::api::{
    CommentResponse, CommentsResponse, CreateCommentRequest, MessageResponse, SearchQuery, UpdateCommentRequest,
};
use genremnant_types::models::Comment;

use crate::auth::non_empty;
use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

pub async fn for_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ApiResult<Json<CommentsResponse>> {
    let comments = state.db.comments_for_post(post_id).await?;
    Ok(Json(CommentsResponse {
        success: true,
        comments: comments.into_iter().map(Into::into).collect(),
    }))
}

pub async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Json<CommentsResponse>> {
    let term = non_empty(query.q).ok_or_else(|| ApiError::bad_request("Search query is required"))?;
    let comments = state.db.search_comments(term.trim()).await?;
    Ok(Json(CommentsResponse {
        success: true,
        comments: comments.into_iter().map(Into::into).collect(),
    }))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_active()?;

    let (Some(post_id), Some(content)) = (req.post_id, non_empty(req.content)) else {
        return Err(ApiError::bad_request("Post ID and content are required"));
    };
    if state.db.get_published_post(post_id).await?.is_none() {
        return Err(ApiError::not_found("Post not found"));
    }

    let comment: Comment = state
        .db
        .create_comment(post_id, user.id, content.trim())
        .await?
        .into();
    state.hub.notify_comment_update(post_id, Some(comment.clone())).await;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            success: true,
            comment,
        }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    let content = non_empty(req.content).ok_or_else(|| ApiError::bad_request("Content is required"))?;

    let existing = state
        .db
        .get_comment(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    if existing.user_id != user.id {
        return Err(ApiError::forbidden("Cannot edit this comment"));
    }

    let comment: Comment = state
        .db
        .update_comment(id, content.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?
        .into();
    state
        .hub
        .notify_comment_update(comment.post_id, Some(comment.clone()))
        .await;

    Ok(Json(CommentResponse {
        success: true,
        comment,
    }))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let existing = state
        .db
        .get_comment(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    if existing.user_id != user.id && !user.is_admin() {
        return Err(ApiError::forbidden("Cannot delete this comment"));
    }

    state.db.delete_comment(id).await?;
    state.hub.notify_comment_update(existing.post_id, None).await;

    Ok(Json(MessageResponse::ok("Comment deleted")))
}
