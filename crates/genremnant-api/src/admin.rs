//! Moderation and user management. Every route here sits behind
//! `require_auth` + `require_admin`.

use axum::{
    Extension, Json,
    extract::State,
};
use tracing::info;
use uuid::Uuid;

use genremnant_db::models::{PostChanges, UserRow};
use genremnant_types::api::{
    AdminEditPostBody, ChangeRoleBody, ContributorRequestsResponse, FeedbackBody, MessageResponse, PostIdBody,
    PostResponse, PostsResponse, StatisticsResponse, UserIdBody, UsersResponse, WhatsAppBody,
};
use genremnant_types::models::{Post, PostStatus, Role, SocialChannel, UserStatus};

use crate::auth::non_empty;
use crate::error::{ApiError, ApiJson, ApiPath, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

fn user_id_required(id: Option<Uuid>) -> ApiResult<Uuid> {
    id.ok_or_else(|| ApiError::bad_request("User ID is required"))
}

fn post_id_required(id: Option<Uuid>) -> ApiResult<Uuid> {
    id.ok_or_else(|| ApiError::bad_request("Post ID is required"))
}

fn found(user: Option<UserRow>) -> ApiResult<UserRow> {
    user.ok_or_else(|| ApiError::not_found("User not found"))
}

// -- Users --

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<UsersResponse>> {
    let users = state.db.list_users().await?;
    Ok(Json(UsersResponse {
        success: true,
        users: users.into_iter().map(Into::into).collect(),
    }))
}

pub async fn change_role(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiJson(req): ApiJson<ChangeRoleBody>,
) -> ApiResult<Json<MessageResponse>> {
    let (Some(user_id), Some(new_role)) = (req.user_id, req.new_role) else {
        return Err(ApiError::bad_request("User ID and new role are required"));
    };
    let role: Role = new_role.parse().map_err(|_| ApiError::bad_request("Invalid role"))?;

    found(state.db.set_user_role(user_id, role).await?)?;
    info!("{} changed role of {} to {}", admin.email, user_id, role);
    Ok(Json(MessageResponse::ok("User role updated")))
}

pub async fn suspend_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiJson(req): ApiJson<UserIdBody>,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = user_id_required(req.user_id)?;
    if user_id == admin.id {
        return Err(ApiError::bad_request("Cannot suspend your own account"));
    }

    found(state.db.set_user_status(user_id, UserStatus::Suspended).await?)?;
    info!("{} suspended {}", admin.email, user_id);
    Ok(Json(MessageResponse::ok("User suspended")))
}

pub async fn activate_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UserIdBody>,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = user_id_required(req.user_id)?;
    found(state.db.set_user_status(user_id, UserStatus::Active).await?)?;
    Ok(Json(MessageResponse::ok("User activated")))
}

pub async fn update_whatsapp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<WhatsAppBody>,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = user_id_required(req.user_id)?;
    let number = non_empty(req.whatsapp);
    found(
        state
            .db
            .set_social_handle(user_id, SocialChannel::Whatsapp, number.as_deref().map(str::trim))
            .await?,
    )?;
    Ok(Json(MessageResponse::ok("WhatsApp number updated")))
}

pub async fn contributor_requests(State(state): State<AppState>) -> ApiResult<Json<ContributorRequestsResponse>> {
    let requests = state.db.pending_contributor_requests().await?;
    Ok(Json(ContributorRequestsResponse {
        success: true,
        requests: requests.into_iter().map(Into::into).collect(),
    }))
}

pub async fn approve_contributor(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiJson(req): ApiJson<UserIdBody>,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = user_id_required(req.user_id)?;
    found(state.db.approve_contributor(user_id, admin.id).await?)?;
    info!("{} approved contributor access for {}", admin.email, user_id);
    Ok(Json(MessageResponse::ok("Contributor request approved")))
}

pub async fn reject_contributor(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiJson(req): ApiJson<FeedbackBody>,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = user_id_required(req.user_id)?;
    let feedback = non_empty(req.feedback);
    found(
        state
            .db
            .reject_contributor(user_id, admin.id, feedback.as_deref())
            .await?,
    )?;
    Ok(Json(MessageResponse::ok("Contributor request rejected")))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if user_id == admin.id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }
    if !state.db.delete_user(user_id).await? {
        return Err(ApiError::not_found("User not found"));
    }
    info!("{} deleted user {}", admin.email, user_id);
    Ok(Json(MessageResponse::ok("User deleted")))
}

// -- Posts --

pub async fn pending_posts(State(state): State<AppState>) -> ApiResult<Json<PostsResponse>> {
    let posts = state.db.pending_posts().await?;
    Ok(Json(PostsResponse {
        success: true,
        posts: posts.into_iter().map(Into::into).collect(),
    }))
}

pub async fn approve_post(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PostIdBody>,
) -> ApiResult<Json<PostResponse>> {
    let post_id = post_id_required(req.post_id)?;
    let post = state
        .db
        .approve_post(post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let post = Post::from(post);
    state.hub.notify_post_update(post_id, Some(post.clone())).await;

    Ok(Json(PostResponse {
        success: true,
        message: Some("Post approved and published".into()),
        post,
    }))
}

pub async fn reject_post(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<FeedbackBody>,
) -> ApiResult<Json<PostResponse>> {
    let post_id = post_id_required(req.post_id)?;
    let feedback = non_empty(req.feedback);
    let was_published = state
        .db
        .get_post(post_id)
        .await?
        .is_some_and(|p| p.status == PostStatus::Published);

    let post = state
        .db
        .reject_post(post_id, feedback.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    // Pulled from the feed
    if was_published {
        state.hub.notify_post_update(post_id, None).await;
    }

    Ok(Json(PostResponse {
        success: true,
        message: Some("Post rejected".into()),
        post: post.into(),
    }))
}

/// Edit any post regardless of status.
pub async fn edit_post(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AdminEditPostBody>,
) -> ApiResult<Json<PostResponse>> {
    let post_id = post_id_required(req.post_id)?;
    let changes = PostChanges {
        post_type: None,
        title: non_empty(req.title),
        content: non_empty(req.content),
        summary: req.summary,
    };
    let post = state
        .db
        .update_post(post_id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let post = Post::from(post);
    if post.status == PostStatus::Published {
        state.hub.notify_post_update(post_id, Some(post.clone())).await;
    }

    Ok(Json(PostResponse {
        success: true,
        message: Some("Post updated".into()),
        post,
    }))
}

pub async fn delete_post(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PostIdBody>,
) -> ApiResult<Json<MessageResponse>> {
    let post_id = post_id_required(req.post_id)?;
    if !state.db.delete_post(post_id).await? {
        return Err(ApiError::not_found("Post not found"));
    }
    state.hub.notify_post_update(post_id, None).await;
    Ok(Json(MessageResponse::ok("Post deleted")))
}

pub async fn statistics(State(state): State<AppState>) -> ApiResult<Json<StatisticsResponse>> {
    let stats = state.db.statistics().await?;
    Ok(Json(StatisticsResponse { success: true, stats }))
}
