use axum::{
    Extension, Json,
    extract::State,
};
use tracing::info;

use genremnant_db::models::ProfileChanges;
use genremnant_types::api::{
    FriendDecisionBody, FriendRequestBody, FriendsResponse, MessageResponse, SocialHandleRequest,
    UpdateProfileRequest, UserResponse, UsersResponse,
};
use genremnant_types::models::{FriendshipStatus, RequestStatus, SocialChannel};

use crate::auth::non_empty;
use crate::error::{ApiError, ApiJson, ApiPath, ApiResult, conflict_as};
use crate::middleware::AuthUser;
use crate::state::AppState;

pub async fn profile(Extension(user): Extension<AuthUser>) -> Json<UserResponse> {
    Json(UserResponse {
        success: true,
        user: user.0.into(),
    })
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    let changes = ProfileChanges {
        display_name: non_empty(req.display_name).map(|name| name.trim().to_string()),
        whatsapp: req.whatsapp.map(|v| v.trim().to_string()),
        instagram: req.instagram.map(|v| v.trim().to_string()),
        tiktok: req.tiktok.map(|v| v.trim().to_string()),
        facebook: req.facebook.map(|v| v.trim().to_string()),
    };
    let updated = state
        .db
        .update_profile(user.id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse {
        success: true,
        user: updated.into(),
    }))
}

/// Set a single handle. An empty value clears it.
pub async fn update_channel(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(channel): ApiPath<String>,
    ApiJson(req): ApiJson<SocialHandleRequest>,
) -> ApiResult<Json<UserResponse>> {
    let channel: SocialChannel = channel
        .parse()
        .map_err(|_| ApiError::not_found("Unknown social channel"))?;

    let value = req.value.or_else(|| {
        req.fields
            .get(channel.as_str())
            .and_then(|v| v.as_str())
            .map(str::to_string)
    });
    let value = value.as_deref().map(str::trim).filter(|v| !v.is_empty());

    let updated = state
        .db
        .set_social_handle(user.id, channel, value)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse {
        success: true,
        user: updated.into(),
    }))
}

pub async fn request_contributor(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<MessageResponse>> {
    user.require_active()?;

    if user.role.can_author() {
        return Err(ApiError::conflict("You already have contributor access"));
    }
    if user.contributor_request_status == Some(RequestStatus::Pending) {
        return Err(ApiError::conflict("Contributor request already pending"));
    }

    state.db.create_contributor_request(user.id).await?;
    info!("{} requested contributor access", user.email);

    Ok(Json(MessageResponse::ok("Contributor request submitted")))
}

pub async fn discover(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<UsersResponse>> {
    let users = state.db.list_other_users(user.id).await?;
    Ok(Json(UsersResponse {
        success: true,
        users: users.into_iter().map(Into::into).collect(),
    }))
}

pub async fn friends(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<FriendsResponse>> {
    let friends = state.db.friends_of(user.id).await?;
    let requests = state.db.incoming_friend_requests(user.id).await?;
    let sent_requests = state.db.outgoing_friend_requests(user.id).await?;

    Ok(Json(FriendsResponse {
        success: true,
        friends: friends.into_iter().map(Into::into).collect(),
        requests: requests.into_iter().map(Into::into).collect(),
        sent_requests: sent_requests.into_iter().map(Into::into).collect(),
    }))
}

pub async fn send_friend_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<FriendRequestBody>,
) -> ApiResult<Json<MessageResponse>> {
    let target = req.user_id.ok_or_else(|| ApiError::bad_request("User ID is required"))?;
    if target == user.id {
        return Err(ApiError::bad_request("Cannot send friend request to yourself"));
    }
    if state.db.get_user_by_id(target).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    if state.db.friendship_between(user.id, target).await?.is_some() {
        return Err(ApiError::conflict("Friendship already exists"));
    }

    state
        .db
        .create_friend_request(user.id, target)
        .await
        .map_err(conflict_as("Friendship already exists"))?;
    Ok(Json(MessageResponse::ok("Friend request sent successfully")))
}

pub async fn accept_friend_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<FriendDecisionBody>,
) -> ApiResult<Json<MessageResponse>> {
    decide(&state, &user, req, FriendshipStatus::Accepted).await?;
    Ok(Json(MessageResponse::ok("Friend request accepted successfully")))
}

pub async fn reject_friend_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<FriendDecisionBody>,
) -> ApiResult<Json<MessageResponse>> {
    decide(&state, &user, req, FriendshipStatus::Rejected).await?;
    Ok(Json(MessageResponse::ok("Friend request rejected")))
}

async fn decide(
    state: &AppState,
    user: &AuthUser,
    req: FriendDecisionBody,
    status: FriendshipStatus,
) -> ApiResult<()> {
    let requester = req
        .request_id
        .ok_or_else(|| ApiError::bad_request("Request ID is required"))?;
    state
        .db
        .respond_friend_request(requester, user.id, status)
        .await?
        .ok_or_else(|| ApiError::not_found("Friend request not found"))?;
    Ok(())
}
