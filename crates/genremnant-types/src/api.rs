use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Comment, ContributorRequest, Post, PostType, Reaction, ReactionType, Role, Statistics, User,
};

// -- JWT Claims --

/// Signed bearer token claims. The role is embedded at issuance; the auth
/// middleware still reloads the user so suspensions apply immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

// Request fields are optional so that missing fields produce a 400 with a
// message instead of an extractor rejection.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    #[serde(default)]
    pub request_to_contribute: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub success: bool,
    pub users: Vec<User>,
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// -- Posts --

#[derive(Debug, Default, Deserialize)]
pub struct CreatePostRequest {
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(rename = "type")]
    pub post_type: Option<PostType>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub post: Post,
}

#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub success: bool,
    pub posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub post_id: Uuid,
    pub summary_text: String,
    pub full_text: String,
}

// -- Comments --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub post_id: Option<Uuid>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub success: bool,
    pub comment: Comment,
}

#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    pub success: bool,
    pub comments: Vec<Comment>,
}

// -- Reactions --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactRequest {
    pub post_id: Option<Uuid>,
    pub reaction_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReactionResponse {
    pub success: bool,
    pub reaction: Reaction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionCounts {
    pub post_id: Uuid,
    pub counts: BTreeMap<String, i64>,
    pub total: i64,
}

impl ReactionCounts {
    pub fn new(post_id: Uuid, per_type: impl IntoIterator<Item = (ReactionType, i64)>) -> Self {
        let mut counts: BTreeMap<String, i64> = ReactionType::ALL
            .iter()
            .map(|t| (t.as_str().to_string(), 0))
            .collect();
        let mut total = 0;
        for (reaction_type, n) in per_type {
            *counts.entry(reaction_type.as_str().to_string()).or_default() += n;
            total += n;
        }
        Self {
            post_id,
            counts,
            total,
        }
    }
}

/// Most rows the polling endpoint returns at once. A full page means more may follow.
pub const UPDATES_PAGE_LIMIT: usize = 200;

/// Polling cursor: the `updatedAt` and id of the last reaction already seen.
#[derive(Debug, Deserialize)]
pub struct UpdatesQuery {
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    pub after: Option<Uuid>,
}

// -- Users & friendships --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub whatsapp: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    pub facebook: Option<String>,
}

/// Body of `PUT /api/users/profile/{channel}`: `{ "<channel>": "<handle>" }`
/// or `{ "value": "<handle>" }`.
#[derive(Debug, Default, Deserialize)]
pub struct SocialHandleRequest {
    pub value: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestBody {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendDecisionBody {
    /// Id of the user who sent the request.
    pub request_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendsResponse {
    pub success: bool,
    pub friends: Vec<User>,
    pub requests: Vec<User>,
    pub sent_requests: Vec<User>,
}

// -- Admin --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdBody {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoleBody {
    pub user_id: Option<Uuid>,
    pub new_role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppBody {
    pub user_id: Option<Uuid>,
    pub whatsapp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackBody {
    pub user_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub feedback: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostIdBody {
    pub post_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminEditPostBody {
    pub post_id: Option<Uuid>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContributorRequestsResponse {
    pub success: bool,
    pub requests: Vec<ContributorRequest>,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub success: bool,
    pub stats: Statistics,
}
