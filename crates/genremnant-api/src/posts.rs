use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use genremnant_db::models::{NewPost, PostChanges, PostRow};
use genremnant_types::api::{
    CreatePostRequest, MessageResponse, PostResponse, PostsResponse, SearchQuery, ShareResponse,
    UpdatePostRequest,
};
use genremnant_types::models::{PostStatus, PostType};

use crate::auth::non_empty;
use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

const SHARE_SIGNATURE: &str = "— Generation Remnant";
const SHARE_EXCERPT_CHARS: usize = 200;

pub async fn published(State(state): State<AppState>) -> ApiResult<Json<PostsResponse>> {
    let posts = state.db.published_posts().await?;
    Ok(Json(PostsResponse {
        success: true,
        posts: posts.into_iter().map(Into::into).collect(),
    }))
}

pub async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Json<PostsResponse>> {
    let term = non_empty(query.q).ok_or_else(|| ApiError::bad_request("Search query is required"))?;
    let posts = state.db.search_published_posts(term.trim()).await?;
    Ok(Json(PostsResponse {
        success: true,
        posts: posts.into_iter().map(Into::into).collect(),
    }))
}

pub async fn get_post(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<PostResponse>> {
    let post = find_published(&state, id).await?;
    Ok(Json(PostResponse {
        success: true,
        message: None,
        post: post.into(),
    }))
}

/// Ready-made text for sharing a post to other apps.
pub async fn share(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<ShareResponse>> {
    let post = find_published(&state, id).await?;
    let (summary_text, full_text) = share_texts(&post);
    Ok(Json(ShareResponse {
        post_id: post.id,
        summary_text,
        full_text,
    }))
}

pub async fn my_posts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<PostsResponse>> {
    let posts = state.db.posts_by_author(user.id).await?;
    Ok(Json(PostsResponse {
        success: true,
        posts: posts.into_iter().map(Into::into).collect(),
    }))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_author()?;

    let (Some(post_type), Some(title), Some(content)) =
        (non_empty(req.post_type), non_empty(req.title), non_empty(req.content))
    else {
        return Err(ApiError::bad_request("Type, title, and content are required"));
    };
    let post_type: PostType = post_type
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid post type"))?;
    let summary = non_empty(req.summary);

    let post = state
        .db
        .create_post(NewPost {
            author_id: user.id,
            post_type,
            title: &title,
            content: &content,
            summary: summary.as_deref(),
        })
        .await?;

    info!("{} submitted post {} for review", user.email, post.id);
    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            success: true,
            message: Some("Post created and awaiting approval".into()),
            post: post.into(),
        }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePostRequest>,
) -> ApiResult<Json<PostResponse>> {
    user.require_author()?;

    let post = state
        .db
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;
    if post.author_id != user.id && !user.is_admin() {
        return Err(ApiError::forbidden("Cannot update this post"));
    }
    if post.status != PostStatus::Pending {
        return Err(ApiError::bad_request("Can only edit pending posts"));
    }

    let changes = PostChanges {
        post_type: req.post_type,
        title: non_empty(req.title),
        content: non_empty(req.content),
        summary: req.summary,
    };
    let post = state
        .db
        .update_post(id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(Json(PostResponse {
        success: true,
        message: Some("Post updated".into()),
        post: post.into(),
    }))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    user.require_author()?;

    let post = state
        .db
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;
    if post.author_id != user.id && !user.is_admin() {
        return Err(ApiError::forbidden("Cannot delete this post"));
    }

    state.db.delete_post(id).await?;
    if post.status == PostStatus::Published {
        state.hub.notify_post_update(id, None).await;
    }

    Ok(Json(MessageResponse::ok("Post deleted")))
}

async fn find_published(state: &AppState, id: Uuid) -> ApiResult<PostRow> {
    state
        .db
        .get_published_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

/// (summary text, full text). The summary falls back to an excerpt of the content.
fn share_texts(post: &PostRow) -> (String, String) {
    let lead = match post.summary.as_deref().map(str::trim) {
        Some(summary) if !summary.is_empty() => summary.to_string(),
        _ => excerpt(&post.content, SHARE_EXCERPT_CHARS),
    };
    let summary_text = format!("{}\n\n{}\n\n{}", post.title, lead, SHARE_SIGNATURE);
    let full_text = format!("{}\n\n{}\n\n{}", post.title, post.content, SHARE_SIGNATURE);
    (summary_text, full_text)
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(summary: Option<&str>, content: &str) -> PostRow {
        let now = Utc::now();
        PostRow {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author_name: None,
            post_type: PostType::DailyMotivation,
            title: "Rise".into(),
            content: content.into(),
            summary: summary.map(str::to_string),
            status: PostStatus::Published,
            rejection_feedback: None,
            created_at: now,
            updated_at: now,
            published_at: Some(now),
        }
    }

    #[test]
    fn share_text_uses_summary_when_present() {
        let (summary, full) = share_texts(&post(Some("Keep going"), "Long body"));
        assert_eq!(summary, "Rise\n\nKeep going\n\n— Generation Remnant");
        assert_eq!(full, "Rise\n\nLong body\n\n— Generation Remnant");
    }

    #[test]
    fn share_summary_falls_back_to_excerpt() {
        let content = "word ".repeat(100);
        let (summary, _) = share_texts(&post(Some("  "), &content));
        let lead = summary.split("\n\n").nth(1).unwrap();
        assert!(lead.ends_with("..."));
        assert!(lead.chars().count() <= SHARE_EXCERPT_CHARS + 3);
    }

    #[test]
    fn excerpt_keeps_short_text_whole() {
        assert_eq!(excerpt(" short ", 10), "short");
        assert_eq!(excerpt("ñandú ñandú", 5), "ñandú...");
    }
}
