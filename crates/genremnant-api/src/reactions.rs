use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use genremnant_types::api::{
    MessageResponse, ReactRequest, ReactionCounts, ReactionResponse, UPDATES_PAGE_LIMIT, UpdatesQuery,
};
use genremnant_types::events::ReactionUpdate;
use genremnant_types::models::{Reaction, ReactionType};

use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

pub async fn counts(State(state): State<AppState>, ApiPath(post_id): ApiPath<Uuid>) -> ApiResult<Json<ReactionCounts>> {
    let per_type = state.db.reaction_counts(post_id).await?;
    Ok(Json(ReactionCounts::new(post_id, per_type)))
}

/// The caller's reaction on a post, or `null`.
pub async fn mine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let reaction: Option<Reaction> = state
        .db
        .get_user_reaction(post_id, user.id)
        .await?
        .map(Into::into);
    Ok(Json(json!({ "success": true, "reaction": reaction })))
}

/// Polling endpoint: reactions written after the `(since, after)` cursor, as update payloads.
pub async fn updates(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UpdatesQuery>,
) -> ApiResult<Json<Vec<ReactionUpdate>>> {
    let rows = state
        .db
        .reactions_updated_since(query.since, query.after, UPDATES_PAGE_LIMIT)
        .await?;
    let updates = rows
        .into_iter()
        .map(|row| {
            let timestamp = row.updated_at.timestamp_millis();
            ReactionUpdate {
                post_id: row.post_id,
                reaction: Some(row.into()),
                timestamp,
            }
        })
        .collect();
    Ok(Json(updates))
}

pub async fn react(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<ReactRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_active()?;

    let (Some(post_id), Some(reaction_type)) = (req.post_id, req.reaction_type) else {
        return Err(ApiError::bad_request("Post ID and reaction type are required"));
    };
    let reaction_type: ReactionType = reaction_type
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid reaction type"))?;

    if state.db.get_published_post(post_id).await?.is_none() {
        return Err(ApiError::not_found("Post not found"));
    }

    let (row, created) = state.db.upsert_reaction(post_id, user.id, reaction_type).await?;
    let reaction: Reaction = row.into();
    state.hub.notify_reaction_update(post_id, Some(reaction.clone())).await;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(ReactionResponse {
            success: true,
            reaction,
        }),
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    user.require_active()?;

    if !state.db.delete_reaction(post_id, user.id).await? {
        return Err(ApiError::not_found("Reaction not found"));
    }
    state.hub.notify_reaction_update(post_id, None).await;

    Ok(Json(MessageResponse::ok("Reaction removed")))
}

