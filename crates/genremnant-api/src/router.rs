use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;

use genremnant_gateway::connection;

use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;
use crate::{admin, auth, comments, posts, reactions, users};

/// Every HTTP and WebSocket route, without transport layers (CORS, tracing).
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/api/posts/published", get(posts::published))
        .route("/api/posts/search", get(posts::search))
        .route("/api/posts/{id}", get(posts::get_post))
        .route("/api/posts/{id}/share", get(posts::share))
        .route("/api/comments/post/{post_id}", get(comments::for_post))
        .route("/api/comments/search", get(comments::search))
        .route("/api/reactions/post/{post_id}", get(reactions::counts))
        .route("/api/reactions/updates", get(reactions::updates));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/api/posts", post(posts::create))
        .route("/api/posts/my-posts", get(posts::my_posts))
        .route("/api/posts/{id}", put(posts::update).delete(posts::delete))
        .route("/api/comments", post(comments::create))
        .route("/api/comments/{id}", put(comments::update).delete(comments::delete))
        .route("/api/reactions", post(reactions::react))
        .route("/api/reactions/user/{post_id}", get(reactions::mine))
        .route("/api/reactions/{post_id}", delete(reactions::remove))
        .route("/api/users/profile", get(users::profile).put(users::update_profile))
        .route("/api/users/profile/{channel}", put(users::update_channel))
        .route("/api/users/request-contributor", post(users::request_contributor))
        .route("/api/users/discover", get(users::discover))
        .route("/api/users/friends", get(users::friends))
        .route("/api/users/friend-request", post(users::send_friend_request))
        .route("/api/users/friend-request/accept", post(users::accept_friend_request))
        .route("/api/users/friend-request/reject", post(users::reject_friend_request))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/change-role", post(admin::change_role))
        .route("/api/admin/users/suspend", post(admin::suspend_user))
        .route("/api/admin/users/activate", post(admin::activate_user))
        .route("/api/admin/users/update-whatsapp", post(admin::update_whatsapp))
        .route("/api/admin/users/approve-contributor", post(admin::approve_contributor))
        .route("/api/admin/users/reject-contributor", post(admin::reject_contributor))
        .route("/api/admin/users/{user_id}", delete(admin::delete_user))
        .route("/api/admin/contributor-requests", get(admin::contributor_requests))
        .route("/api/admin/posts/pending", get(admin::pending_posts))
        .route("/api/admin/posts/approve", post(admin::approve_post))
        .route("/api/admin/posts/reject", post(admin::reject_post))
        .route("/api/admin/posts/edit", put(admin::edit_post))
        .route("/api/admin/posts/delete", delete(admin::delete_post))
        .route("/api/admin/statistics", get(admin::statistics))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .fallback(not_found)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "backend": state.db.backend_name(),
        "connections": state.hub.client_count().await,
    }))
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| connection::handle_socket(socket, hub))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Route not found" })))
}
