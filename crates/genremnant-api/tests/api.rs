use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use genremnant_api::{AppState, AppStateInner, router};
use genremnant_db::Database;
use genremnant_gateway::NotificationHub;
use genremnant_gateway::hub::Outbound;

const ADMIN_EMAIL: &str = "admin@x.com";

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().await.unwrap(),
            hub: NotificationHub::new(),
            jwt_secret: "test-secret".into(),
            admin_email: Some(ADMIN_EMAIL.into()),
        });
        Self {
            router: router(state.clone()),
            state,
        }
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("GET", uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, token, Some(body)).await
    }

    /// Register and return (token, user id).
    async fn register(&self, email: &str, name: &str, request_to_contribute: bool) -> (String, String) {
        let (status, body) = self
            .post(
                "/auth/register",
                None,
                json!({
                    "email": email,
                    "displayName": name,
                    "password": "secret1",
                    "confirmPassword": "secret1",
                    "requestToContribute": request_to_contribute,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn admin(&self) -> String {
        self.register(ADMIN_EMAIL, "Admin", false).await.0
    }

    /// A contributor approved by `admin`.
    async fn contributor(&self, admin: &str) -> (String, String) {
        let (token, id) = self.register("c@x.com", "Cora", true).await;
        let (status, _) = self
            .post("/api/admin/users/approve-contributor", Some(admin), json!({ "userId": id }))
            .await;
        assert_eq!(status, StatusCode::OK);
        (token, id)
    }

    async fn published_post(&self, admin: &str, author: &str) -> String {
        let (status, body) = self
            .post(
                "/api/posts",
                Some(author),
                json!({ "type": "sermon", "title": "Grace", "content": "Grace upon grace" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let id = body["post"]["id"].as_str().unwrap().to_string();
        let (status, _) = self
            .post("/api/admin/posts/approve", Some(admin), json!({ "postId": id }))
            .await;
        assert_eq!(status, StatusCode::OK);
        id
    }
}

/// Next envelope the hub queued for `rx`, if any.
fn next_event(rx: &mut Outbound) -> Option<Value> {
    rx.try_recv()
        .ok()
        .map(|text| serde_json::from_str(text.as_str()).unwrap())
}

#[tokio::test]
async fn register_then_login_returns_same_user() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/auth/register",
            None,
            json!({ "email": "a@x.com", "displayName": "A", "password": "secret1", "confirmPassword": "secret1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["role"], "regular");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    let user_id = body["user"]["id"].clone();

    let (status, body) = app
        .post("/auth/login", None, json!({ "email": "a@x.com", "password": "secret1" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "a@x.com");
    assert!(body["user"]["lastLoginAt"].is_string());
}

#[tokio::test]
async fn registration_is_validated() {
    let app = TestApp::new().await;
    let cases = [
        (json!({ "email": "a@x.com", "password": "secret1" }), StatusCode::BAD_REQUEST),
        (
            json!({ "email": "a@x.com", "displayName": "A", "password": "secret1", "confirmPassword": "secret2" }),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({ "email": "a@x.com", "displayName": "A", "password": "short", "confirmPassword": "short" }),
            StatusCode::BAD_REQUEST,
        ),
    ];
    for (body, expected) in cases {
        let (status, res) = app.post("/auth/register", None, body).await;
        assert_eq!(status, expected);
        assert!(res["message"].is_string());
    }

    app.register("a@x.com", "A", false).await;
    let (status, body) = app
        .post(
            "/auth/register",
            None,
            json!({ "email": "A@X.com", "displayName": "Again", "password": "secret1", "confirmPassword": "secret1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already registered");
}

#[tokio::test]
async fn bad_credentials_are_rejected() {
    let app = TestApp::new().await;
    app.register("a@x.com", "A", false).await;

    let (status, _) = app
        .post("/auth/login", None, json!({ "email": "a@x.com", "password": "wrong1" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post("/auth/login", None, json!({ "email": "nobody@x.com", "password": "secret1" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/auth/login", None, json!({ "email": "a@x.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_token_is_401_and_bad_token_is_403() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token provided");

    let (status, body) = app.get("/auth/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/nothing/here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route not found");
}

#[tokio::test]
async fn health_reports_backend_and_connections() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "sqlite");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn pending_post_is_hidden_until_approved() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (author, _) = app.contributor(&admin).await;

    let (status, body) = app
        .post(
            "/api/posts",
            Some(&author),
            json!({ "type": "daily_motivation", "title": "Rise", "content": "Rise and shine", "summary": "Morning" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["post"]["status"], "pending");
    let id = body["post"]["id"].as_str().unwrap().to_string();

    let (_, feed) = app.get("/api/posts/published", None).await;
    assert_eq!(feed["posts"].as_array().unwrap().len(), 0);
    let (status, _) = app.get(&format!("/api/posts/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, mine) = app.get("/api/posts/my-posts", Some(&author)).await;
    assert_eq!(mine["posts"].as_array().unwrap().len(), 1);

    let (_, pending) = app.get("/api/admin/posts/pending", Some(&admin)).await;
    assert_eq!(pending["posts"][0]["id"], id.as_str());

    let (_conn, mut rx) = app.state.hub.register().await;
    let (status, body) = app
        .post("/api/admin/posts/approve", Some(&admin), json!({ "postId": id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["status"], "published");
    assert!(body["post"]["publishedAt"].is_string());

    let pushed = next_event(&mut rx).unwrap();
    assert_eq!(pushed["type"], "post_update");
    assert_eq!(pushed["payload"]["postId"], id.as_str());
    assert_eq!(pushed["payload"]["post"]["status"], "published");

    let (_, feed) = app.get("/api/posts/published", None).await;
    assert_eq!(feed["posts"][0]["id"], id.as_str());
    assert_eq!(feed["posts"][0]["authorName"], "Cora");

    let (status, share) = app.get(&format!("/api/posts/{}/share", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(share["summaryText"].as_str().unwrap().contains("Morning"));
    assert!(share["fullText"].as_str().unwrap().contains("Rise and shine"));

    let (status, found) = app.get("/api/posts/search?q=shine", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["posts"].as_array().unwrap().len(), 1);
    let (status, _) = app.get("/api/posts/search", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejecting_notifies_only_when_a_post_leaves_the_feed() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (author, _) = app.contributor(&admin).await;

    let (_, created) = app
        .post(
            "/api/posts",
            Some(&author),
            json!({ "type": "sermon", "title": "Draft", "content": "Not yet" }),
        )
        .await;
    let pending_id = created["post"]["id"].as_str().unwrap().to_string();
    let published_id = app.published_post(&admin, &author).await;

    let (_conn, mut rx) = app.state.hub.register().await;

    let (status, body) = app
        .post(
            "/api/admin/posts/reject",
            Some(&admin),
            json!({ "postId": pending_id, "feedback": "Needs work" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["status"], "rejected");
    assert!(next_event(&mut rx).is_none());

    let (status, _) = app
        .post("/api/admin/posts/reject", Some(&admin), json!({ "postId": published_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let pushed = next_event(&mut rx).unwrap();
    assert_eq!(pushed["type"], "post_update");
    assert_eq!(pushed["payload"]["postId"], published_id.as_str());
    assert!(pushed["payload"]["post"].is_null());

    let (status, _) = app
        .send(
            "DELETE",
            "/api/admin/posts/delete",
            Some(&admin),
            Some(json!({ "postId": pending_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let pushed = next_event(&mut rx).unwrap();
    assert_eq!(pushed["type"], "post_update");
    assert_eq!(pushed["payload"]["postId"], pending_id.as_str());
    assert!(pushed["payload"]["post"].is_null());
    assert!(next_event(&mut rx).is_none());
}

#[tokio::test]
async fn malformed_ids_and_cursors_are_json_400s() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/posts/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, body) = app.get("/api/reactions/updates?since=yesterday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, body) = app
        .get("/api/reactions/updates?since=2024-05-01T10:00:00Z&after=42", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn post_creation_requires_author_role_and_valid_type() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (regular, _) = app.register("r@x.com", "Reg", false).await;

    let body = json!({ "type": "sermon", "title": "T", "content": "C" });
    let (status, _) = app.post("/api/posts", Some(&regular), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post("/api/posts", Some(&admin), body).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, res) = app
        .post("/api/posts", Some(&admin), json!({ "type": "poem", "title": "T", "content": "C" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["message"], "Invalid post type");
}

#[tokio::test]
async fn only_pending_posts_can_be_edited_by_author() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (author, _) = app.contributor(&admin).await;
    let id = app.published_post(&admin, &author).await;

    let (status, body) = app
        .send("PUT", &format!("/api/posts/{}", id), Some(&author), Some(json!({ "title": "New" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Can only edit pending posts");

    let (status, body) = app
        .send("PUT", "/api/admin/posts/edit", Some(&admin), Some(json!({ "postId": id, "title": "New" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["title"], "New");
    assert_eq!(body["post"]["content"], "Grace upon grace");
}

#[tokio::test]
async fn reactions_are_one_per_user_and_replaceable() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (author, _) = app.contributor(&admin).await;
    let (reader, _) = app.register("r@x.com", "Reader", false).await;
    let post_id = app.published_post(&admin, &author).await;

    let (_conn, mut rx) = app.state.hub.register().await;

    let react = |kind: &str| json!({ "postId": post_id, "reactionType": kind });
    let (status, first) = app.post("/api/reactions", Some(&reader), react("like")).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post("/api/reactions", Some(&reader), react("like")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, replaced) = app.post("/api/reactions", Some(&reader), react("amen")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["reaction"]["id"], first["reaction"]["id"]);

    let (status, _) = app.post("/api/reactions", Some(&reader), react("love")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, counts) = app.get(&format!("/api/reactions/post/{}", post_id), None).await;
    assert_eq!(counts["total"], 1);
    assert_eq!(counts["counts"]["amen"], 1);
    assert_eq!(counts["counts"]["like"], 0);

    let (_, mine) = app.get(&format!("/api/reactions/user/{}", post_id), Some(&reader)).await;
    assert_eq!(mine["reaction"]["reactionType"], "amen");

    let pushed: Value = serde_json::from_str(rx.try_recv().unwrap().as_str()).unwrap();
    assert_eq!(pushed["type"], "reaction_update");
    assert_eq!(pushed["payload"]["postId"], post_id.as_str());

    let (_, updates) = app.get("/api/reactions/updates", None).await;
    assert_eq!(updates.as_array().unwrap().len(), 1);
    assert_eq!(updates[0]["reaction"]["reactionType"], "amen");

    let (status, _) = app
        .send("DELETE", &format!("/api/reactions/{}", post_id), Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send("DELETE", &format!("/api/reactions/{}", post_id), Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, mine) = app.get(&format!("/api/reactions/user/{}", post_id), Some(&reader)).await;
    assert!(mine["reaction"].is_null());
}

#[tokio::test]
async fn reacting_to_unknown_post_is_404() {
    let app = TestApp::new().await;
    let (reader, _) = app.register("r@x.com", "Reader", false).await;
    let (status, _) = app
        .post(
            "/api/reactions",
            Some(&reader),
            json!({ "postId": uuid::Uuid::new_v4(), "reactionType": "heart" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_post_removes_comments_and_reactions() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (author, _) = app.contributor(&admin).await;
    let (reader, _) = app.register("r@x.com", "Reader", false).await;
    let post_id = app.published_post(&admin, &author).await;

    let (status, comment) = app
        .post("/api/comments", Some(&reader), json!({ "postId": post_id, "content": "Amen" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["comment"]["userName"], "Reader");
    app.post("/api/reactions", Some(&reader), json!({ "postId": post_id, "reactionType": "heart" }))
        .await;

    let (_conn, mut rx) = app.state.hub.register().await;
    let (status, _) = app
        .send("DELETE", &format!("/api/posts/{}", post_id), Some(&author), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let pushed = next_event(&mut rx).unwrap();
    assert_eq!(pushed["type"], "post_update");
    assert_eq!(pushed["payload"]["postId"], post_id.as_str());
    assert!(pushed["payload"]["post"].is_null());
    assert!(next_event(&mut rx).is_none());

    let (_, comments) = app.get(&format!("/api/comments/post/{}", post_id), None).await;
    assert_eq!(comments["comments"].as_array().unwrap().len(), 0);
    let (_, counts) = app.get(&format!("/api/reactions/post/{}", post_id), None).await;
    assert_eq!(counts["total"], 0);
}

#[tokio::test]
async fn comments_are_owned_by_their_author() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (author, _) = app.contributor(&admin).await;
    let (reader, _) = app.register("r@x.com", "Reader", false).await;
    let (other, _) = app.register("o@x.com", "Other", false).await;
    let post_id = app.published_post(&admin, &author).await;
    let (_conn, mut rx) = app.state.hub.register().await;

    let (_, created) = app
        .post("/api/comments", Some(&reader), json!({ "postId": post_id, "content": "First" }))
        .await;
    let comment_id = created["comment"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/comments/{}", comment_id);

    let pushed = next_event(&mut rx).unwrap();
    assert_eq!(pushed["type"], "comment_update");
    assert_eq!(pushed["payload"]["postId"], post_id.as_str());
    assert_eq!(pushed["payload"]["comment"]["content"], "First");

    let (status, _) = app
        .send("PUT", &uri, Some(&other), Some(json!({ "content": "Hijack" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(next_event(&mut rx).is_none());

    let (status, edited) = app
        .send("PUT", &uri, Some(&reader), Some(json!({ "content": "Edited" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["comment"]["content"], "Edited");

    let pushed = next_event(&mut rx).unwrap();
    assert_eq!(pushed["type"], "comment_update");
    assert_eq!(pushed["payload"]["comment"]["id"], comment_id.as_str());
    assert_eq!(pushed["payload"]["comment"]["content"], "Edited");

    let (_, found) = app.get("/api/comments/search?q=Edit", None).await;
    assert_eq!(found["comments"].as_array().unwrap().len(), 1);

    let (status, _) = app.send("DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let pushed = next_event(&mut rx).unwrap();
    assert_eq!(pushed["type"], "comment_update");
    assert_eq!(pushed["payload"]["postId"], post_id.as_str());
    assert!(pushed["payload"]["comment"].is_null());
    assert!(next_event(&mut rx).is_none());
}

#[tokio::test]
async fn suspension_takes_effect_on_existing_tokens() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (author, _) = app.contributor(&admin).await;
    let (reader, reader_id) = app.register("r@x.com", "Reader", false).await;
    let post_id = app.published_post(&admin, &author).await;

    let (status, _) = app
        .post("/api/admin/users/suspend", Some(&admin), json!({ "userId": reader_id }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post("/api/comments", Some(&reader), json!({ "postId": post_id, "content": "Hi" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post("/auth/login", None, json!({ "email": "r@x.com", "password": "secret1" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Account is suspended");

    app.post("/api/admin/users/activate", Some(&admin), json!({ "userId": reader_id }))
        .await;
    let (status, _) = app
        .post("/auth/login", None, json!({ "email": "r@x.com", "password": "secret1" }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_reject_non_admins() {
    let app = TestApp::new().await;
    let (regular, _) = app.register("r@x.com", "Reg", false).await;

    let (status, body) = app.get("/api/admin/statistics", Some(&regular)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Insufficient permissions");

    let (status, _) = app.get("/api/admin/statistics", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = app.admin().await;
    let (status, stats) = app.get("/api/admin/statistics", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["stats"]["totalUsers"], 2);
    assert_eq!(stats["stats"]["admins"], 1);
}

#[tokio::test]
async fn contributor_request_flow() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (token, id) = app.register("u@x.com", "U", false).await;

    let (status, _) = app.post("/api/users/request-contributor", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.post("/api/users/request-contributor", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, requests) = app.get("/api/admin/contributor-requests", Some(&admin)).await;
    assert_eq!(requests["requests"][0]["userId"], id.as_str());
    assert_eq!(requests["requests"][0]["userEmail"], "u@x.com");

    app.post(
        "/api/admin/users/reject-contributor",
        Some(&admin),
        json!({ "userId": id, "feedback": "Write more first" }),
    )
    .await;
    let (_, me) = app.get("/api/users/profile", Some(&token)).await;
    assert_eq!(me["user"]["contributorRequestStatus"], "rejected");
    assert_eq!(me["user"]["rejectionFeedback"], "Write more first");

    let (status, _) = app
        .post("/api/admin/users/change-role", Some(&admin), json!({ "userId": id, "newRole": "contributor" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.post("/api/users/request-contributor", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn friend_requests_flow_and_pair_uniqueness() {
    let app = TestApp::new().await;
    let (a, a_id) = app.register("a@x.com", "A", false).await;
    let (b, b_id) = app.register("b@x.com", "B", false).await;

    let (status, _) = app
        .post("/api/users/friend-request", Some(&a), json!({ "userId": a_id }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/users/friend-request", Some(&a), json!({ "userId": b_id }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post("/api/users/friend-request", Some(&b), json!({ "userId": a_id }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, lists) = app.get("/api/users/friends", Some(&b)).await;
    assert_eq!(lists["requests"][0]["id"], a_id.as_str());
    let (_, lists) = app.get("/api/users/friends", Some(&a)).await;
    assert_eq!(lists["sentRequests"][0]["id"], b_id.as_str());

    let (status, _) = app
        .post("/api/users/friend-request/accept", Some(&a), json!({ "requestId": b_id }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post("/api/users/friend-request/accept", Some(&b), json!({ "requestId": a_id }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, lists) = app.get("/api/users/friends", Some(&a)).await;
    assert_eq!(lists["friends"][0]["id"], b_id.as_str());

    let (_, discover) = app.get("/api/users/discover", Some(&a)).await;
    assert_eq!(discover["users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn social_handles_can_be_set_one_at_a_time() {
    let app = TestApp::new().await;
    let (token, _) = app.register("a@x.com", "A", false).await;

    let (status, body) = app
        .send("PUT", "/api/users/profile/instagram", Some(&token), Some(json!({ "instagram": "@a" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["instagram"], "@a");

    let (status, _) = app
        .send("PUT", "/api/users/profile/myspace", Some(&token), Some(json!({ "value": "a" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(
            "PUT",
            "/api/users/profile",
            Some(&token),
            Some(json!({ "displayName": "Ada", "tiktok": "@ada" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["displayName"], "Ada");
    assert_eq!(body["user"]["instagram"], "@a");
    assert_eq!(body["user"]["tiktok"], "@ada");
}

#[tokio::test]
async fn admin_can_delete_user_with_content() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (author, author_id) = app.contributor(&admin).await;
    let post_id = app.published_post(&admin, &author).await;

    let (status, _) = app
        .send("DELETE", &format!("/api/admin/users/{}", author_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/posts/{}", post_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/auth/me", Some(&author)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
