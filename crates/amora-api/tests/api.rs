// Router-level tests: every request carries its own bearer token, so test
// cases share no client state.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use amora_api::{AppState, AppStateInner, auth, router};
use amora_db::Database;

const SECRET: &str = "test-secret";

fn setup() -> (Router, AppState) {
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.to_string(),
        token_days: 1,
    });
    (router(state.clone()), state)
}

/// Insert a user directly and mint a token, skipping password hashing.
fn seed_user(state: &AppState, username: &str) -> String {
    let id = Uuid::new_v4();
    state.db.create_user(&id.to_string(), username, "unused").unwrap();
    auth::create_token(SECRET, 1, id, username).unwrap()
}

async fn call(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_string(&v).unwrap())
        }
        None => Body::empty(),
    };

    let resp = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}

async fn send(router: &Router, token: &str, recipient: &str, content: &str) -> (StatusCode, Value) {
    let (status, _, body) = call(
        router,
        "POST",
        "/api/messages",
        Some(token),
        Some(json!({ "recipient_username": recipient, "content": content })),
    )
    .await;
    (status, body)
}

fn usernames(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap().to_string())
        .collect()
}

// ── Auth ──

#[tokio::test]
async fn register_then_login() {
    let (r, _) = setup();

    let creds = json!({ "username": "Karen", "password": "Pa$$w0rd" });
    let (s, _, body) = call(&r, "POST", "/auth/register", None, Some(creds.clone())).await;
    assert_eq!(s, StatusCode::CREATED);
    assert_eq!(body["username"], "karen");

    let (s, _, _) = call(&r, "POST", "/auth/register", None, Some(creds.clone())).await;
    assert_eq!(s, StatusCode::CONFLICT);

    let (s, _, body) = call(&r, "POST", "/auth/login", None, Some(creds)).await;
    assert_eq!(s, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (s, _, _) = call(&r, "GET", "/api/likes", Some(&token), None).await;
    assert_eq!(s, StatusCode::OK);

    let wrong = json!({ "username": "karen", "password": "not-the-password" });
    let (s, _, _) = call(&r, "POST", "/auth/login", None, Some(wrong)).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_rejects_short_password() {
    let (r, _) = setup();
    let creds = json!({ "username": "lisa", "password": "short" });
    let (s, _, body) = call(&r, "POST", "/auth/register", None, Some(creds)).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_conflict_instead_of_failing() {
    let (r, _) = setup();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let r = r.clone();
            tokio::spawn(async move {
                let creds = json!({ "username": "lisa", "password": "Pa$$w0rd" });
                call(&r, "POST", "/auth/register", None, Some(creds)).await.0
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap());
    }

    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    assert_eq!(created, 1, "statuses: {:?}", statuses);
    assert!(
        statuses
            .iter()
            .all(|s| *s == StatusCode::CREATED || *s == StatusCode::CONFLICT),
        "statuses: {:?}",
        statuses
    );
}

#[tokio::test]
async fn malformed_auth_body_is_bad_request() {
    let (r, _) = setup();

    let (s, _, body) =
        call(&r, "POST", "/auth/login", None, Some(json!({ "username": "karen" }))).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let (r, state) = setup();
    seed_user(&state, "lisa");

    let (s, _, _) = call(&r, "GET", "/api/messages", None, None).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);

    let (s, _, _) = call(&r, "POST", "/api/likes/lisa", Some("garbage"), None).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);

    let forged = auth::create_token("other-secret", 1, Uuid::new_v4(), "lisa").unwrap();
    let (s, _, _) = call(&r, "GET", "/api/likes", Some(&forged), None).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);

    let (s, _, body) = call(&r, "GET", "/health", None, None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

// ── Likes ──

#[tokio::test]
async fn add_like_unknown_user_is_not_found() {
    let (r, state) = setup();
    let karen = seed_user(&state, "karen");

    let (s, _, _) = call(&r, "POST", "/api/likes/cr7", Some(&karen), None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn self_and_repeated_likes_are_bad_requests() {
    let (r, state) = setup();
    let ruthie = seed_user(&state, "ruthie");
    seed_user(&state, "skinner");

    let (s, _, _) = call(&r, "POST", "/api/likes/ruthie", Some(&ruthie), None).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);

    let (s, _, body) = call(&r, "POST", "/api/likes/skinner", Some(&ruthie), None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["target_username"], "skinner");

    let (s, _, _) = call(&r, "POST", "/api/likes/skinner", Some(&ruthie), None).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn first_like_is_ok() {
    let (r, state) = setup();
    let lisa = seed_user(&state, "lisa");
    seed_user(&state, "margo");

    let (s, _, _) = call(&r, "POST", "/api/likes/margo", Some(&lisa), None).await;
    assert_eq!(s, StatusCode::OK);
}

#[tokio::test]
async fn likes_listing_by_predicate() {
    let (r, state) = setup();
    let skinner = seed_user(&state, "skinner");
    let ruthie = seed_user(&state, "ruthie");
    let lisa = seed_user(&state, "lisa");

    call(&r, "POST", "/api/likes/skinner", Some(&ruthie), None).await;
    call(&r, "POST", "/api/likes/skinner", Some(&lisa), None).await;
    call(&r, "POST", "/api/likes/lisa", Some(&skinner), None).await;

    let (s, headers, body) =
        call(&r, "GET", "/api/likes?predicate=likedBy", Some(&skinner), None).await;
    assert_eq!(s, StatusCode::OK);
    let mut names = usernames(&body);
    names.sort();
    assert_eq!(names, vec!["lisa", "ruthie"]);

    let pagination: Value =
        serde_json::from_str(headers["pagination"].to_str().unwrap()).unwrap();
    assert_eq!(pagination["total_items"], 2);
    assert_eq!(pagination["current_page"], 1);

    // No predicate falls back to the caller's own likes.
    let (_, _, body) = call(&r, "GET", "/api/likes", Some(&skinner), None).await;
    assert_eq!(usernames(&body), vec!["lisa"]);

    // Unknown predicates do too.
    let (s, _, body) = call(&r, "GET", "/api/likes?predicated=likedBy", Some(&skinner), None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(usernames(&body), vec!["lisa"]);

    let (_, _, body) = call(&r, "GET", "/api/likes?predicate=matched", Some(&lisa), None).await;
    assert_eq!(usernames(&body), vec!["skinner"]);
    let (_, _, body) = call(&r, "GET", "/api/likes?predicate=matched", Some(&skinner), None).await;
    assert_eq!(usernames(&body), vec!["lisa"]);
    let (_, _, body) = call(&r, "GET", "/api/likes?predicate=matched", Some(&ruthie), None).await;
    assert!(usernames(&body).is_empty());
}

// ── Messages ──

#[tokio::test]
async fn create_message_failure_kinds() {
    let (r, state) = setup();
    let davis = seed_user(&state, "davis");
    let lisa = seed_user(&state, "lisa");

    let (s, _) = send(&r, &davis, "davis", "same recipient as sender").await;
    assert_eq!(s, StatusCode::BAD_REQUEST);

    let (s, _) = send(&r, &lisa, "bob", "No Bob").await;
    assert_eq!(s, StatusCode::NOT_FOUND);

    let (s, _) = send(&r, &lisa, "davis", "").await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_message_body_is_bad_request() {
    let (r, state) = setup();
    let davis = seed_user(&state, "davis");
    seed_user(&state, "karen");

    let missing_content = json!({ "recipient_username": "karen" });
    let (s, _, body) = call(&r, "POST", "/api/messages", Some(&davis), Some(missing_content)).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("content"));

    let pascal_case = json!({ "RecipientUsername": "karen", "Content": "hi" });
    let (s, _, body) = call(&r, "POST", "/api/messages", Some(&davis), Some(pascal_case)).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("RecipientUsername"));

    // Nothing was stored.
    let (_, _, body) = call(&r, "GET", "/api/messages?container=Outbox", Some(&davis), None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn create_message_returns_structured_record() {
    let (r, state) = setup();
    let davis = seed_user(&state, "davis");
    seed_user(&state, "karen");

    let (s, body) = send(&r, &davis, "karen", "Good message").await;
    assert_eq!(s, StatusCode::OK);
    assert!(body["id"].as_str().unwrap().parse::<Uuid>().is_ok());
    assert_eq!(body["sender_username"], "davis");
    assert_eq!(body["recipient_username"], "karen");
    assert_eq!(body["content"], "Good message");
    assert!(body["date_read"].is_null());
}

#[tokio::test]
async fn containers_default_to_unread() {
    let (r, state) = setup();
    let mayo = seed_user(&state, "mayo");
    let karen = seed_user(&state, "karen");
    seed_user(&state, "ruthie");

    send(&r, &mayo, "karen", "one").await;
    send(&r, &mayo, "ruthie", "two").await;

    let (s, headers, body) = call(&r, "GET", "/api/messages", Some(&karen), None).await;
    assert_eq!(s, StatusCode::OK);
    assert!(headers.contains_key("pagination"));
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (s, _, body) = call(&r, "GET", "/api/messages?container=Outbox", Some(&mayo), None).await;
    assert_eq!(s, StatusCode::OK);
    let outbox = body.as_array().unwrap();
    assert_eq!(outbox.len(), 2);
    assert_eq!(outbox[0]["content"], "two");

    let (_, _, body) = call(&r, "GET", "/api/messages?container=Inbox", Some(&mayo), None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (_, _, body) =
        call(&r, "GET", "/api/messages?container=Outbox&page_size=1&page_number=2", Some(&mayo), None)
            .await;
    assert_eq!(body.as_array().unwrap()[0]["content"], "one");
}

#[tokio::test]
async fn thread_is_chronological_and_marks_read() {
    let (r, state) = setup();
    let mayo = seed_user(&state, "mayo");
    let ruthie = seed_user(&state, "ruthie");

    send(&r, &mayo, "ruthie", "hi ruthie").await;
    send(&r, &ruthie, "mayo", "hi mayo").await;

    let (s, _, body) = call(&r, "GET", "/api/messages/thread/ruthie", Some(&mayo), None).await;
    assert_eq!(s, StatusCode::OK);
    let thread = body.as_array().unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0]["content"], "hi ruthie");
    assert_eq!(thread[1]["content"], "hi mayo");
    assert!(thread[1]["date_read"].is_string());

    // Mayo read ruthie's message; mayo's own message is still unread by ruthie.
    let (_, _, body) = call(&r, "GET", "/api/messages", Some(&mayo), None).await;
    assert!(body.as_array().unwrap().is_empty());
    let (_, _, body) = call(&r, "GET", "/api/messages", Some(&ruthie), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_by_non_participant_is_unauthorized() {
    let (r, state) = setup();
    let karen = seed_user(&state, "karen");
    seed_user(&state, "davis");
    let ruthie = seed_user(&state, "ruthie");

    let (_, body) = send(&r, &karen, "davis", "Hola").await;
    let uri = format!("/api/messages/{}", body["id"].as_str().unwrap());

    let (s, _, _) = call(&r, "DELETE", &uri, Some(&ruthie), None).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);

    let (s, _, _) = call(&r, "DELETE", "/api/messages/not-an-id", Some(&karen), None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_by_both_parties_removes_message() {
    let (r, state) = setup();
    let davis = seed_user(&state, "davis");
    let karen = seed_user(&state, "karen");

    let (_, body) = send(&r, &davis, "karen", "Good message").await;
    let uri = format!("/api/messages/{}", body["id"].as_str().unwrap());

    let (s, _, body) = call(&r, "DELETE", &uri, Some(&davis), None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["purged"], false);

    // Half-deleted: gone for davis, still there for karen.
    let (_, _, body) = call(&r, "GET", "/api/messages/thread/karen", Some(&davis), None).await;
    assert!(body.as_array().unwrap().is_empty());
    let (_, _, body) = call(&r, "GET", "/api/messages?container=Inbox", Some(&karen), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (s, _, body) = call(&r, "DELETE", &uri, Some(&karen), None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["purged"], true);

    let (_, _, body) = call(&r, "GET", "/api/messages/thread/davis", Some(&karen), None).await;
    assert!(body.as_array().unwrap().is_empty());
    let (_, _, body) = call(&r, "GET", "/api/messages?container=Outbox", Some(&davis), None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (s, _, _) = call(&r, "DELETE", &uri, Some(&karen), None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
}
