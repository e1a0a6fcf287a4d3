//! Reddit client behavior against an in-process mock of the OAuth API.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Form, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use threadsync::config::{RedditConfig, RedditCredentials};
use threadsync::models::Comment;
use threadsync::platform::reddit::RedditClient;
use threadsync::platform::{Platform, PlatformError};
use threadsync::thread::build_thread_string;

#[derive(Default)]
struct MockState {
    token_requests: AtomicUsize,
    reject_next_info: AtomicBool,
    morechildren_requests: AtomicUsize,
}

type Shared = Arc<MockState>;

fn comment(id: &str, parent: &str, body: &str, replies: Value) -> Value {
    json!({
        "kind": "t1",
        "data": {
            "id": id,
            "name": format!("t1_{id}"),
            "body": body,
            "author": "someone",
            "parent_id": parent,
            "link_id": "t3_post1",
            "replies": replies,
        }
    })
}

fn listing(children: Vec<Value>) -> Value {
    json!({ "kind": "Listing", "data": { "children": children, "after": null } })
}

fn submission() -> Value {
    json!({
        "kind": "t3",
        "data": {
            "id": "post1",
            "name": "t3_post1",
            "title": "Help with finals",
            "selftext": "Any tips?",
            "author": "asker",
            "url": "https://www.reddit.com/r/PESU/comments/post1/help/",
            "permalink": "/r/PESU/comments/post1/help/",
            "score": 42,
            "upvote_ratio": 0.97,
            "created_utc": 1700000000.0,
            "link_flair_text": "Academics",
            "over_18": false
        }
    })
}

fn root_tree() -> Value {
    comment(
        "abc123",
        "t3_post1",
        "What worked for you?",
        listing(vec![
            comment("r1", "t1_abc123", "Study daily", json!("")),
            json!({
                "kind": "more",
                "data": { "id": "r2", "name": "t1_r2", "parent_id": "t1_abc123", "count": 3, "children": ["r2", "r3"] }
            }),
        ]),
    )
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer tok"))
}

async fn token(
    State(state): State<Shared>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !basic || form.get("grant_type").map(String::as_str) != Some("client_credentials") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let n = state.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "access_token": format!("tok{n}"), "token_type": "bearer", "expires_in": 3600 }))
        .into_response()
}

async fn info(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) || state.reject_next_info.swap(false, Ordering::SeqCst) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let id = query.get("id").cloned().unwrap_or_default();
    let children = match id.as_str() {
        "t3_post1" => vec![submission()],
        "t1_abc123" => vec![root_tree()],
        "t1_r2" => vec![comment("r2", "t1_abc123", "Ask seniors", json!(""))],
        "t1_limited" => {
            return (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "7")]).into_response()
        }
        "t1_gone" => return StatusCode::NOT_FOUND.into_response(),
        _ => vec![],
    };
    Json(listing(children)).into_response()
}

async fn refresh(
    headers: HeaderMap,
    Path(submission_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) || submission_id != "post1" {
        return StatusCode::NOT_FOUND.into_response();
    }
    let focal = match query.get("comment").map(String::as_str) {
        Some("abc123") => root_tree(),
        Some("deep") => comment(
            "deep",
            "t1_r1",
            "Deep body",
            listing(vec![comment("deeper", "t1_deep", "Deeper body", json!(""))]),
        ),
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    Json(json!([listing(vec![submission()]), listing(vec![focal])])).into_response()
}

async fn morechildren(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.morechildren_requests.fetch_add(1, Ordering::SeqCst);
    assert_eq!(query.get("link_id").map(String::as_str), Some("t3_post1"));
    assert_eq!(query.get("children").map(String::as_str), Some("r2,r3"));
    Json(json!({
        "json": {
            "errors": [],
            "data": {
                "things": [
                    comment("r2", "t1_abc123", "Ask seniors", json!("")),
                    comment("r2a", "t1_r2", "Agreed", json!("")),
                    comment("r3", "t1_abc123", "Use flashcards", json!("")),
                ]
            }
        }
    }))
    .into_response()
}

async fn new_comments(headers: HeaderMap, Path(subreddit): Path<String>) -> Response {
    if !authorized(&headers) || subreddit != "PESU" {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(listing(vec![
        comment("c3", "t3_post1", "newest", json!("")),
        comment("c2", "t3_post1", "middle", json!("")),
        comment("c1", "t3_post1", "oldest", json!("")),
    ]))
    .into_response()
}

async fn mock_reddit() -> (SocketAddr, Shared) {
    let state: Shared = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/v1/access_token", post(token))
        .route("/api/info", get(info))
        .route("/api/morechildren", get(morechildren))
        .route("/comments/{submission}", get(refresh))
        .route("/r/{subreddit}/comments", get(new_comments))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn client(addr: SocketAddr) -> RedditClient {
    let config = RedditConfig {
        api_url: format!("http://{addr}"),
        auth_url: format!("http://{addr}/api/v1/access_token"),
        timeout_secs: Some(5),
        ..Default::default()
    };
    let credentials = RedditCredentials {
        client_id: "app".into(),
        client_secret: "secret".into(),
    };
    RedditClient::connect(&config, credentials).await.unwrap()
}

#[tokio::test]
async fn test_connect_authenticates_once() {
    let (addr, state) = mock_reddit().await;
    let client = client(addr).await;
    client.comment("abc123").await.unwrap();
    client.comment("t1_abc123").await.unwrap();
    assert_eq!(state.token_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_submission_lookup() {
    let (addr, _) = mock_reddit().await;
    let client = client(addr).await;
    let root = client.comment("abc123").await.unwrap();

    let sub = client.submission(&root).await.unwrap();
    assert_eq!(sub.id, "post1");
    assert_eq!(sub.title, "Help with finals");
    assert_eq!(sub.selftext, "Any tips?");
    assert_eq!(sub.link_flair_text.as_deref(), Some("Academics"));
    assert_eq!(sub.score, 42);
}

#[tokio::test]
async fn test_parent_walks_to_root() {
    let (addr, _) = mock_reddit().await;
    let client = client(addr).await;
    let reply = client.comment("r2").await.unwrap();
    assert!(!reply.is_root());

    let parent = client.parent(&reply).await.unwrap();
    assert_eq!(parent.id, "abc123");
    assert!(parent.is_root());
}

#[tokio::test]
async fn test_replies_load_more_stubs_into_tree() {
    let (addr, state) = mock_reddit().await;
    let client = client(addr).await;
    let root = client.comment("abc123").await.unwrap();

    let replies = client.replies(&root).await.unwrap();
    let bodies: Vec<&str> = replies.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, vec!["Study daily", "Ask seniors", "Use flashcards"]);
    assert_eq!(replies[1].replies.len(), 1);
    assert_eq!(replies[1].replies[0].body, "Agreed");
    assert_eq!(state.morechildren_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_thread_string_over_live_client() {
    let (addr, _) = mock_reddit().await;
    let client = client(addr).await;
    let root = client.comment("abc123").await.unwrap();

    let rendered = build_thread_string(&client, &root).await;
    assert_eq!(
        rendered,
        "\nWhat worked for you?\n├── Study daily\n├── Ask seniors\n│   └── Agreed\n└── Use flashcards"
    );
}

#[tokio::test]
async fn test_continue_thread_refreshes_comment() {
    let (addr, _) = mock_reddit().await;
    let client = client(addr).await;
    let truncated = Comment {
        id: "deep".into(),
        body: "Deep body".into(),
        parent_id: "t1_r1".into(),
        link_id: "t3_post1".into(),
        replies_truncated: true,
        ..Default::default()
    };

    let replies = client.replies(&truncated).await.unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].id, "deeper");
}

#[tokio::test]
async fn test_rejected_token_is_renewed_once() {
    let (addr, state) = mock_reddit().await;
    let client = client(addr).await;
    state.reject_next_info.store(true, Ordering::SeqCst);

    let root = client.comment("abc123").await.unwrap();
    assert_eq!(root.id, "abc123");
    assert_eq!(state.token_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_error_mapping() {
    let (addr, _) = mock_reddit().await;
    let client = client(addr).await;

    match client.comment("limited").await {
        Err(PlatformError::RateLimited { retry_after }) => {
            assert_eq!(retry_after, Some(Duration::from_secs(7)))
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
    assert!(matches!(
        client.comment("gone").await,
        Err(PlatformError::NotFound(_))
    ));
    assert!(matches!(
        client.comment("missing").await,
        Err(PlatformError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_new_comments_keep_listing_order() {
    let (addr, _) = mock_reddit().await;
    let client = client(addr).await;
    let comments = client.new_comments("PESU", 100).await.unwrap();
    let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c3", "c2", "c1"]);
}

#[tokio::test]
async fn test_bad_credentials_fail_connect() {
    let (addr, _) = mock_reddit().await;
    let config = RedditConfig {
        api_url: format!("http://{addr}"),
        // token endpoint that rejects everything
        auth_url: format!("http://{addr}/api/info"),
        ..Default::default()
    };
    let credentials = RedditCredentials {
        client_id: "app".into(),
        client_secret: "wrong".into(),
    };
    assert!(RedditClient::connect(&config, credentials).await.is_err());
}
