//! In-process fake marketplace backend for adapter tests.
//!
//! Serves canned responses for every route the client uses, bound to an
//! ephemeral localhost port, and records what it received.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use serde::Deserialize;
use serde_json::{Value, json};

pub const TOKEN: &str = "test-token";

/// `GET /chat/messages` for this product answers 503.
pub const FAULTY_PRODUCT: i64 = 500;
/// `GET /chat/messages` for this product answers after 3 seconds.
pub const SLOW_PRODUCT: i64 = 999;
/// `GET /offers/requests` for this user answers with a non-JSON body.
pub const GARBAGE_USER: i64 = 666;

#[derive(Default)]
pub struct Recorded {
    pub requests: usize,
    pub fields: HashMap<String, String>,
    pub upload: Option<(String, Vec<u8>)>,
    pub offers: Vec<Value>,
    pub approved: Vec<i64>,
    pub declined: Vec<i64>,
    pub image_hits: usize,
}

type Shared = Arc<Mutex<Recorded>>;

pub struct TestServer {
    pub base_url: String,
    pub image_base_url: String,
    pub recorded: Shared,
}

pub async fn spawn() -> TestServer {
    let recorded: Shared = Arc::default();

    let api = Router::new()
        .route("/chat/session", get(session))
        .route("/chat/max-session", get(max_session))
        .route("/chat/messages", get(messages).post(post_message))
        .route("/offers", post(post_offer))
        .route("/offers/requests", get(requests))
        .route("/offers/requests/{id}/approve", post(approve))
        .route("/offers/requests/{id}/decline", post(decline))
        .route("/realtime/subscribe", get(subscribe))
        .route_layer(middleware::from_fn_with_state(recorded.clone(), require_token))
        .with_state(recorded.clone());

    let images = Router::new()
        .route("/{*path}", get(image))
        .with_state(recorded.clone());

    let app = Router::new().nest("/api", api).nest("/images", images);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}/api"),
        image_base_url: format!("http://{addr}/images"),
        recorded,
    }
}

async fn require_token(State(recorded): State<Shared>, request: Request, next: Next) -> Response {
    recorded.lock().unwrap().requests += 1;
    let expected = format!("Bearer {TOKEN}");
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "invalid token"}))).into_response();
    }
    next.run(request).await
}

#[derive(Deserialize)]
struct ConversationQuery {
    product_id: i64,
    sender_id: i64,
    receiver_id: i64,
}

fn wire(id: i64, sender_id: i64, receiver_id: i64, product_id: i64, message: &str) -> Value {
    json!({
        "id": id,
        "session": 41,
        "sender_id": sender_id,
        "receiver_id": receiver_id,
        "product_id": product_id,
        "message": message,
        "created_at": format!("2024-05-01T10:00:{:02}Z", id % 60),
        "read": 0,
    })
}

async fn session(Query(q): Query<ConversationQuery>) -> Json<Value> {
    if q.product_id == 3 && q.sender_id == 1 && q.receiver_id == 2 {
        Json(json!({"session": 41}))
    } else {
        Json(json!({"session": null}))
    }
}

async fn max_session() -> Json<Value> {
    Json(json!({"maxSession": 99}))
}

async fn messages(Query(q): Query<ConversationQuery>) -> Response {
    match q.product_id {
        FAULTY_PRODUCT => (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response(),
        SLOW_PRODUCT => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!([])).into_response()
        }
        product_id => {
            let mut image = wire(2, q.receiver_id, q.sender_id, product_id, "1714557600_maize.jpg");
            image["read"] = json!(1);
            Json(json!([
                wire(1, q.sender_id, q.receiver_id, product_id, "Is this still available?"),
                image,
            ]))
            .into_response()
        }
    }
}

async fn post_message(State(recorded): State<Shared>, mut multipart: Multipart) -> Json<Value> {
    let mut fields = HashMap::new();
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field.bytes().await.unwrap().to_vec();
                upload = Some((file_name, bytes));
            }
            None => {
                fields.insert(name, field.text().await.unwrap());
            }
        }
    }

    let content = match &upload {
        Some((file_name, _)) => file_name.clone(),
        None => fields.get("message").cloned().unwrap_or_default(),
    };
    let field = |name: &str| fields.get(name).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
    let mut message = wire(100, field("sender_id"), field("receiver_id"), field("product_id"), &content);
    message["session"] = json!(field("session"));

    let mut recorded = recorded.lock().unwrap();
    recorded.fields = fields;
    recorded.upload = upload;
    Json(json!({"message": message}))
}

async fn post_offer(State(recorded): State<Shared>, Json(offer): Json<Value>) -> Response {
    if offer["offer"].as_u64().unwrap_or(0) > 1_000 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Offer exceeds available stock"})),
        )
            .into_response();
    }
    recorded.lock().unwrap().offers.push(offer);
    StatusCode::CREATED.into_response()
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: i64,
}

async fn requests(Query(q): Query<UserQuery>) -> Response {
    if q.user_id == GARBAGE_USER {
        return "<html>oops</html>".into_response();
    }
    let request = |id: i64, requested: u32, stock: &str| {
        json!({
            "id": id,
            "session": 41,
            "product_id": 3,
            "product_title": "Maize",
            "buyer_id": 1,
            "seller_id": q.user_id,
            "requested_quantity": requested,
            "unit": "kg",
            "location": "Nakuru",
            "status": "pending",
            "current_stock": stock,
        })
    };
    Json(json!([request(13, 10, "5 kg"), request(12, 2, "5 kg")])).into_response()
}

async fn approve(State(recorded): State<Shared>, Path(id): Path<i64>) -> Response {
    if id == 13 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "insufficient quantity: requested 10, available 5"})),
        )
            .into_response();
    }
    recorded.lock().unwrap().approved.push(id);
    StatusCode::OK.into_response()
}

async fn decline(State(recorded): State<Shared>, Path(id): Path<i64>) -> StatusCode {
    recorded.lock().unwrap().declined.push(id);
    StatusCode::OK
}

#[derive(Deserialize)]
struct TopicQuery {
    topic: String,
}

/// Four events then end of stream: one for the user, one malformed, one
/// addressed to somebody else, one more for the user.
async fn subscribe(
    Query(q): Query<TopicQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user: i64 = q
        .topic
        .strip_prefix("chat.")
        .and_then(|id| id.parse().ok())
        .unwrap_or(0);

    let events = vec![
        json!({"receiver_id": user, "message": wire(1, 2, user, 3, "hello")}).to_string(),
        "not json".to_string(),
        json!({"receiver_id": user + 1, "message": wire(2, 2, user + 1, 3, "not yours")}).to_string(),
        json!({"receiver_id": user, "message": wire(3, 2, user, 3, "again")}).to_string(),
    ];
    Sse::new(futures_util::stream::iter(
        events
            .into_iter()
            .map(|data| Ok(Event::default().data(data))),
    ))
}

async fn image(State(recorded): State<Shared>, Path(path): Path<String>) -> Response {
    if path.ends_with("missing.jpg") {
        return StatusCode::NOT_FOUND.into_response();
    }
    recorded.lock().unwrap().image_hits += 1;
    format!("image:{path}").into_response()
}
