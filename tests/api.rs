#![cfg(feature = "api")]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use graph_config::api::{self, AppState};

fn app() -> Router {
    api::routes::<AppState>().with_state(AppState::in_memory())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request should build");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be json")
    };
    (status, value)
}

#[tokio::test]
async fn save_then_fetch_latest_configuration() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/get-config/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "No configurations found");

    let configuration = json!({
        "nodes": [{"id": "A", "type": "input"}, {"id": "B"}, {"id": "C"}],
        "edges": [
            {"id": "e1", "source": "A", "target": "B"},
            {"id": "e2", "source": "A", "target": "C"}
        ]
    });
    let (status, body) = send(
        &app,
        Method::POST,
        "/save-config/",
        Some(json!({"name": "cfg1", "configuration": configuration})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "Graph configuration validated and stored successfully."
    );
    assert_eq!(body["is_acyclic"], true);

    let cyclic = json!({
        "nodes": [{"id": "A"}],
        "edges": [{"source": "A", "target": "A"}]
    });
    let (status, _) = send(
        &app,
        Method::POST,
        "/save-config/",
        Some(json!({"name": "cfg2", "configuration": cyclic})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/get-config/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "cfg2");
    assert_eq!(body["is_acyclic"], false);
    assert_eq!(body["configuration"], cyclic);
    assert!(body["id"].is_i64());
    assert!(body["created_at"].is_string());
}

#[tokio::test]
async fn duplicate_nodes_are_a_client_error() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/save-config/",
        Some(json!({
            "name": "dupes",
            "configuration": {"nodes": [{"id": 1}, {"id": 1}], "edges": []}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "duplicate_node");
    assert_eq!(body["error"]["message"], "Graph nodes are not unique.");

    let (status, _) = send(&app, Method::GET, "/get-config/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unreadable_bodies_are_json_client_errors() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/save-config/", Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "malformed_configuration");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/save-config/")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("{}"))
        .expect("request should build");
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/register/",
        Some(json!({"email": "ada@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");

    let (status, body) = send(&app, Method::POST, "/login/update-profile/", Some(json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn array_shaped_documents_are_not_stored() {
    let app = app();

    for configuration in [
        json!([[{"id": 1}], []]),
        json!({"nodes": [[1]], "edges": [[1, 1]]}),
    ] {
        let (status, body) = send(
            &app,
            Method::POST,
            "/save-config/",
            Some(json!({"name": "arrays", "configuration": configuration})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "malformed_configuration");
    }

    let (status, _) = send(&app, Method::GET, "/get-config/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_login_and_list_users() {
    let app = app();

    let (status, _) = send(&app, Method::GET, "/data/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        "/register/",
        Some(json!({
            "email": "ada@example.com",
            "password": "pw",
            "birthdate": "1815-12-10"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["birthdate"], "1815-12-10");
    let user_id = body["user_id"].clone();

    let (status, body) = send(
        &app,
        Method::POST,
        "/register/",
        Some(json!({"email": "ada@example.com", "password": "bad"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["error"]["message"],
        "Incorrect password for existing account"
    );

    let (status, body) = send(
        &app,
        Method::POST,
        "/login/update-profile/",
        Some(json!({"email": "ada@example.com", "password": "pw", "about": "analyst"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful and profile updated");
    assert_eq!(body["user_id"], user_id);

    let (status, body) = send(&app, Method::GET, "/data/", None).await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().expect("user list");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["about"], "analyst");
    assert!(users[0].get("password_hash").is_none());
}

#[tokio::test]
async fn health_check_responds() {
    let (status, body) = send(&app(), Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}
