//! End-to-end tests for the auth middleware.
//!
//! A wiremock server plays the identity endpoint; requests are driven through an
//! axum Router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Json, Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
    routing::get,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use identity_gate::api::v1::extractors::IdentityCtx;
use identity_gate::middleware::auth::access;
use identity_gate::services::auth::{AuthConfig, AuthPipeline, Identity, ScopeSet};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn identity_endpoint(body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

fn pipeline(server: &MockServer, required: impl Into<ScopeSet>) -> Arc<AuthPipeline> {
    let url = Url::parse(&format!("{}/user", server.uri())).unwrap();
    let config = AuthConfig::new(url)
        .with_required_scopes(required)
        .with_request_timeout(Duration::from_secs(5));
    Arc::new(AuthPipeline::from_config(&config).unwrap())
}

async fn whoami(IdentityCtx(identity): IdentityCtx) -> Json<Identity> {
    Json(identity)
}

fn app(pipeline: Arc<AuthPipeline>) -> Router {
    access::apply(Router::new().route("/", get(whoami)), pipeline)
}

fn get_with(auth: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().uri("/");
    if let Some(auth) = auth {
        req = req.header(header::AUTHORIZATION, auth);
    }
    req.body(Body::empty()).unwrap()
}

async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn first_request_resolves_second_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header_eq("authorization", "Bearer helloworld"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "bob",
            "id": 11,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline(&server, ScopeSet::empty());
    let app = app(pipeline.clone());

    let resp = app.clone().oneshot(get_with(Some("Bearer helloworld"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let first = json_body(resp).await;
    assert_eq!(first["uid"], json!(11));
    assert_eq!(first["login"], json!("bob"));
    assert_eq!(first["access_token"], json!("helloworld"));
    assert_eq!(first["cached"], json!(false));

    let resp = app.oneshot(get_with(Some("Bearer helloworld"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let second = json_body(resp).await;
    assert_eq!(second["uid"], json!(11));
    assert_eq!(second["login"], json!("bob"));
    assert_eq!(second["cached"], json!(true));

    pipeline.close();
}

#[tokio::test]
async fn missing_credential_is_401_with_bearer_challenge() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(0)
        .mount(&server)
        .await;

    let pipeline = pipeline(&server, ScopeSet::empty());
    let resp = app(pipeline.clone()).oneshot(get_with(None)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(json_body(resp).await, json!({"message": "no token"}));

    pipeline.close();
}

#[tokio::test]
async fn malformed_basic_payload_counts_as_missing_credential() {
    let server = identity_endpoint(json!({"id": 1})).await;
    let pipeline = pipeline(&server, ScopeSet::empty());

    let auth = format!("Basic {}", STANDARD.encode("u:T:extra"));
    let resp = app(pipeline.clone()).oneshot(get_with(Some(&auth))).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");

    pipeline.close();
}

#[tokio::test]
async fn basic_secret_is_forwarded_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header_eq("authorization", "Bearer T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline(&server, ScopeSet::empty());
    let auth = format!("Basic {}", STANDARD.encode("u:T"));
    let resp = app(pipeline.clone()).oneshot(get_with(Some(&auth))).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["access_token"], json!("T"));

    pipeline.close();
}

#[tokio::test]
async fn upstream_401_maps_to_401_with_upstream_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
        )
        .mount(&server)
        .await;

    let pipeline = pipeline(&server, ScopeSet::empty());
    let resp = app(pipeline.clone())
        .oneshot(get_with(Some("Bearer revoked")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    assert_eq!(json_body(resp).await, json!({"message": "Bad credentials"}));
    assert!(pipeline.cache().is_empty());

    pipeline.close();
}

#[tokio::test]
async fn unreachable_identity_endpoint_is_401() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = Url::parse(&format!("http://127.0.0.1:{port}/user")).unwrap();
    let config = AuthConfig::new(url).with_request_timeout(Duration::from_secs(2));
    let pipeline = Arc::new(AuthPipeline::from_config(&config).unwrap());

    let resp = app(pipeline.clone()).oneshot(get_with(Some("Bearer tok"))).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    assert_eq!(
        json_body(resp).await,
        json!({"message": "identity endpoint unreachable"})
    );
    assert!(pipeline.cache().is_empty());

    pipeline.close();
}

#[tokio::test]
async fn single_scope_missing_is_403_naming_the_scope() {
    let server = identity_endpoint(json!({"id": 1, "scopes": "read"})).await;
    let pipeline = pipeline(&server, "write");

    let resp = app(pipeline.clone()).oneshot(get_with(Some("Bearer tok"))).await.unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(resp).await, json!({"message": "missing scope write"}));

    pipeline.close();
}

#[tokio::test]
async fn scope_list_containing_requirement_is_200() {
    let server = identity_endpoint(json!({"id": 1, "scopes": ["read", "write"]})).await;
    let pipeline = pipeline(&server, "write");

    let resp = app(pipeline.clone()).oneshot(get_with(Some("Bearer tok"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    pipeline.close();
}

#[tokio::test]
async fn wildcard_scope_satisfies_every_requirement() {
    let server = identity_endpoint(json!({"id": 1, "scopes": "all"})).await;
    let pipeline = pipeline(&server, ScopeSet::from_iter(["A", "B"]));

    let resp = app(pipeline.clone()).oneshot(get_with(Some("Bearer tok"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    pipeline.close();
}

#[tokio::test]
async fn malformed_granted_scopes_are_500() {
    let server = identity_endpoint(json!({"id": 1, "scopes": {"read": true}})).await;
    let pipeline = pipeline(&server, "read");

    let resp = app(pipeline.clone()).oneshot(get_with(Some("Bearer tok"))).await.unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(resp).await, json!({"message": "internal server error"}));

    pipeline.close();
}

#[tokio::test]
async fn handler_mutation_does_not_leak_into_cache() {
    let server = identity_endpoint(json!({"login": "bob", "id": 11})).await;
    let pipeline = pipeline(&server, ScopeSet::empty());

    async fn tamper(Extension(mut identity): Extension<Identity>) -> Json<Identity> {
        identity
            .fields_mut()
            .insert("login".into(), Value::String("mallory".into()));
        Json(identity)
    }

    let app = access::apply(Router::new().route("/", get(tamper)), pipeline.clone());

    // Miss, then hit: both handlers tamper with their own copy.
    for expected_cached in [false, true] {
        let resp = app.clone().oneshot(get_with(Some("Bearer tok"))).await.unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["login"], json!("mallory"));
        assert_eq!(body["cached"], json!(expected_cached));
    }

    let stored = pipeline.cache().get("tok").unwrap();
    assert_eq!(stored.login(), Some("bob"));

    pipeline.close();
}

#[tokio::test]
async fn handler_is_not_called_after_a_failure() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let server = identity_endpoint(json!({"id": 1, "scopes": "read"})).await;
    let pipeline = pipeline(&server, "write");
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let app = access::apply(
        Router::new().route(
            "/",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::OK
                }
            }),
        ),
        pipeline.clone(),
    );

    let resp = app.clone().oneshot(get_with(Some("Bearer tok"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = app.oneshot(get_with(None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    pipeline.close();
}

#[tokio::test]
async fn after_close_nothing_is_cached_and_no_timers_remain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(3)
        .mount(&server)
        .await;

    let pipeline = pipeline(&server, ScopeSet::empty());
    let app = app(pipeline.clone());

    let resp = app.clone().oneshot(get_with(Some("Bearer tok"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(pipeline.cache().pending_timers(), 1);

    pipeline.close();
    assert_eq!(pipeline.cache().pending_timers(), 0);

    for _ in 0..2 {
        let resp = app.clone().oneshot(get_with(Some("Bearer tok"))).await.unwrap();
        assert_eq!(json_body(resp).await["cached"], json!(false));
    }
    assert_eq!(pipeline.cache().pending_timers(), 0);
}
