#![allow(clippy::unwrap_used, clippy::expect_used, clippy::use_debug)]

//! `HyperTransport` against a local HTTP server.

use httpmock::prelude::*;
use netcore::{
    CachePolicy, JsonValue, MultipartForm, NetworkError, NetworkRequest, NetworkService,
    RequestBody, ResilientExecutor, StaticHost, TransportErrorKind, UserAgentMiddleware,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize, PartialEq)]
struct TestResponse {
    id: i64,
    name: String,
}

struct Call {
    method: http::Method,
    path: &'static str,
    query: Vec<(String, String)>,
    body: RequestBody,
    cache_policy: CachePolicy,
}

impl Call {
    fn get(path: &'static str) -> Self {
        Self {
            method: http::Method::GET,
            path,
            query: Vec::new(),
            body: RequestBody::None,
            cache_policy: CachePolicy::default(),
        }
    }
}

impl NetworkRequest for Call {
    type Response = TestResponse;

    fn path(&self) -> String {
        self.path.to_owned()
    }

    fn method(&self) -> http::Method {
        self.method.clone()
    }

    fn query_items(&self) -> Vec<(String, String)> {
        self.query.clone()
    }

    fn body(&self) -> RequestBody {
        self.body.clone()
    }

    fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }
}

fn executor(server: &MockServer) -> ResilientExecutor {
    ResilientExecutor::builder(
        StaticHost::parse(server.url("/api")).unwrap(),
        netcore::HyperTransport::new().unwrap(),
    )
    .retry_delay(Duration::from_millis(5))
    .middleware(UserAgentMiddleware::try_new("netcore-tests/1.0").unwrap())
    .build()
}

#[tokio::test]
async fn get_with_query_decodes_json() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(GET)
            .path("/api/user")
            .query_param("id", "123")
            .header("user-agent", "netcore-tests/1.0");
        then.status(200).json_body(json!({"id": 123, "name": "Jerry"}));
    });

    let mut call = Call::get("/user");
    call.query = vec![("id".to_owned(), "123".to_owned())];
    let response = executor(&server).fetch(&call).await.unwrap();

    m.assert();
    assert_eq!(
        response,
        TestResponse {
            id: 123,
            name: "Jerry".to_owned()
        }
    );
}

#[tokio::test]
async fn post_json_body() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(POST)
            .path("/api/users")
            .header("content-type", "application/json")
            .json_body(json!({"name": "Jerry", "admin": false}));
        then.status(201).json_body(json!({"id": 7, "name": "Jerry"}));
    });

    let call = Call {
        method: http::Method::POST,
        body: RequestBody::Json(JsonValue::object([
            ("name", JsonValue::from("Jerry")),
            ("admin", JsonValue::from(false)),
        ])),
        ..Call::get("users")
    };
    let response = executor(&server).fetch(&call).await.unwrap();

    m.assert();
    assert_eq!(response.id, 7);
}

#[tokio::test]
async fn multipart_upload() {
    let server = MockServer::start();
    let mut form = MultipartForm::with_boundary("test-boundary");
    form.add_field("name", "Test");
    let expected_body = String::from_utf8(form.encode().to_vec()).unwrap();

    let m = server.mock(|when, then| {
        when.method(POST)
            .path("/api/upload")
            .header("content-type", "multipart/form-data; boundary=test-boundary")
            .body(expected_body.as_str());
        then.status(200).json_body(json!({"id": 1, "name": "upload"}));
    });

    let call = Call {
        method: http::Method::POST,
        body: RequestBody::Multipart(form),
        ..Call::get("/upload")
    };
    executor(&server).fetch(&call).await.unwrap();

    m.assert();
}

#[tokio::test]
async fn reload_policy_sends_no_cache() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(GET)
            .path("/api/fresh")
            .header("cache-control", "no-cache");
        then.status(200).json_body(json!({"id": 1, "name": "fresh"}));
    });

    let call = Call {
        cache_policy: CachePolicy::ReloadIgnoringCacheData,
        ..Call::get("/fresh")
    };
    executor(&server).fetch(&call).await.unwrap();

    m.assert();
}

#[tokio::test]
async fn server_error_is_retried_until_exhausted() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(GET).path("/api/flaky");
        then.status(503).body("unavailable");
    });

    let err = executor(&server)
        .fetch(&Call::get("/flaky"))
        .await
        .unwrap_err();

    assert_eq!(m.hits(), 4);
    match err {
        NetworkError::ServerError { status, body } => {
            assert_eq!(status, http::StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(&body[..], b"unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(GET).path("/api/missing");
        then.status(404).json_body(json!({"error": "not found"}));
    });

    let err = executor(&server)
        .fetch(&Call::get("/missing"))
        .await
        .unwrap_err();

    m.assert();
    assert_eq!(err.status(), Some(http::StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn refused_connection_is_not_connected() {
    // bind then drop to obtain a port nothing listens on
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let executor = ResilientExecutor::builder(
        StaticHost::parse(format!("http://127.0.0.1:{port}")).unwrap(),
        netcore::HyperTransport::new().unwrap(),
    )
    .max_retries(1)
    .retry_delay(Duration::from_millis(1))
    .build();

    let err = executor.fetch(&Call::get("/x")).await.unwrap_err();

    match err {
        NetworkError::Transport(t) => assert_eq!(t.kind(), TransportErrorKind::NotConnected),
        other => panic!("unexpected error: {other:?}"),
    }
}
