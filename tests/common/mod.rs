//! Shared harness for router-level tests: in-memory SQLite, in-process
//! cache and a recording image host.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use contacts_api::{
    cache::MemoryCache,
    db,
    image_host::{ImageHost, UploadedImage},
    server::build_router,
    ApiResult, AppContext, ServerConfig,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Records every upload and hands back a predictable URL
#[derive(Default)]
pub struct FakeImageHost {
    pub uploads: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl ImageHost for FakeImageHost {
    async fn upload(&self, bytes: Vec<u8>, public_id: &str) -> ApiResult<UploadedImage> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((public_id.to_string(), bytes.len()));
        let version = uploads.len() as u64;

        Ok(UploadedImage {
            url: format!("https://images.test/c_fill,h_250,w_250/v{}/{}", version, public_id),
            version,
        })
    }
}

pub struct TestApp {
    pub ctx: AppContext,
    pub router: Router,
    pub cache: Arc<MemoryCache>,
    pub images: Arc<FakeImageHost>,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(ServerConfig::for_tests()).await
}

pub async fn spawn_app_with(config: ServerConfig) -> TestApp {
    let pool = db::create_pool(&config.database).await.unwrap();
    db::run_migrations(&pool).await.unwrap();

    let cache = Arc::new(MemoryCache::new());
    let images = Arc::new(FakeImageHost::default());
    let ctx = AppContext::assemble(config, pool, cache.clone(), images.clone()).unwrap();
    let router = build_router(ctx.clone());

    TestApp {
        ctx,
        router,
        cache,
        images,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(build(Method::GET, uri, token, None)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(build(Method::DELETE, uri, token, None)).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(build(Method::POST, uri, token, Some(body))).await
    }

    pub async fn put_json(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(build(Method::PUT, uri, token, Some(body))).await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        let form = format!("username={}&password={}", encode(email), encode(password));
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        self.send(request).await
    }

    pub async fn signup(&self, username: &str, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/api/users/signup",
            None,
            serde_json::json!({ "username": username, "email": email, "password": password }),
        )
        .await
    }

    /// Sign up, confirm and log in; returns (access, refresh)
    pub async fn register(&self, username: &str, email: &str) -> (String, String) {
        let created = self.signup(username, email, "password123").await;
        assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);

        let token = self.ctx.tokens().issue_email(email).unwrap();
        let confirmed = self
            .get(&format!("/api/auth/confirmed_email/{}", token), None)
            .await;
        assert_eq!(confirmed.status, StatusCode::OK);

        let login = self.login(email, "password123").await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);
        (
            login.body["access_token"].as_str().unwrap().to_string(),
            login.body["refresh_token"].as_str().unwrap().to_string(),
        )
    }
}

/// Form-encode the handful of characters test inputs use
fn encode(value: &str) -> String {
    value.replace('%', "%25").replace('@', "%40").replace('+', "%2B").replace('&', "%26")
}

pub fn build(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn contact_body(first: &str, email: &str, birthday: &str) -> Value {
    serde_json::json!({
        "first_name": first,
        "last_name": "Rogers",
        "email": email,
        "phone": "555-0142",
        "birthday": birthday,
        "additional_data": "met at the gym"
    })
}
