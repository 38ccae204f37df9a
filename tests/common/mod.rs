//! Shared harness: the full router wired to a scripted backend and a temporary
//! session database.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use elmosyar_web::api::types::User;
use elmosyar_web::api::{ApiClient, ApiRequest, RawResponse, Transport, Verb};
use elmosyar_web::config::Config;
use elmosyar_web::flash::{Flash, FLASH_COOKIE};
use elmosyar_web::state::{AppState, DbPool};
use elmosyar_web::{db, routes, session};

pub const BACKEND: &str = "http://backend.test";

/// One scripted backend answer.
#[derive(Clone)]
pub enum Scripted {
    Json {
        status: u16,
        body: Value,
        set_cookies: Vec<String>,
    },
    Html {
        status: u16,
        body: String,
    },
    /// The request never reaches the server.
    Offline,
}

impl Scripted {
    pub fn ok(body: Value) -> Self {
        Scripted::Json {
            status: 200,
            body,
            set_cookies: Vec::new(),
        }
    }
}

/// Backend stand-in: answers from a per-endpoint queue and records every request.
#[derive(Default)]
pub struct StubBackend {
    scripts: Mutex<HashMap<(Verb, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl StubBackend {
    /// Queue an answer for `verb endpoint`. The last queued answer repeats.
    pub fn script(&self, verb: Verb, endpoint: &str, answer: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry((verb, endpoint.to_string()))
            .or_default()
            .push_back(answer);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.url.trim_start_matches(BACKEND).to_string())
            .collect()
    }

    fn next(&self, verb: Verb, endpoint: &str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(&(verb, endpoint.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn offline_error() -> reqwest::Error {
    reqwest::Client::new()
        .get("not a url")
        .build()
        .expect_err("relative URL must not build")
}

#[async_trait]
impl Transport for StubBackend {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, reqwest::Error> {
        let endpoint = request.url.trim_start_matches(BACKEND).to_string();
        let verb = request.verb;
        self.requests.lock().unwrap().push(request);

        let answer = self.next(verb, &endpoint).unwrap_or_else(|| Scripted::Json {
            status: 404,
            body: serde_json::json!({"success": false, "message": "not scripted"}),
            set_cookies: Vec::new(),
        });

        match answer {
            Scripted::Json {
                status,
                body,
                set_cookies,
            } => Ok(RawResponse {
                status,
                content_type: Some("application/json".into()),
                set_cookies,
                body: Bytes::from(serde_json::to_vec(&body).unwrap()),
            }),
            Scripted::Html { status, body } => Ok(RawResponse {
                status,
                content_type: Some("text/html; charset=utf-8".into()),
                set_cookies: Vec::new(),
                body: Bytes::from(body),
            }),
            Scripted::Offline => Err(offline_error()),
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// `name=value` of a cookie this response sets, attributes stripped.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|c| c.starts_with(&format!("{}=", name)))
            .map(|c| c.split(';').next().unwrap_or("").to_string())
    }

    pub fn flash(&self) -> Option<Flash> {
        let pair = self.cookie(FLASH_COOKIE)?;
        let value = pair.split_once('=')?.1;
        Flash::decode(value)
    }
}

pub struct TestApp {
    pub app: Router,
    pub backend: Arc<StubBackend>,
    pub pool: DbPool,
    pub config: Config,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let pool = db::create_pool(&dir.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();

        let mut config = Config::default();
        config.api.base_url = BACKEND.to_string();
        adjust(&mut config);

        let backend = Arc::new(StubBackend::default());
        let api = ApiClient::new(&config.api, backend.clone());
        let state = AppState::new(pool.clone(), config.clone(), api);

        Self {
            app: routes::app(state),
            backend,
            pool,
            config,
            _dir: dir,
        }
    }

    /// Session cookie for a visitor already signed in as `username`.
    pub fn sign_in(&self, username: &str) -> String {
        let token = session::login(
            &self.pool,
            &User::bare(username),
            &["sessionid=backend-abc; Path=/".to_string()],
            1,
        )
        .unwrap();
        format!("{}={}", self.config.auth.cookie_name, token)
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>) -> TestResponse {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(form.to_string())).unwrap())
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        parts: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> TestResponse {
        let boundary = "elmosyar-test-boundary";
        let mut body = String::new();
        for (name, value) in parts {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            ));
        }
        // An empty file input, as browsers send it.
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"media\"; filename=\"\"\r\nContent-Type: application/octet-stream\r\n\r\n\r\n",
            boundary
        ));
        body.push_str(&format!("--{}--\r\n", boundary));

        let mut request = Request::builder().method("POST").uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        );
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body)).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

/// A minimal post as the backend lists it.
pub fn post_json(id: i64, author: &str, content: &str) -> Value {
    serde_json::json!({
        "id": id,
        "author": author,
        "content": content,
        "created_at": "2024-01-01T10:00:00Z",
        "likes_count": 0,
        "category": "general",
        "tags": [],
        "mentions": [],
        "media": []
    })
}
