use crate::store::{ArtifactStore, StoreError};
use crate::summarizer::{FailureClass, Summarizer};
use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PREVIEW_CHARS: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub summarizer: Arc<dyn Summarizer>,
    pub store: ArtifactStore,
    pub max_text_length: usize,
    pub persist_summaries: bool,
    pub client_api_key: Option<String>,
}

pub fn routes(state: AppState) -> Router {
    let state = Arc::new(state);

    let protected = Router::new()
        .route("/summarize", post(summarize))
        .route("/download/:filename", get(download))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .merge(protected)
        .route("/ping", get(ping))
        .with_state(state)
}

// -------------------------------------------------------------------
// Summaries

async fn summarize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::bad_request("invalid_body", e.body_text()))?;
    let text = payload.text;

    if text.trim().is_empty() {
        return Err(ApiError::bad_request("text_empty", "text must not be empty"));
    }
    let length = text.chars().count();
    if length > state.max_text_length {
        return Err(ApiError::bad_request(
            "text_too_long",
            format!("text is {length} characters; the limit is {}", state.max_text_length),
        ));
    }

    tracing::info!(chars = length, preview = %preview(&text), "received text to summarize");

    let summary = state.summarizer.summarize(&text).await.map_err(|e| {
        tracing::error!(error = %e, class = ?e.class(), "summarization failed");
        match e.class() {
            FailureClass::RateLimit => ApiError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "summary provider is rate limiting requests, try again later",
            ),
            FailureClass::Transient => ApiError::new(
                StatusCode::BAD_GATEWAY,
                "provider_unavailable",
                "summary provider is unavailable, try again later",
            ),
            FailureClass::Fatal => ApiError::new(
                StatusCode::BAD_GATEWAY,
                "provider_error",
                "summary provider could not produce a summary",
            ),
        }
    })?;

    let filename = if state.persist_summaries {
        let name = state.store.save(&summary).await.map_err(|e| {
            tracing::error!(error = %e, "failed to persist summary");
            ApiError::internal("failed to store summary")
        })?;
        Some(name)
    } else {
        None
    };

    Ok(Json(SummarizeResponse { summary, filename }))
}

async fn download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    match state.store.load(&filename).await {
        Ok(content) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            content,
        )
            .into_response()),
        Err(StoreError::NotFound) => {
            Err(ApiError::not_found("summary_not_found", "summary file not found"))
        }
        Err(e) => {
            tracing::error!(error = %e, %filename, "failed to read summary");
            Err(ApiError::internal("failed to read summary"))
        }
    }
}

// -------------------------------------------------------------------
// Misc

async fn ping() -> Json<PingResponse> {
    Json(PingResponse { message: "pong" })
}

async fn require_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.client_api_key.as_deref() {
        let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
        if presented != Some(expected) {
            tracing::warn!(path = %request.uri().path(), "rejected request with missing or invalid API key");
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid_api_key", "Invalid API Key"));
        }
    }
    Ok(next.run(request).await)
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().nth(PREVIEW_CHARS).is_some() {
        out.push_str("...");
    }
    out
}

// -------------------------------------------------------------------
// Shared helpers & DTOs

#[derive(Deserialize)]
struct SummarizeRequest {
    text: String,
}

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
}

#[derive(Serialize)]
struct PingResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }
    fn bad_request(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, msg)
    }
    fn not_found(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, msg)
    }
    fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody { code: self.code, message: self.message });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::SummarizeError;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tower::ServiceExt;

    enum Reply {
        Summary(&'static str),
        Fail(fn() -> SummarizeError),
    }

    struct FakeSummarizer {
        reply: Reply,
        calls: AtomicUsize,
        last_input: Mutex<Option<String>>,
    }

    impl FakeSummarizer {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self { reply, calls: AtomicUsize::new(0), last_input: Mutex::new(None) })
        }
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Summarizer for FakeSummarizer {
        async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_input.lock().unwrap() = Some(text.to_string());
            match &self.reply {
                Reply::Summary(s) => Ok(s.to_string()),
                Reply::Fail(make) => Err(make()),
            }
        }
    }

    struct Harness {
        app: Router,
        fake: Arc<FakeSummarizer>,
        store: ArtifactStore,
        _tmp: TempDir,
    }

    fn harness(reply: Reply, persist: bool, api_key: Option<&str>) -> Harness {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path().join("summaries"));
        let fake = FakeSummarizer::new(reply);
        let app = routes(AppState {
            summarizer: fake.clone(),
            store: store.clone(),
            max_text_length: 10_000,
            persist_summaries: persist,
            client_api_key: api_key.map(str::to_string),
        });
        Harness { app, fake, store, _tmp: tmp }
    }

    fn post_json(uri: &str, body: Value) -> HttpRequest<Body> {
        HttpRequest::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, req: HttpRequest<Body>) -> (StatusCode, Vec<u8>) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, req: HttpRequest<Body>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn ping_returns_pong() {
        let h = harness(Reply::Summary("unused"), false, Some("secret"));
        let (status, body) = send(&h.app, HttpRequest::get("/ping").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, br#"{"message":"pong"}"#);
    }

    #[tokio::test]
    async fn summarize_returns_summary_and_persists_it() {
        let h = harness(Reply::Summary("FastAPI builds Python APIs."), true, None);
        let input = "FastAPI is a modern web framework for building APIs with Python.";
        let (status, body) = send_json(&h.app, post_json("/summarize", json!({ "text": input }))).await;

        assert_eq!(status, StatusCode::OK);
        let summary = body["summary"].as_str().unwrap();
        assert!(!summary.is_empty());
        assert!(summary.len() < input.len());
        assert_eq!(h.fake.last_input.lock().unwrap().as_deref(), Some(input));

        let filename = body["filename"].as_str().unwrap();
        assert_eq!(h.store.load(filename).await.unwrap(), summary);
    }

    #[tokio::test]
    async fn filename_omitted_when_persistence_disabled() {
        let h = harness(Reply::Summary("short"), false, None);
        let (status, body) = send_json(&h.app, post_json("/summarize", json!({ "text": "some text" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "summary": "short" }));
        assert!(!h.store.dir().exists());
    }

    #[tokio::test]
    async fn oversized_text_never_reaches_provider() {
        let h = harness(Reply::Summary("unused"), true, None);
        let text = "a".repeat(10_001);
        let (status, body) = send_json(&h.app, post_json("/summarize", json!({ "text": text }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "text_too_long");
        assert_eq!(h.fake.calls(), 0);
    }

    #[tokio::test]
    async fn limit_counts_characters_not_bytes() {
        let h = harness(Reply::Summary("ok"), false, None);
        let text = "é".repeat(10_000);
        let (status, _) = send_json(&h.app, post_json("/summarize", json!({ "text": text }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.fake.calls(), 1);
    }

    #[tokio::test]
    async fn empty_or_missing_text_is_bad_request() {
        let h = harness(Reply::Summary("unused"), false, None);
        let (status, body) = send_json(&h.app, post_json("/summarize", json!({ "text": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "text_empty");

        let (status, body) = send_json(&h.app, post_json("/summarize", json!({ "body": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_body");
        assert_eq!(h.fake.calls(), 0);
    }

    #[tokio::test]
    async fn provider_failures_map_to_status_without_detail() {
        let cases: [(fn() -> SummarizeError, StatusCode, &str); 4] = [
            (|| SummarizeError::RateLimited("org quota sk-123".into()), StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            (|| SummarizeError::Transient("connection reset sk-123".into()), StatusCode::BAD_GATEWAY, "provider_unavailable"),
            (
                || SummarizeError::Provider { status: 401, detail: "bad key sk-123".into() },
                StatusCode::BAD_GATEWAY,
                "provider_error",
            ),
            (|| SummarizeError::EmptyCompletion, StatusCode::BAD_GATEWAY, "provider_error"),
        ];

        for (make, expected_status, expected_code) in cases {
            let h = harness(Reply::Fail(make), true, None);
            let (status, body) = send_json(&h.app, post_json("/summarize", json!({ "text": "hello" }))).await;
            assert_eq!(status, expected_status);
            assert_eq!(body["code"], expected_code);
            assert!(!body["message"].as_str().unwrap().contains("sk-123"));
            assert!(!h.store.dir().exists(), "failed summaries are not persisted");
        }
    }

    #[tokio::test]
    async fn download_serves_plain_text() {
        let h = harness(Reply::Summary("unused"), true, None);
        let name = h.store.save("stored summary").await.unwrap();
        let res = h
            .app
            .clone()
            .oneshot(HttpRequest::get(format!("/download/{name}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"stored summary");
    }

    #[tokio::test]
    async fn download_unknown_file_is_404() {
        let h = harness(Reply::Summary("unused"), true, None);
        let req = HttpRequest::get("/download/does-not-exist.txt").body(Body::empty()).unwrap();
        let (status, body) = send_json(&h.app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "summary_not_found");
    }

    #[tokio::test]
    async fn download_rejects_encoded_traversal() {
        let h = harness(Reply::Summary("unused"), true, None);
        let req = HttpRequest::get("/download/..%2FCargo.toml").body(Body::empty()).unwrap();
        let (status, _) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn api_key_is_enforced_when_configured() {
        let h = harness(Reply::Summary("ok"), false, Some("secret"));

        let (status, body) = send_json(&h.app, post_json("/summarize", json!({ "text": "hi" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "invalid_api_key");

        let mut wrong = post_json("/summarize", json!({ "text": "hi" }));
        wrong.headers_mut().insert("x-api-key", "nope".parse().unwrap());
        let (status, _) = send(&h.app, wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(h.fake.calls(), 0);

        let mut right = post_json("/summarize", json!({ "text": "hi" }));
        right.headers_mut().insert("x-api-key", "secret".parse().unwrap());
        let (status, _) = send(&h.app, right).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.fake.calls(), 1);

        let req = HttpRequest::get("/download/whatever.txt").body(Body::empty()).unwrap();
        let (status, _) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn preview_truncates_long_text() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(150);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }
}
