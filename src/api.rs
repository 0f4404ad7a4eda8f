//! HTTP surface for xraydesk.
//!
//! This module exposes a compact Axum router the presentation layer renders
//! from:
//!
//! - `POST /documents` – Upload a document, run it through GroundX X-Ray, and
//!   wait for the analysis; responds with a summary once processing finishes.
//! - `GET /documents/current` – Full normalized analysis for tab rendering.
//! - `DELETE /documents/current` – Clear the active session and transcript.
//! - `POST /chat` – Ask a question about the analyzed document.
//! - `GET /chat` – Ordered chat transcript for the active session.
//! - `GET /health` – Configuration and GroundX reachability probe.
//! - `GET /commands` – Machine-readable command catalog for tools/hosts.
//!
//! Errors surface as JSON bodies with a status per failure class; this runs as
//! a long-lived UI server, so nothing maps to a process exit.

use crate::chat::{ChatApi, ChatTurn, build_context};
use crate::config::Config;
use crate::ingest::{IngestApi, IngestError};
use crate::session::DocumentSession;
use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared state handed to every handler.
pub struct AppState<I, C> {
    /// Ingestion pipeline implementation.
    pub ingest: Arc<I>,
    /// Completion backend implementation.
    pub chat: Arc<C>,
    /// Active document session, if any.
    pub session: Arc<RwLock<Option<DocumentSession>>>,
    /// Server configuration.
    pub config: Arc<Config>,
}

impl<I, C> Clone for AppState<I, C> {
    fn clone(&self) -> Self {
        Self {
            ingest: Arc::clone(&self.ingest),
            chat: Arc::clone(&self.chat),
            session: Arc::clone(&self.session),
            config: Arc::clone(&self.config),
        }
    }
}

/// Build the HTTP router exposing the workspace API surface.
pub fn create_router<I, C>(state: AppState<I, C>) -> Router
where
    I: IngestApi + 'static,
    C: ChatApi + 'static,
{
    Router::new()
        .route("/documents", post(upload_document::<I, C>))
        .route(
            "/documents/current",
            get(get_analysis::<I, C>).delete(reset_session::<I, C>),
        )
        .route("/chat", post(ask_question::<I, C>).get(get_transcript::<I, C>))
        .route("/health", get(get_health::<I, C>))
        .route("/commands", get(get_commands))
        .with_state(state)
}

/// Success response for `POST /documents`.
#[derive(Serialize)]
struct UploadResponse {
    /// File name the document was uploaded under.
    file_name: String,
    /// Number of parsed pages.
    pages: usize,
    /// Number of keywords the analysis reported.
    keyword_count: usize,
    /// Whether an existing bucket document was reused instead of re-uploading.
    reused: bool,
}

/// Upload a document and block until its analysis is ready.
///
/// Accepts a multipart form with a single `file` field. The whole ingest
/// pipeline runs inside the request; `MAX_WAIT_SECS` bounds how long a slow
/// parse can hold the connection.
async fn upload_document<I, C>(
    State(state): State<AppState<I, C>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    I: IngestApi,
    C: ChatApi,
{
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("file field is missing a filename".into()))?;
        let bytes = field.bytes().await?.to_vec();
        upload = Some((file_name, bytes));
        break;
    }
    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("multipart field 'file' is required".into()))?;

    let outcome = state.ingest.process_document(&file_name, bytes).await?;
    tracing::info!(
        file_name,
        pages = outcome.analysis.page_count,
        keywords = outcome.analysis.keywords.len(),
        reused = outcome.reused,
        "Document analysis ready"
    );

    let response = UploadResponse {
        file_name: file_name.clone(),
        pages: outcome.analysis.page_count,
        keyword_count: outcome.analysis.keywords.len(),
        reused: outcome.reused,
    };
    let mut session = state.session.write().await;
    *session = Some(DocumentSession::new(
        file_name,
        outcome.analysis,
        outcome.reused,
    ));

    Ok(Json(response))
}

/// Return the full analysis for the active session.
async fn get_analysis<I, C>(
    State(state): State<AppState<I, C>>,
) -> Result<Json<serde_json::Value>, AppError>
where
    I: IngestApi,
    C: ChatApi,
{
    let session = state.session.read().await;
    let session = session.as_ref().ok_or(AppError::NoDocument)?;
    Ok(Json(json!({
        "file_name": session.file_name,
        "reused": session.reused,
        "analysis": session.analysis,
    })))
}

/// Clear the active session, discarding the analysis and transcript.
async fn reset_session<I, C>(State(state): State<AppState<I, C>>) -> StatusCode
where
    I: IngestApi,
    C: ChatApi,
{
    let mut session = state.session.write().await;
    if session.take().is_some() {
        tracing::info!("Session cleared");
    }
    StatusCode::NO_CONTENT
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    /// Question to answer against the active document.
    question: String,
}

/// Success response for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    /// Generated answer, verbatim from the completion API.
    answer: String,
}

/// Answer a question about the analyzed document.
///
/// Rejected with a conflict until an analysis exists. Both turns are appended
/// to the transcript only after the completion succeeds.
async fn ask_question<I, C>(
    State(state): State<AppState<I, C>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError>
where
    I: IngestApi,
    C: ChatApi,
{
    let analysis = {
        let session = state.session.read().await;
        session
            .as_ref()
            .map(|session| session.analysis.clone())
            .ok_or(AppError::NoDocument)?
    };

    let context = build_context(
        &analysis,
        &request.question,
        state.config.context_max_tokens,
    );
    tracing::debug!(
        question = %request.question,
        context_tokens = context.token_estimate,
        "Assembled chat context"
    );
    let answer = state.chat.ask(&context).await?;

    let mut session = state.session.write().await;
    if let Some(session) = session.as_mut() {
        session.record_exchange(&request.question, &answer);
    }

    Ok(Json(ChatResponse { answer }))
}

/// Response body for `GET /chat`.
#[derive(Serialize)]
struct TranscriptResponse {
    turns: Vec<ChatTurn>,
}

/// Return the ordered transcript for the active session.
async fn get_transcript<I, C>(
    State(state): State<AppState<I, C>>,
) -> Result<Json<TranscriptResponse>, AppError>
where
    I: IngestApi,
    C: ChatApi,
{
    let session = state.session.read().await;
    let session = session.as_ref().ok_or(AppError::NoDocument)?;
    Ok(Json(TranscriptResponse {
        turns: session.transcript().to_vec(),
    }))
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    groundx_reachable: bool,
    bucket_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Probe GroundX reachability for diagnostics.
async fn get_health<I, C>(State(state): State<AppState<I, C>>) -> Json<HealthResponse>
where
    I: IngestApi,
    C: ChatApi,
{
    let snapshot = state.ingest.health().await;
    Json(HealthResponse {
        status: if snapshot.reachable { "ok" } else { "degraded" },
        groundx_reachable: snapshot.reachable,
        bucket_id: snapshot.bucket_id,
        error: snapshot.error,
    })
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/documents",
                description: "Upload a document (pdf, png, jpg, jpeg, docx) and wait for its X-Ray analysis.",
            },
            CommandDescriptor {
                name: "analysis",
                method: "GET",
                path: "/documents/current",
                description: "Return the normalized analysis for the active document.",
            },
            CommandDescriptor {
                name: "clear",
                method: "DELETE",
                path: "/documents/current",
                description: "Clear the active document session and its chat transcript.",
            },
            CommandDescriptor {
                name: "chat",
                method: "POST",
                path: "/chat",
                description: "Ask a question about the active document. Body: { \"question\": string }.",
            },
            CommandDescriptor {
                name: "transcript",
                method: "GET",
                path: "/chat",
                description: "Return the chat transcript for the active session.",
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Report GroundX reachability and the resolved bucket.",
            },
        ],
    })
}

/// Failure classes surfaced by the HTTP layer.
enum AppError {
    Ingest(IngestError),
    Chat(crate::chat::ChatError),
    BadRequest(String),
    NoDocument,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Ingest(IngestError::UnsupportedFileType { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::Ingest(IngestError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Ingest(_) | Self::Chat(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoDocument => StatusCode::CONFLICT,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Ingest(inner) => inner.to_string(),
            Self::Chat(inner) => inner.to_string(),
            Self::BadRequest(message) => message.clone(),
            Self::NoDocument => "no document analysis available; upload a document first".into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(inner: IngestError) -> Self {
        Self::Ingest(inner)
    }
}

impl From<crate::chat::ChatError> for AppError {
    fn from(inner: crate::chat::ChatError) -> Self {
        Self::Chat(inner)
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        Self::BadRequest(format!("invalid multipart upload: {inner}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatError, PromptContext};
    use crate::ingest::{AnalysisResult, GroundXHealthSnapshot, IngestOutcome};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            groundx_api_key: "gx-test".into(),
            openrouter_api_key: "or-test".into(),
            groundx_base_url: "http://127.0.0.1:1/".into(),
            openrouter_base_url: "http://127.0.0.1:1/".into(),
            bucket_name: "xraydesk".into(),
            chat_model: "openai/gpt-4o-mini".into(),
            poll_interval: Duration::from_secs(3),
            max_wait: Duration::from_secs(60),
            context_max_tokens: 1500,
            completion_max_tokens: 300,
            server_port: None,
        })
    }

    fn sample_analysis() -> AnalysisResult {
        AnalysisResult {
            narrative_summary: "The bill covers the month of March.".into(),
            file_summary: "An electricity bill.".into(),
            extracted_text: "Billing period: 01 Mar - 31 Mar".into(),
            keywords: vec!["electricity".into(), "billing".into()],
            file_type: "pdf".into(),
            language: "en".into(),
            page_count: 2,
            ..Default::default()
        }
    }

    struct StubIngest {
        outcome: IngestOutcome,
    }

    #[async_trait]
    impl IngestApi for StubIngest {
        async fn process_document(
            &self,
            _file_name: &str,
            _bytes: Vec<u8>,
        ) -> Result<IngestOutcome, IngestError> {
            Ok(self.outcome.clone())
        }

        async fn health(&self) -> GroundXHealthSnapshot {
            GroundXHealthSnapshot {
                reachable: true,
                bucket_id: 12,
                error: None,
            }
        }
    }

    struct StubChat {
        answer: Result<String, ()>,
        contexts: Mutex<Vec<PromptContext>>,
    }

    #[async_trait]
    impl ChatApi for StubChat {
        async fn ask(&self, context: &PromptContext) -> Result<String, ChatError> {
            self.contexts.lock().await.push(context.clone());
            match &self.answer {
                Ok(answer) => Ok(answer.clone()),
                Err(()) => Err(ChatError::EmptyResponse),
            }
        }
    }

    fn state_with(
        outcome: IngestOutcome,
        answer: Result<String, ()>,
    ) -> AppState<StubIngest, StubChat> {
        AppState {
            ingest: Arc::new(StubIngest { outcome }),
            chat: Arc::new(StubChat {
                answer,
                contexts: Mutex::new(Vec::new()),
            }),
            session: Arc::new(RwLock::new(None)),
            config: test_config(),
        }
    }

    fn multipart_upload(file_name: &str) -> Request<Body> {
        let boundary = "xraydesk-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/pdf\r\n\r\n\
             %PDF-1.4 stub\r\n\
             --{boundary}--\r\n"
        );
        Request::builder()
            .method(Method::POST)
            .uri("/documents")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn upload_stores_session_and_returns_summary() {
        let state = state_with(
            IngestOutcome {
                analysis: sample_analysis(),
                reused: false,
            },
            Ok("ignored".into()),
        );
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(multipart_upload("electricity.pdf"))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["file_name"], "electricity.pdf");
        assert_eq!(json["pages"], 2);
        assert_eq!(json["keyword_count"], 2);
        assert_eq!(json["reused"], false);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/documents/current")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["analysis"]["keywords"][0], "electricity");
        assert_eq!(json["analysis"]["file_summary"], "An electricity bill.");
    }

    #[tokio::test]
    async fn chat_requires_an_analysis() {
        let state = state_with(
            IngestOutcome {
                analysis: sample_analysis(),
                reused: false,
            },
            Ok("answer".into()),
        );
        let app = create_router(state);

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/chat",
                serde_json::json!({ "question": "What is due?" }),
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn chat_appends_turns_and_passes_document_context() {
        let state = state_with(
            IngestOutcome {
                analysis: sample_analysis(),
                reused: false,
            },
            Ok("01 Mar - 31 Mar".into()),
        );
        let app = create_router(state.clone());

        app.clone()
            .oneshot(multipart_upload("electricity.pdf"))
            .await
            .expect("upload");

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/chat",
                serde_json::json!({ "question": "What is the billing period?" }),
            ))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["answer"], "01 Mar - 31 Mar");

        let contexts = state.chat.contexts.lock().await;
        assert_eq!(contexts.len(), 1);
        assert!(
            contexts[0]
                .document_context
                .contains("The bill covers the month of March.")
        );
        drop(contexts);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/chat")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        let json = response_json(response).await;
        let turns = json["turns"].as_array().expect("turns");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0]["role"], "user");
        assert_eq!(turns[1]["role"], "assistant");
        assert_eq!(turns[1]["content"], "01 Mar - 31 Mar");
    }

    #[tokio::test]
    async fn failed_completion_leaves_transcript_untouched() {
        let state = state_with(
            IngestOutcome {
                analysis: sample_analysis(),
                reused: false,
            },
            Err(()),
        );
        let app = create_router(state.clone());

        app.clone()
            .oneshot(multipart_upload("electricity.pdf"))
            .await
            .expect("upload");

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/chat",
                serde_json::json!({ "question": "What is due?" }),
            ))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let session = state.session.read().await;
        assert!(session.as_ref().expect("session").transcript().is_empty());
    }

    #[tokio::test]
    async fn clearing_the_session_forgets_the_analysis() {
        let state = state_with(
            IngestOutcome {
                analysis: sample_analysis(),
                reused: true,
            },
            Ok("answer".into()),
        );
        let app = create_router(state);

        app.clone()
            .oneshot(multipart_upload("electricity.pdf"))
            .await
            .expect("upload");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/documents/current")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/documents/current")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn commands_catalog_exposes_upload_endpoint() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let upload = commands
            .iter()
            .find(|cmd| cmd.name == "upload")
            .expect("upload command present");

        assert_eq!(upload.method, "POST");
        assert_eq!(upload.path, "/documents");
        assert!(upload.description.to_lowercase().contains("x-ray"));
        assert!(commands.len() >= 5);
    }
}
