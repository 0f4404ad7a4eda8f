//! Ingestion service coordinating upload, polling, and result normalization.

use crate::{
    config::Config,
    groundx::{GroundXService, JobStatus},
    ingest::{
        clock::{PollClock, TokioClock},
        normalize::normalize_xray,
        types::{
            AnalysisResult, GroundXHealthSnapshot, IngestError, IngestOutcome, ProcessingJob,
            SupportedFileType, current_timestamp_rfc3339,
        },
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Drives the document ingestion state machine: upload, poll-until-ready,
/// and X-Ray normalization.
///
/// The service owns the GroundX transport and the resolved bucket so every
/// surface shares one client. Construct it once near process start and share it
/// through an `Arc`.
pub struct IngestService {
    pub(crate) groundx: GroundXService,
    pub(crate) bucket_id: u64,
    pub(crate) config: Arc<Config>,
    pub(crate) clock: Box<dyn PollClock>,
}

/// Abstraction over the ingestion pipeline used by the HTTP surface.
#[async_trait]
pub trait IngestApi: Send + Sync {
    /// Run the full pipeline for one document, reusing an existing bucket entry
    /// when the file name is already known.
    async fn process_document(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, IngestError>;

    /// Probe GroundX reachability for diagnostics.
    async fn health(&self) -> GroundXHealthSnapshot;
}

impl IngestService {
    /// Build a new ingestion service, resolving the configured bucket up front.
    pub async fn new(config: Arc<Config>) -> Result<Self, IngestError> {
        let groundx = GroundXService::new(&config)?;
        let bucket_id = groundx.ensure_bucket(&config.bucket_name).await?;
        tracing::info!(bucket_id, bucket = %config.bucket_name, "Ingest bucket ready");

        Ok(Self {
            groundx,
            bucket_id,
            config,
            clock: Box::new(TokioClock),
        })
    }

    /// Upload a document into the resolved bucket.
    ///
    /// The file extension is validated against the allowed set before any
    /// network call is issued; unsupported files never reach the vendor.
    pub async fn submit(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ProcessingJob, IngestError> {
        let file_type = SupportedFileType::from_file_name(file_name).ok_or_else(|| {
            IngestError::UnsupportedFileType {
                file_name: file_name.to_string(),
            }
        })?;

        let receipt = self
            .groundx
            .upload_document(self.bucket_id, file_name, file_type.mime_type(), bytes)
            .await
            .map_err(IngestError::Upload)?;

        Ok(ProcessingJob {
            process_id: receipt.process_id,
            bucket_id: self.bucket_id,
            source_filename: file_name.to_string(),
            status: receipt.status,
            submitted_at: current_timestamp_rfc3339(),
        })
    }

    /// Poll a job until it reaches a terminal state, then fetch and normalize
    /// the X-Ray payload.
    ///
    /// Polling is stateless with respect to wall clock: a timeout leaves the
    /// remote job running, and calling this again with the same job resumes
    /// cleanly. Each attempt waits `poll_interval` between status queries and
    /// the loop gives up once `max_wait` has elapsed without a terminal state.
    pub async fn await_completion(
        &self,
        job: &ProcessingJob,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<AnalysisResult, IngestError> {
        let started = self.clock.now();

        loop {
            let update = self.groundx.ingest_status(&job.process_id).await?;
            match update.status {
                JobStatus::Complete => {
                    let document =
                        update
                            .document
                            .ok_or_else(|| IngestError::MissingDocument {
                                process_id: job.process_id.clone(),
                            })?;
                    tracing::info!(
                        process_id = %job.process_id,
                        document_id = %document.document_id,
                        "Processing complete; fetching X-Ray payload"
                    );
                    let payload = self.groundx.fetch_xray(&document.xray_url).await?;
                    return Ok(normalize_xray(payload));
                }
                JobStatus::Failed => {
                    let detail = update
                        .detail
                        .unwrap_or_else(|| "no detail provided".to_string());
                    tracing::warn!(process_id = %job.process_id, detail, "Remote processing failed");
                    return Err(IngestError::Processing {
                        process_id: job.process_id.clone(),
                        detail,
                    });
                }
                JobStatus::Queued | JobStatus::Processing => {
                    let waited = self.clock.now().duration_since(started);
                    if waited >= max_wait {
                        tracing::warn!(
                            process_id = %job.process_id,
                            waited_secs = waited.as_secs(),
                            "Gave up polling; remote job left running"
                        );
                        return Err(IngestError::Timeout {
                            process_id: job.process_id.clone(),
                            waited,
                        });
                    }
                    tracing::debug!(
                        process_id = %job.process_id,
                        status = ?update.status,
                        "Job still in flight"
                    );
                    self.clock.sleep(poll_interval).await;
                }
            }
        }
    }

    /// Run the full pipeline for one document.
    ///
    /// When the bucket already holds a document with the same file name, its
    /// existing X-Ray payload is fetched instead of re-uploading.
    pub async fn process_document(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, IngestError> {
        if SupportedFileType::from_file_name(file_name).is_none() {
            return Err(IngestError::UnsupportedFileType {
                file_name: file_name.to_string(),
            });
        }

        if let Some(existing) = self.groundx.lookup_document(self.bucket_id, file_name).await? {
            tracing::info!(
                file_name,
                document_id = %existing.document_id,
                "File already in bucket; reusing existing analysis"
            );
            let payload = self.groundx.fetch_xray(&existing.xray_url).await?;
            return Ok(IngestOutcome {
                analysis: normalize_xray(payload),
                reused: true,
            });
        }

        let job = self.submit(file_name, bytes).await?;
        let analysis = self
            .await_completion(&job, self.config.poll_interval, self.config.max_wait)
            .await?;
        Ok(IngestOutcome {
            analysis,
            reused: false,
        })
    }

    /// Probe GroundX to surface a lightweight health snapshot.
    pub async fn health(&self) -> GroundXHealthSnapshot {
        match self.groundx.ensure_bucket(&self.config.bucket_name).await {
            Ok(bucket_id) => GroundXHealthSnapshot {
                reachable: true,
                bucket_id,
                error: None,
            },
            Err(error) => {
                tracing::warn!(error = %error, "GroundX health probe failed");
                GroundXHealthSnapshot {
                    reachable: false,
                    bucket_id: self.bucket_id,
                    error: Some(error.to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl IngestApi for IngestService {
    async fn process_document(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, IngestError> {
        IngestService::process_document(self, file_name, bytes).await
    }

    async fn health(&self) -> GroundXHealthSnapshot {
        IngestService::health(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groundx::GroundXService;
    use httpmock::{Method::GET, MockServer};
    use reqwest::Client;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Simulated clock: every sleep advances virtual time, no real delay.
    struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }
    }

    #[async_trait]
    impl PollClock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().expect("clock lock")
        }

        async fn sleep(&self, duration: Duration) {
            *self.offset.lock().expect("clock lock") += duration;
        }
    }

    fn test_config(base_url: &str) -> Arc<Config> {
        Arc::new(Config {
            groundx_api_key: "gx-test".into(),
            openrouter_api_key: "or-test".into(),
            groundx_base_url: base_url.to_string(),
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

    fn test_service(server: &MockServer) -> IngestService {
        let config = test_config(&server.base_url());
        IngestService {
            groundx: GroundXService {
                client: Client::builder()
                    .user_agent("xraydesk-test")
                    .build()
                    .expect("client"),
                base_url: server.base_url(),
                api_key: config.groundx_api_key.clone(),
            },
            bucket_id: 12,
            config,
            clock: Box::new(ManualClock::new()),
        }
    }

    fn job(process_id: &str) -> ProcessingJob {
        ProcessingJob {
            process_id: process_id.to_string(),
            bucket_id: 12,
            source_filename: "electricity.pdf".into(),
            status: JobStatus::Queued,
            submitted_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn unsupported_extension_fails_without_network_call() {
        let server = MockServer::start_async().await;
        let upload = server
            .mock_async(|when, then| {
                when.path_contains("/");
                then.status(500);
            })
            .await;

        let service = test_service(&server);
        let error = service
            .submit("malware.exe", b"MZ".to_vec())
            .await
            .expect_err("rejected");

        assert!(matches!(
            error,
            IngestError::UnsupportedFileType { ref file_name } if file_name == "malware.exe"
        ));
        upload.assert_hits(0);
    }

    #[tokio::test]
    async fn stuck_job_times_out_with_original_process_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ingest/proc-stuck");
                then.status(200).json_body(json!({
                    "ingest": { "processId": "proc-stuck", "status": "training" }
                }));
            })
            .await;

        let service = test_service(&server);
        let error = service
            .await_completion(
                &job("proc-stuck"),
                Duration::from_secs(3),
                Duration::from_secs(60),
            )
            .await
            .expect_err("timeout");

        match error {
            IngestError::Timeout { process_id, waited } => {
                assert_eq!(process_id, "proc-stuck");
                assert!(waited >= Duration::from_secs(60));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn failed_job_carries_remote_detail() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ingest/proc-bad");
                then.status(200).json_body(json!({
                    "ingest": {
                        "processId": "proc-bad",
                        "status": "error",
                        "statusMessage": "corrupt page tree"
                    }
                }));
            })
            .await;

        let service = test_service(&server);
        let error = service
            .await_completion(
                &job("proc-bad"),
                Duration::from_secs(3),
                Duration::from_secs(60),
            )
            .await
            .expect_err("processing failure");

        match error {
            IngestError::Processing { process_id, detail } => {
                assert_eq!(process_id, "proc-bad");
                assert_eq!(detail, "corrupt page tree");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn completed_job_yields_normalized_analysis() {
        let server = MockServer::start_async().await;
        let xray_url = format!("{}/xray/doc-9", server.base_url());
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ingest/proc-ok");
                then.status(200).json_body(json!({
                    "ingest": {
                        "processId": "proc-ok",
                        "status": "complete",
                        "progress": {
                            "complete": {
                                "documents": [{
                                    "documentId": "doc-9",
                                    "fileName": "electricity.pdf",
                                    "xrayUrl": xray_url
                                }]
                            }
                        }
                    }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/xray/doc-9");
                then.status(200).json_body(json!({
                    "fileSummary": "An electricity bill.",
                    "fileKeywords": "electricity,billing"
                }));
            })
            .await;

        let service = test_service(&server);
        let analysis = service
            .await_completion(
                &job("proc-ok"),
                Duration::from_secs(3),
                Duration::from_secs(60),
            )
            .await
            .expect("analysis");

        assert_eq!(analysis.file_summary, "An electricity bill.");
        assert_eq!(analysis.keywords, vec!["electricity", "billing"]);
    }
}
