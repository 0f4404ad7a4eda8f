//! HTTP client wrapper for the GroundX management API.

use crate::config::Config;
use crate::groundx::types::{
    BucketCreateResponse, BucketListResponse, DocumentListResponse, DocumentRef, GroundXError,
    IngestReceipt, IngestResponse, IngestStatusResponse, IngestUpdate, JobStatus,
};
use reqwest::{Client, Method, multipart};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// Lightweight HTTP client for GroundX bucket and ingest operations.
pub struct GroundXService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

impl GroundXService {
    /// Construct a new client from the supplied configuration.
    pub fn new(config: &Config) -> Result<Self, GroundXError> {
        let client = Client::builder().user_agent("xraydesk/0.1").build()?;
        let base_url =
            normalize_base_url(&config.groundx_base_url).map_err(GroundXError::InvalidUrl)?;
        tracing::debug!(url = %base_url, "Initialized GroundX HTTP client");

        Ok(Self {
            client,
            base_url,
            api_key: config.groundx_api_key.clone(),
        })
    }

    /// Find a bucket by name, creating it when absent. Idempotent by name.
    pub async fn ensure_bucket(&self, name: &str) -> Result<u64, GroundXError> {
        if let Some(bucket_id) = self.find_bucket(name).await? {
            tracing::debug!(bucket_id, name, "Bucket already present");
            return Ok(bucket_id);
        }

        tracing::debug!(name, "Creating bucket");
        self.create_bucket(name).await
    }

    /// Create a new bucket and return its identifier.
    pub async fn create_bucket(&self, name: &str) -> Result<u64, GroundXError> {
        let response = self
            .request(Method::POST, "bucket")?
            .json(&json!({ "name": name }))
            .send()
            .await?;

        let payload: BucketCreateResponse = self.read_json(response, "create bucket").await?;
        tracing::info!(bucket_id = payload.bucket.bucket_id, name, "Bucket created");
        Ok(payload.bucket.bucket_id)
    }

    /// Look up a bucket identifier by name.
    async fn find_bucket(&self, name: &str) -> Result<Option<u64>, GroundXError> {
        let response = self.request(Method::GET, "bucket")?.send().await?;
        let payload: BucketListResponse = self.read_json(response, "list buckets").await?;
        Ok(payload
            .buckets
            .into_iter()
            .find(|bucket| bucket.name == name)
            .map(|bucket| bucket.bucket_id))
    }

    /// Upload a document into the given bucket, returning the ingest receipt.
    pub async fn upload_document(
        &self,
        bucket_id: u64,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestReceipt, GroundXError> {
        let metadata = json!({
            "bucketId": bucket_id,
            "fileName": file_name,
            "fileType": mime_type,
        });
        let blob = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;
        let form = multipart::Form::new()
            .part("blob", blob)
            .text("metadata", metadata.to_string());

        let response = self
            .request(Method::POST, "ingest/documents/local")?
            .multipart(form)
            .send()
            .await?;

        let payload: IngestResponse = self.read_json(response, "upload document").await?;
        tracing::info!(
            bucket_id,
            file_name,
            process_id = %payload.ingest.process_id,
            "Document submitted for processing"
        );
        Ok(IngestReceipt {
            process_id: payload.ingest.process_id,
            status: JobStatus::from_remote(&payload.ingest.status),
        })
    }

    /// Query the current state of an ingest job.
    pub async fn ingest_status(&self, process_id: &str) -> Result<IngestUpdate, GroundXError> {
        let response = self
            .request(Method::GET, &format!("ingest/{process_id}"))?
            .send()
            .await?;

        let payload: IngestStatusResponse = self.read_json(response, "ingest status").await?;
        let wire = payload.ingest;
        let document = wire
            .progress
            .and_then(|progress| progress.complete)
            .and_then(|stage| stage.documents.into_iter().next())
            .map(DocumentRef::from);

        Ok(IngestUpdate {
            process_id: wire.process_id,
            status: JobStatus::from_remote(&wire.status),
            detail: wire.status_message,
            document,
        })
    }

    /// Find a previously uploaded document in the bucket by file name.
    pub async fn lookup_document(
        &self,
        bucket_id: u64,
        file_name: &str,
    ) -> Result<Option<DocumentRef>, GroundXError> {
        let response = self
            .request(Method::GET, &format!("ingest/documents/{bucket_id}"))?
            .send()
            .await?;

        let payload: DocumentListResponse = self.read_json(response, "list documents").await?;
        Ok(payload
            .documents
            .into_iter()
            .find(|document| document.file_name == file_name)
            .map(DocumentRef::from))
    }

    /// Fetch the raw X-Ray payload from the URL reported for a finished document.
    ///
    /// The URL is pre-signed by GroundX, so the request carries no API key.
    pub async fn fetch_xray(&self, xray_url: &str) -> Result<Value, GroundXError> {
        let response = self.client.get(xray_url).send().await?;
        self.read_json(response, "fetch xray").await
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, GroundXError> {
        let url = format_endpoint(&self.base_url, path);
        Ok(self
            .client
            .request(method, url)
            .header("X-API-Key", &self.api_key))
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T, GroundXError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = GroundXError::UnexpectedStatus { status, body };
            tracing::error!(operation, error = %error, "GroundX request failed");
            return Err(error);
        }
        Ok(response.json().await?)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
