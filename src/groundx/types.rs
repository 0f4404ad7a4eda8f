//! Shared types used by the GroundX client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;

use thiserror::Error;

/// Errors returned while interacting with GroundX.
#[derive(Debug, Error)]
pub enum GroundXError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid GroundX URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// GroundX responded with an unexpected status code.
    #[error("Unexpected GroundX response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from GroundX.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Remote state of an ingest job as reported by GroundX.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted but not yet picked up by the parsing pipeline.
    Queued,
    /// Parsing in progress.
    Processing,
    /// Parsing finished; the X-Ray payload is available.
    Complete,
    /// Parsing failed on the remote side.
    Failed,
}

impl JobStatus {
    /// Map a vendor status string onto the local state machine.
    ///
    /// GroundX reports `training` while a document is being parsed and has grown
    /// new status strings over time; anything unrecognized is treated as still in
    /// flight so polling degrades to a timeout rather than a hard failure.
    pub fn from_remote(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "complete" => Self::Complete,
            "error" | "failed" | "cancelled" => Self::Failed,
            _ => Self::Processing,
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Receipt returned by a document upload.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    /// Opaque identifier of the ingest job.
    pub process_id: String,
    /// Status reported at submission time, usually [`JobStatus::Queued`].
    pub status: JobStatus,
}

/// Snapshot of an ingest job returned by a status poll.
#[derive(Debug, Clone)]
pub struct IngestUpdate {
    /// Opaque identifier of the ingest job.
    pub process_id: String,
    /// Current remote state.
    pub status: JobStatus,
    /// Vendor diagnostic message, populated on failure when available.
    pub detail: Option<String>,
    /// Finished document reference, present once the job is complete.
    pub document: Option<DocumentRef>,
}

/// Reference to a document stored in a GroundX bucket.
#[derive(Debug, Clone)]
pub struct DocumentRef {
    /// Identifier assigned to the document by GroundX.
    pub document_id: String,
    /// File name the document was uploaded under.
    pub file_name: String,
    /// URL the X-Ray payload can be fetched from.
    pub xray_url: String,
}

#[derive(Deserialize)]
pub(crate) struct BucketListResponse {
    pub(crate) buckets: Vec<BucketDescription>,
}

#[derive(Deserialize)]
pub(crate) struct BucketCreateResponse {
    pub(crate) bucket: BucketDescription,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BucketDescription {
    pub(crate) bucket_id: u64,
    pub(crate) name: String,
}

#[derive(Deserialize)]
pub(crate) struct IngestResponse {
    pub(crate) ingest: IngestReceiptWire,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IngestReceiptWire {
    pub(crate) process_id: String,
    #[serde(default)]
    pub(crate) status: String,
}

#[derive(Deserialize)]
pub(crate) struct IngestStatusResponse {
    pub(crate) ingest: IngestStatusWire,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IngestStatusWire {
    pub(crate) process_id: String,
    #[serde(default)]
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) status_message: Option<String>,
    #[serde(default)]
    pub(crate) progress: Option<IngestProgress>,
}

#[derive(Deserialize)]
pub(crate) struct IngestProgress {
    #[serde(default)]
    pub(crate) complete: Option<IngestStage>,
}

#[derive(Deserialize)]
pub(crate) struct IngestStage {
    #[serde(default)]
    pub(crate) documents: Vec<DocumentWire>,
}

#[derive(Deserialize)]
pub(crate) struct DocumentListResponse {
    #[serde(default)]
    pub(crate) documents: Vec<DocumentWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentWire {
    #[serde(default)]
    pub(crate) document_id: String,
    #[serde(default)]
    pub(crate) file_name: String,
    #[serde(default)]
    pub(crate) xray_url: String,
}

impl From<DocumentWire> for DocumentRef {
    fn from(wire: DocumentWire) -> Self {
        Self {
            document_id: wire.document_id,
            file_name: wire.file_name,
            xray_url: wire.xray_url,
        }
    }
}
