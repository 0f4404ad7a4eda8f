//! Core data types and error definitions for the ingestion pipeline.

use crate::groundx::{GroundXError, JobStatus};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

/// Errors emitted by the document ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// File extension is outside the allowed set; rejected before any network call.
    #[error("Unsupported file type for '{file_name}' (allowed: pdf, png, jpg, jpeg, docx)")]
    UnsupportedFileType {
        /// Name of the rejected file.
        file_name: String,
    },
    /// Upload request failed in transit or was rejected by GroundX.
    #[error("Upload failed: {0}")]
    Upload(#[source] GroundXError),
    /// Remote parsing reached the `failed` state.
    #[error("Processing failed for job {process_id}: {detail}")]
    Processing {
        /// Identifier of the failed ingest job.
        process_id: String,
        /// Diagnostic detail reported by GroundX.
        detail: String,
    },
    /// Polling exceeded the configured wait budget before a terminal state.
    ///
    /// The remote job is left running; polling the same `process_id` again later
    /// is valid and may still observe completion.
    #[error("Processing did not finish within {}s for job {process_id}", waited.as_secs())]
    Timeout {
        /// Identifier of the still-running ingest job.
        process_id: String,
        /// Wall-clock time spent polling before giving up.
        waited: Duration,
    },
    /// Completed job carried no document reference to fetch results from.
    #[error("Completed job {process_id} reported no document")]
    MissingDocument {
        /// Identifier of the inconsistent ingest job.
        process_id: String,
    },
    /// Status or result fetch failed at the HTTP layer.
    #[error("GroundX request failed: {0}")]
    Api(#[from] GroundXError),
}

/// File types accepted for upload, matching what the X-Ray pipeline can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedFileType {
    /// PDF document.
    Pdf,
    /// PNG image.
    Png,
    /// JPEG image (`.jpg` or `.jpeg`).
    Jpeg,
    /// Word document.
    Docx,
}

impl SupportedFileType {
    /// Classify a file by its extension, case-insensitively.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = file_name.rsplit_once('.').map(|(_, ext)| ext)?;
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// MIME type submitted alongside the upload.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

/// An ingest job submitted to GroundX, mutated only by poll responses.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    /// Opaque job identifier assigned by GroundX.
    pub process_id: String,
    /// Bucket the document was uploaded into.
    pub bucket_id: u64,
    /// File name the document was submitted under.
    pub source_filename: String,
    /// Last observed remote state.
    pub status: JobStatus,
    /// RFC3339 timestamp recorded at submission.
    pub submitted_at: String,
}

/// Normalized X-Ray analysis for a completed document.
///
/// Produced exactly once when a job reaches `complete` and immutable afterwards.
/// Absent vendor fields map to empty strings or empty sequences, never to a
/// missing-field fault.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResult {
    /// Narrative passages gathered from the document chunks.
    pub narrative_summary: String,
    /// Vendor-produced summary of the whole file.
    pub file_summary: String,
    /// Suggested text gathered from the document chunks.
    pub suggested_text: String,
    /// Raw extracted text gathered from the document chunks.
    pub extracted_text: String,
    /// Keywords in the order the vendor reported them.
    pub keywords: Vec<String>,
    /// Detected file type, e.g. `pdf`.
    pub file_type: String,
    /// Detected document language.
    pub language: String,
    /// Number of parsed pages.
    pub page_count: usize,
    /// Untouched vendor payload for raw display.
    pub raw_payload: Value,
}

/// Result of processing one document through the pipeline.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Normalized analysis for the document.
    pub analysis: AnalysisResult,
    /// Whether an existing document in the bucket was reused instead of re-uploading.
    pub reused: bool,
}

/// Reachability snapshot for the GroundX API.
#[derive(Debug, Clone)]
pub struct GroundXHealthSnapshot {
    /// Indicates whether the GroundX endpoint responded successfully.
    pub reachable: bool,
    /// Resolved bucket identifier documents are ingested into.
    pub bucket_id: u64,
    /// Optional diagnostic string captured when GroundX is unreachable.
    pub error: Option<String>,
}

/// Current timestamp formatted for job records and chat turns.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
