//! Document ingestion pipeline: upload, poll-until-ready, and result shaping.

pub mod clock;
pub mod normalize;
mod service;
pub mod types;

pub use clock::{PollClock, TokioClock};
pub use normalize::normalize_xray;
pub use service::{IngestApi, IngestService};
pub use types::{
    AnalysisResult, GroundXHealthSnapshot, IngestError, IngestOutcome, ProcessingJob,
    SupportedFileType,
};

pub use crate::groundx::JobStatus;
