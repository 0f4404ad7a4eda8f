//! GroundX document parsing service integration.

pub mod client;
pub mod types;

pub use client::GroundXService;
pub use types::{DocumentRef, GroundXError, IngestReceipt, IngestUpdate, JobStatus};
