//! Per-document session state: the active analysis and its chat transcript.

use crate::chat::{ChatTurn, Role};
use crate::ingest::AnalysisResult;

/// State owned by one document session.
///
/// A session exists only once an analysis does, so holding a session is proof
/// that chat questions are allowed. A new upload replaces the session wholesale
/// and discards the previous transcript.
#[derive(Debug, Clone)]
pub struct DocumentSession {
    /// File name the analyzed document was uploaded under.
    pub file_name: String,
    /// Immutable analysis produced when the ingest job completed.
    pub analysis: AnalysisResult,
    /// Whether the analysis was reused from an existing bucket document.
    pub reused: bool,
    transcript: Vec<ChatTurn>,
}

impl DocumentSession {
    /// Start a session for a freshly analyzed document.
    pub fn new(file_name: impl Into<String>, analysis: AnalysisResult, reused: bool) -> Self {
        Self {
            file_name: file_name.into(),
            analysis,
            reused,
            transcript: Vec::new(),
        }
    }

    /// Append a completed question/answer exchange to the transcript.
    ///
    /// Called only after the completion succeeded; failed completions leave the
    /// transcript untouched.
    pub fn record_exchange(&mut self, question: &str, answer: &str) {
        self.transcript.push(ChatTurn::new(Role::User, question));
        self.transcript.push(ChatTurn::new(Role::Assistant, answer));
    }

    /// Ordered chat transcript for this session.
    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }
}
