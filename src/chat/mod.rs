//! Chat over a processed document: context assembly and the OpenRouter client.

pub mod client;
pub mod context;

pub use client::{ChatApi, OpenRouterService};
pub use context::{PromptContext, build_context};

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Errors returned while requesting a chat completion.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// OpenRouter responded with a non-success status (rate limit, auth, ...).
    #[error("Unexpected OpenRouter response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from OpenRouter.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Completion succeeded but carried no choices to read an answer from.
    #[error("OpenRouter returned no completion choices")]
    EmptyResponse,
}

/// Author of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Question typed by the user.
    User,
    /// Generated answer.
    Assistant,
}

/// One entry in the chat transcript. Turns are appended, never mutated or
/// reordered, and only after a completion succeeds.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    /// Author of the turn.
    pub role: Role,
    /// Verbatim turn content.
    pub content: String,
    /// RFC3339 timestamp recorded when the turn was appended.
    pub timestamp: String,
}

impl ChatTurn {
    /// Create a turn stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: crate::ingest::types::current_timestamp_rfc3339(),
        }
    }
}
