#![deny(missing_docs)]

//! Core library for the xraydesk document analysis server.

/// HTTP routing and REST handlers.
pub mod api;
/// Chat context assembly and the OpenRouter completion client.
pub mod chat;
/// Environment-driven configuration management.
pub mod config;
/// GroundX document parsing service integration.
pub mod groundx;
/// Document ingestion pipeline: upload, poll, and result shaping.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Per-document session state.
pub mod session;
