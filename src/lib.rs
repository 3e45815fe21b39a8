#![deny(missing_docs)]

//! Core library for the docpipe document processing service.
//!
//! Uploads are turned into text (PDF parsing or OCR), then run through completion-backed
//! language detection, summarization and optional translation. Text and documents can also be
//! converted to speech, and audio transcribed back to text.

/// HTTP routing and REST handlers.
pub mod api;
/// Chat-completion client abstraction and the OpenRouter adapter.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Text extraction from PDF and image uploads.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Request counters exposed for diagnostics.
pub mod metrics;
/// Document pipeline orchestration and prompt building.
pub mod processing;
/// Speech synthesis and recognition clients.
pub mod speech;
