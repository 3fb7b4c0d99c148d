//! Google Gemini integration.
//!
//! Implements the breed detection and vaccination advice ports on top of the
//! `generateContent` REST endpoint. Photos are sent as inline base64 data;
//! advice is requested as JSON with a response schema.

pub mod client;
pub mod error;
pub mod types;

pub use client::{GeminiClient, UNKNOWN_BREED};
pub use error::GeminiError;
