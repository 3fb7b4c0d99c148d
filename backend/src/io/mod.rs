//! # IO Module
//!
//! Adapters between the outside world and the domain layer.
//!
//! - **rest**: Axum handlers exposing profiles, NFC scanning, the assistant
//!   and share links as a JSON API
//! - **nfc_bridge**: Tag reader fed by readings that external devices post
//! - **gemini**: Breed detection and vaccination advice through Google Gemini

pub mod gemini;
pub mod nfc_bridge;
pub mod rest;

pub use gemini::GeminiClient;
pub use nfc_bridge::BridgeTagReader;
