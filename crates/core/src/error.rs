// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for synclink-core operations.
//!
//! Lifecycle operations never surface these to their callers; they are
//! logged where they occur. They do cross the trait seams (observer
//! registration, frame parsing, configuration validation).

use thiserror::Error;

/// All possible errors that can occur in synclink-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("network observer registration failed: {0}")]
    ObserverRegistration(String),

    #[error("frame send failed\n  hint: the channel refused the frame; the next heartbeat tick retries")]
    SendFailure,

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("invalid lifecycle config: {0}")]
    InvalidConfig(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for synclink-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
