// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors that can occur in the synclink client.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("no server url configured\n  hint: pass --url or set [server] url in {0}")]
    MissingUrl(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error(transparent)]
    Core(#[from] synclink_core::Error),
}

/// A specialized Result type for synclink client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
