// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use std::path::PathBuf;

/// synclink: keep a sync WebSocket alive across network changes
#[derive(Parser, Debug)]
#[command(name = "synclink")]
#[command(version, about = "Keep a sync WebSocket alive across network changes")]
pub struct Cli {
    /// Configuration file (default: <config dir>/synclink/synclink.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server URL, overriding the configuration file
    #[arg(short, long)]
    pub url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log a health snapshot every N seconds (0 disables)
    #[arg(long, default_value = "0")]
    pub status_interval: u64,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
