// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use synclink::{Cli, Config};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.log_file.as_deref());

    let config = match Config::resolve(cli.config.as_deref(), cli.url.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let status_interval = (cli.status_interval > 0).then(|| Duration::from_secs(cli.status_interval));
    if let Err(e) = synclink::run(config, status_interval).await {
        tracing::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool, log_file: Option<&Path>) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Try to open log file, fall back to stderr
    let file = log_file.and_then(|path| {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}
