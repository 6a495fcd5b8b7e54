// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise the configured filter applies.
pub fn build_filter(configured: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(configured)
        .map_err(|error| anyhow!("invalid log.filter {configured:?}: {error}"))
}

/// Installs the stderr subscriber once per process.
pub fn init(configured: &str) -> Result<()> {
    let filter = build_filter(configured)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))
}

#[cfg(test)]
mod tests {
    use super::build_filter;

    #[test]
    fn configured_filter_must_parse() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(build_filter("vitrine_app=debug,warn").is_ok());
        assert!(build_filter("vitrine_app=loud").is_err());
    }
}
