/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Loading `weft.toml`.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;
use weft_template::WeftConfig;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "weft.toml";

/// Load the configuration.
///
/// An explicit path must exist. Without one, `./weft.toml` is used when
/// present and the defaults otherwise.
pub fn load(explicit: Option<&Path>) -> Result<WeftConfig> {
    let path = match explicit {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Path::new(DEFAULT_CONFIG_FILE),
        None => return Ok(WeftConfig::default()),
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = parse(&text).with_context(|| format!("Invalid config file {}", path.display()))?;

    // Relative template directories are relative to the config file.
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let config = WeftConfig {
        template_dirs: config
            .template_dirs
            .into_iter()
            .map(|dir| if dir.is_relative() { base.join(dir) } else { dir })
            .collect(),
        ..config
    };
    debug!(path = %path.display(), ?config, "loaded configuration");
    Ok(config)
}

pub fn parse(text: &str) -> Result<WeftConfig> {
    let config: WeftConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}
