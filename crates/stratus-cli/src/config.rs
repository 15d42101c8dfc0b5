//! `stratus.toml` loading

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use stratus_engine::VmOptions;

const DEFAULT_CONFIG: &str = "stratus.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vm: VmOptions,
}

/// Read the given file, or `stratus.toml` in the working directory if it exists
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG).exists() => Path::new(DEFAULT_CONFIG),
        None => return Ok(Config::default()),
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config = parse(&text).with_context(|| format!("parsing {}", path.display()))?;
    log::debug!("loaded {}: {:?}", path.display(), config.vm);
    Ok(config)
}

fn parse(text: &str) -> anyhow::Result<Config> {
    Ok(toml::from_str(text)?)
}
