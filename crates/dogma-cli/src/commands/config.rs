//! Config command - prints the effective, fully-merged configuration.

use anyhow::{Context, Result};
use dogma_config::DogmaConfig;

pub fn run(path: &str) -> Result<()> {
    let config = DogmaConfig::load_from_dir(path).context("failed to load configuration")?;
    let toml = toml::to_string_pretty(&config).context("failed to render configuration")?;
    print!("{toml}");
    Ok(())
}
