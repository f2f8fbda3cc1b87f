//! Init command - scaffolds a new data directory.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use dogma_config::{DogmaConfig, Paths};

pub fn run(path: &str) -> Result<()> {
    let data_dir = Path::new(path);

    if Paths::is_initialized(data_dir) {
        bail!("'{path}' is already initialized (dogma.toml exists)");
    }

    fs::create_dir_all(data_dir).with_context(|| format!("failed to create data directory '{path}'"))?;
    fs::create_dir_all(Paths::state_dir(data_dir)).context("failed to create .dogma state directory")?;

    let defaults = DogmaConfig::default();
    let toml = toml::to_string_pretty(&defaults).context("failed to render default configuration")?;
    fs::write(Paths::project_config_file(data_dir), toml).context("failed to write dogma.toml")?;

    println!("Initialized an empty dogma repository in '{path}'.");
    Ok(())
}
