//! `config show | path | set`.

use anyhow::{Context, Result};

use nodpi_supervisor::config::ConfigStore;
use nodpi_supervisor::paths::Layout;

pub fn show(layout: &Layout) -> Result<()> {
    let config = ConfigStore::new(layout.root()).load();
    let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    print!("{text}");
    Ok(())
}

pub fn path(layout: &Layout) -> Result<()> {
    println!("{}", layout.config_path().display());
    Ok(())
}

pub fn set(layout: &Layout, key: &str, value: &str) -> Result<()> {
    let store = ConfigStore::new(layout.root());
    let mut config = store.load();
    config.set(key, value)?;
    store
        .save(&config)
        .with_context(|| format!("Failed to save {}", store.path().display()))?;
    println!("{key} = {value}");
    Ok(())
}
