//! `blacklist show | import`.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use nodpi_supervisor::blacklist::BlacklistStore;
use nodpi_supervisor::config::ConfigStore;
use nodpi_supervisor::installer::AssetInstaller;
use nodpi_supervisor::paths::Layout;

fn store(layout: &Layout) -> (ConfigStore, BlacklistStore) {
    let config_store = ConfigStore::new(layout.root());
    let installer = AssetInstaller::new(layout.assets_dir(), layout.exec_dir());
    (config_store.clone(), BlacklistStore::new(config_store, installer))
}

pub fn show(layout: &Layout) -> Result<()> {
    let (config_store, blacklist) = store(layout);
    print!("{}", blacklist.load(&config_store.load()));
    Ok(())
}

pub fn import(layout: &Layout, file: &Path) -> Result<()> {
    let contents = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let (config_store, blacklist) = store(layout);
    let config = config_store.load();
    blacklist.save(&config, &contents)?;

    let entries = contents.lines().filter(|l| !l.trim().is_empty()).count();
    println!(
        "Imported {entries} entries into {}",
        blacklist.path(&config).display()
    );
    Ok(())
}
