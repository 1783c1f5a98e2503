use std::path::PathBuf;

use anyhow::{Context, Result};

const APP_DIR: &str = "reelpick";

pub fn database_file_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join(APP_DIR).join("reelpick.db"))
}

pub fn log_file_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join(APP_DIR).join("reelpick.log"))
}

pub fn default_config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(APP_DIR).join("config.toml"))
}
