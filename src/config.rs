use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::storage::StoreConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PermstoreConfig {
    pub database: Option<String>,
    #[serde(default)]
    pub table_prefix: String,
}

impl PermstoreConfig {
    /// Connection settings, falling back to the default database path
    pub fn store_config(&self) -> StoreConfig {
        let path = self
            .database
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);
        StoreConfig::file(path).with_prefix(self.table_prefix.clone())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("permstore.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("permstore.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<PermstoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: PermstoreConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &PermstoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
