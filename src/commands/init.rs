//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use std::path::PathBuf;
use tracing::info;

/// Initialize configuration and the records database
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<Config> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::AlreadyInitialized(
            config.paths.config_file.display().to_string(),
        ));
    }

    config.save()?;

    // Creating the handle initializes the schema
    let _db = MetaDb::connect(&config).await?;

    info!("Initialized assayer at {:?}", config.paths.base_dir);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_db() {
        let tmp = TempDir::new().unwrap();
        let config = cmd_init(Some(tmp.path().to_path_buf()), false).await.unwrap();

        assert!(config.paths.config_file.exists());
        assert!(config.paths.db_file.exists());
        assert!(config.is_initialized());
    }

    #[tokio::test]
    async fn test_init_refuses_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        cmd_init(Some(tmp.path().to_path_buf()), false).await.unwrap();

        let second = cmd_init(Some(tmp.path().to_path_buf()), false).await;
        assert!(matches!(second, Err(Error::AlreadyInitialized(_))));

        // Force allows re-init
        assert!(cmd_init(Some(tmp.path().to_path_buf()), true).await.is_ok());
    }
}
