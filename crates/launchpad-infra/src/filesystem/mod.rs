//! Data directory layout for Launchpad.
//!
//! ```text
//! ~/.launchpad/
//!   config.toml     global configuration
//!   secrets.toml    file-backed secrets (name = "value")
//!   workflows/      default workflow discovery directory
//! ```

use std::path::{Path, PathBuf};

use launchpad_types::config::GlobalConfig;

/// Resolve the Launchpad data directory.
///
/// Priority:
/// 1. `LAUNCHPAD_DATA_DIR` environment variable
/// 2. `~/.launchpad`
/// 3. `.launchpad` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LAUNCHPAD_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".launchpad");
    }

    PathBuf::from(".launchpad")
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

pub fn secrets_path(data_dir: &Path) -> PathBuf {
    data_dir.join("secrets.toml")
}

/// Workflow discovery directory. Relative config values resolve against
/// the data directory.
pub fn workflows_dir(data_dir: &Path, config: &GlobalConfig) -> PathBuf {
    if config.workflows_dir.is_absolute() {
        config.workflows_dir.clone()
    } else {
        data_dir.join(&config.workflows_dir)
    }
}

/// Write `contents` to `path` so that it is never readable beyond `mode`.
///
/// New files are created with `mode`; an existing file is truncated and has
/// its permissions tightened before any new bytes land in it.
pub async fn write_private(path: &Path, contents: &[u8], mode: u32) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(mode);
    let mut file = options.open(path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(mode))
            .await?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    file.write_all(contents).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let data = Path::new("/home/ci/.launchpad");
        assert_eq!(config_path(data), data.join("config.toml"));
        assert_eq!(secrets_path(data), data.join("secrets.toml"));
    }

    #[test]
    fn workflows_dir_relative_and_absolute() {
        let data = Path::new("/data");
        let mut config = GlobalConfig::default();
        assert_eq!(workflows_dir(data, &config), PathBuf::from("/data/workflows"));

        config.workflows_dir = PathBuf::from("/srv/pipelines");
        assert_eq!(workflows_dir(data, &config), PathBuf::from("/srv/pipelines"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn write_private_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("key");
        std::fs::write(&path, "old contents that are longer").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_private(&path, b"new", 0o600).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
