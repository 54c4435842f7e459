use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppPathsError {
    #[error("Could not determine home directory")]
    HomeDirUnavailable,
    #[error("Could not determine data directory")]
    DataDirUnavailable,
}

/// On-disk locations for the update client's persistent state and logs.
pub struct AppPaths {
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Build client paths for the current platform.
    ///
    /// # Errors
    /// Returns an error when the platform base directory cannot be
    /// determined.
    pub fn new() -> Result<Self, AppPathsError> {
        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().ok_or(AppPathsError::HomeDirUnavailable)?;
            Ok(Self {
                data_dir: home.join("Library/Application Support/airlift"),
            })
        }

        #[cfg(not(target_os = "macos"))]
        {
            Ok(Self {
                data_dir: dirs::data_dir()
                    .ok_or(AppPathsError::DataDirUnavailable)?
                    .join("airlift"),
            })
        }
    }

    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("airlift.log")
    }

    /// Ensure the data directory exists on disk.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::AppPaths;

    #[test]
    fn files_live_under_the_data_dir() {
        let paths = AppPaths {
            data_dir: std::path::PathBuf::from("/tmp/airlift-test"),
        };

        assert_eq!(
            paths.state_file(),
            std::path::Path::new("/tmp/airlift-test/state.json")
        );
        assert_eq!(
            paths.log_file(),
            std::path::Path::new("/tmp/airlift-test/airlift.log")
        );
    }

    #[test]
    fn ensure_dirs_creates_the_data_dir() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let paths = AppPaths {
            data_dir: temp_dir.path().join("nested/airlift"),
        };

        paths.ensure_dirs().expect("directories should be created");
        assert!(paths.data_dir.exists());
    }
}
