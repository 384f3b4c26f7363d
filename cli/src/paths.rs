//! Path utilities for roadtrip applications.

use std::io;
use std::path::PathBuf;

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".roadtrip";

/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Provides access to the roadtrip directory structure.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Application name.
    pub app_name: String,
    /// User's home directory.
    pub home_dir: PathBuf,
}

impl Paths {
    /// Creates a new Paths instance for the given app.
    pub fn new(app_name: impl Into<String>) -> io::Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "could not find home directory")
        })?;
        Ok(Self::with_home(app_name, home_dir))
    }

    /// Creates a Paths instance rooted at `home_dir`.
    pub fn with_home(app_name: impl Into<String>, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_name: app_name.into(),
            home_dir: home_dir.into(),
        }
    }

    /// Returns the base directory (~/.roadtrip).
    pub fn base_dir(&self) -> PathBuf {
        self.home_dir.join(DEFAULT_BASE_DIR)
    }

    /// Returns the app-specific directory (~/.roadtrip/<app>).
    pub fn app_dir(&self) -> PathBuf {
        self.base_dir().join(&self.app_name)
    }

    /// Returns the config file path (~/.roadtrip/<app>/config.yaml).
    pub fn config_file(&self) -> PathBuf {
        self.app_dir().join(DEFAULT_CONFIG_FILE)
    }

    /// Returns the scenario directory (~/.roadtrip/<app>/scenarios).
    pub fn scenario_dir(&self) -> PathBuf {
        self.app_dir().join("scenarios")
    }

    pub fn ensure_scenario_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.scenario_dir())
    }

    /// Resolves a scenario by name.
    ///
    /// Names with a path separator or an extension are returned unchanged;
    /// bare names resolve to `<scenario_dir>/<name>.yaml`.
    pub fn scenario_path(&self, name: &str) -> PathBuf {
        let path = PathBuf::from(name);
        if path.components().count() > 1 || path.extension().is_some() {
            return path;
        }
        self.scenario_dir().join(format!("{}.yaml", name))
    }
}
