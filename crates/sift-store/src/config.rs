use std::path::PathBuf;

/// Directory layout for persisted records.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub profiles_dir: PathBuf,
    pub scores_dir: PathBuf,
    pub requirements_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            profiles_dir: PathBuf::from("data/output"),
            scores_dir: PathBuf::from("data/scores"),
            requirements_dir: PathBuf::from("requirements"),
        }
    }
}

impl StoreConfig {
    /// Read configuration from environment variables.
    ///
    /// - `PROFILES_DIR` (default `data/output`)
    /// - `SCORES_DIR` (default `data/scores`)
    /// - `REQUIREMENTS_DIR` (default `requirements`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            profiles_dir: std::env::var("PROFILES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.profiles_dir),
            scores_dir: std::env::var("SCORES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scores_dir),
            requirements_dir: std::env::var("REQUIREMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.requirements_dir),
        }
    }
}
