//! Platform directory lookup
//!
//! - Windows: `%APPDATA%\wfprules\wfprules\config\`
//! - Linux: `~/.config/wfprules/`
//! - macOS: `~/Library/Application Support/com.wfprules.wfprules/`

use directories::ProjectDirs;
use std::path::PathBuf;

pub fn get_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "wfprules", "wfprules").map(|pd| pd.config_dir().to_path_buf())
}

/// `config.json` inside [`get_config_dir`]
pub fn default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.json"))
}
