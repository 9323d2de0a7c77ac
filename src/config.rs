use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// User preferences persisted between runs in `prefs.toml`.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub api_key: Option<String>,
  pub theme_name: Option<String>,
  pub last_user: Option<String>,
}

pub fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "reel")
}

pub fn config_file() -> Option<PathBuf> {
  project_dirs().map(|dirs| dirs.config_dir().join("prefs.toml"))
}

impl Config {
  pub fn load_from(path: &Path) -> Self {
    if let Ok(content) = std::fs::read_to_string(path)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }
    Self::default()
  }

  /// Best-effort write; failures are logged and otherwise ignored.
  pub fn save_to(&self, path: &Path) {
    if let Some(dir) = path.parent()
      && std::fs::create_dir_all(dir).is_err()
    {
      warn!(path = %dir.display(), "config: cannot create config directory");
      return;
    }
    match toml::to_string(self) {
      Ok(content) => {
        if let Err(e) = std::fs::write(path, content) {
          warn!(path = %path.display(), err = %e, "config: save failed");
        }
      }
      Err(e) => warn!(err = %e, "config: serialize failed"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(Config::load_from(&dir.path().join("prefs.toml")), Config::default());
  }

  #[test]
  fn saved_preferences_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("prefs.toml");
    let config = Config {
      api_key: Some("abc123".into()),
      theme_name: Some("Noir".into()),
      last_user: Some("alice".into()),
    };
    config.save_to(&path);
    assert_eq!(Config::load_from(&path), config);
  }

  #[test]
  fn garbage_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.toml");
    std::fs::write(&path, "theme_name = [not toml").unwrap();
    assert_eq!(Config::load_from(&path), Config::default());
  }
}
