use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "PHISHGUARD_HOME";

pub fn base_dir() -> anyhow::Result<PathBuf> {
  match std::env::var_os(HOME_ENV) {
    Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
    _ => Ok(std::env::current_dir()?),
  }
}

pub fn config_path(base: &Path) -> PathBuf {
  base.join("phishguard.toml")
}

pub fn logs_dir(base: &Path) -> PathBuf {
  base.join("logs")
}

/// Relative artifact paths resolve against the base directory.
pub fn model_path(base: &Path, configured: &str) -> PathBuf {
  let p = Path::new(configured);
  if p.is_absolute() {
    p.to_path_buf()
  } else {
    base.join(p)
  }
}
