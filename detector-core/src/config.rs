use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub model: ModelConfig,
  pub logging: LoggingConfig,
  pub heuristic: HeuristicConfig,
  /// Sections replaced by defaults while loading. Entry points log these once
  /// the subscriber is installed.
  pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
  #[serde(default = "default_model_path")]
  pub path: String,

  /// Hex SHA-256 the artifact must match; unset skips the check.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expected_sha256: Option<String>,
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self {
      path: default_model_path(),
      expected_sha256: None,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,

  #[serde(default = "default_retention_days")]
  pub retention_days: u64,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      retention_days: default_retention_days(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicConfig {
  #[serde(default = "default_keywords")]
  pub keywords: Vec<String>,

  #[serde(default = "default_keyword_cap")]
  pub keyword_cap: u32,

  #[serde(default = "default_medium_threshold")]
  pub medium_threshold: f64,

  #[serde(default = "default_high_threshold")]
  pub high_threshold: f64,
}

impl Default for HeuristicConfig {
  fn default() -> Self {
    Self {
      keywords: default_keywords(),
      keyword_cap: default_keyword_cap(),
      medium_threshold: default_medium_threshold(),
      high_threshold: default_high_threshold(),
    }
  }
}

fn default_model_path() -> String {
  "models/model_simple.json".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_retention_days() -> u64 {
  14
}

fn default_keywords() -> Vec<String> {
  [
    "login", "verify", "update", "secure", "account", "bank", "confirm", "free", "bonus",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

fn default_keyword_cap() -> u32 {
  3
}

fn default_medium_threshold() -> f64 {
  3.0
}

fn default_high_threshold() -> f64 {
  6.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
  #[serde(default)]
  pub model: Option<ModelConfig>,

  #[serde(default)]
  pub logging: Option<LoggingConfig>,

  #[serde(default)]
  pub heuristic: Option<HeuristicConfig>,
}

impl ConfigFile {
  fn normalize(self) -> Config {
    let mut cfg = Config::default();
    if let Some(m) = self.model {
      cfg.model = m;
    }
    if let Some(l) = self.logging {
      cfg.logging = l;
    }
    if let Some(h) = self.heuristic {
      cfg.heuristic = h;
    }

    if let Some(reason) = validate_heuristic_config(&cfg.heuristic) {
      cfg.heuristic = HeuristicConfig::default();
      cfg
        .warnings
        .push(format!("heuristic config invalid ({reason}); using defaults"));
    }

    cfg
  }

  fn needs_upgrade(&self) -> bool {
    self.model.is_none() || self.logging.is_none() || self.heuristic.is_none()
  }
}

pub fn parse(raw: &str) -> anyhow::Result<Config> {
  let file: ConfigFile = toml::from_str(raw)?;
  Ok(file.normalize())
}

pub fn load_or_create_default(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, true)
}

pub fn load_or_default_readonly(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, false)
}

fn load_impl(path: &Path, allow_writes: bool) -> anyhow::Result<Config> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;
  if allow_writes {
    fs::create_dir_all(parent)?;
  }

  if !path.exists() {
    let cfg = Config::default();
    if allow_writes {
      write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
      eprintln!("PhishGuard: default config written to {}", path.display());
    }
    return Ok(cfg);
  }

  let raw = fs::read_to_string(path)?;
  match toml::from_str::<ConfigFile>(&raw) {
    Ok(file) => {
      let cfg = file.clone().normalize();
      for w in &cfg.warnings {
        eprintln!("PhishGuard: {}: {w}", path.display());
      }
      if allow_writes && file.needs_upgrade() {
        let backup = parent.join(format!("phishguard.toml.bak-{}", now_unix_s()));
        let _ = fs::copy(path, &backup);
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        eprintln!(
          "PhishGuard: upgraded config defaults written to {} (backup: {})",
          path.display(),
          backup.display()
        );
      }
      Ok(cfg)
    }
    Err(e) => {
      let cfg = Config::default();
      if allow_writes {
        let backup = parent.join(format!("phishguard.toml.bad-{}", now_unix_s()));
        let _ = fs::rename(path, &backup);
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        eprintln!(
          "PhishGuard: invalid config at {} (backed up to {}): {e}",
          path.display(),
          backup.display()
        );
      } else {
        eprintln!(
          "PhishGuard: invalid config at {}; using defaults: {e}",
          path.display()
        );
      }
      Ok(cfg)
    }
  }
}

fn to_config_file(cfg: &Config) -> ConfigFile {
  ConfigFile {
    model: Some(cfg.model.clone()),
    logging: Some(cfg.logging.clone()),
    heuristic: Some(cfg.heuristic.clone()),
  }
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));

  fs::write(&tmp, contents)?;
  fs::rename(&tmp, path)?;
  Ok(())
}

fn now_unix_s() -> u64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

fn validate_heuristic_config(cfg: &HeuristicConfig) -> Option<String> {
  if cfg.keyword_cap == 0 {
    return Some("keyword_cap must be > 0".to_string());
  }
  if !cfg.medium_threshold.is_finite() || !cfg.high_threshold.is_finite() {
    return Some("thresholds must be finite".to_string());
  }
  if cfg.medium_threshold < 0.0 || cfg.high_threshold < 0.0 {
    return Some("thresholds must be >= 0".to_string());
  }
  if cfg.medium_threshold > cfg.high_threshold {
    return Some("medium_threshold must not exceed high_threshold".to_string());
  }
  if cfg.keywords.iter().any(|k| k.trim().is_empty()) {
    return Some("keywords must not be empty strings".to_string());
  }
  None
}
