use anyhow::Context;
use detector_core::config::HeuristicConfig;
use detector_core::{config, logging, paths};
use regex::Regex;
use std::fmt;
use std::io::{BufRead, Write};
use std::sync::OnceLock;

const LOG_FILE_NAME: &str = "checker.log";
const EXIT_COMMAND: &str = "exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
  Low,
  Medium,
  High,
}

impl RiskLevel {
  fn recommendation(self) -> &'static str {
    match self {
      Self::High => "Treat as PHISHING. Do NOT enter credentials.",
      Self::Medium => "Be cautious. Verify URL/domain before proceeding.",
      Self::Low => "Likely SAFE, but always double-check before entering sensitive info.",
    }
  }
}

impl fmt::Display for RiskLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Low => "LOW",
      Self::Medium => "MEDIUM",
      Self::High => "HIGH",
    })
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
  pub url: String,
  pub score: f64,
  pub risk: RiskLevel,
  pub reasons: Vec<String>,
}

pub fn analyze_url(url: &str, cfg: &HeuristicConfig) -> anyhow::Result<Analysis> {
  let lower = url.to_lowercase();
  let mut score = 0.0;
  let mut reasons = Vec::new();

  let len = url.chars().count();
  if len > 75 {
    score += 2.0;
    reasons.push("Long URL (>75 chars).".to_string());
  } else if len > 50 {
    score += 1.0;
    reasons.push("Moderately long URL (50-75 chars).".to_string());
  }

  if lower.contains('@') {
    score += 3.0;
    reasons.push("'@' symbol present in URL.".to_string());
  }

  if lower.starts_with("https://") {
    score -= 0.5;
  } else {
    score += 1.5;
    reasons.push("No HTTPS (secure) prefix.".to_string());
  }

  if has_ip_segment(&lower)? {
    score += 3.0;
    reasons.push("IP address used instead of domain.".to_string());
  }

  let mut hits: u32 = 0;
  for kw in &cfg.keywords {
    let kw = kw.to_lowercase();
    if lower.contains(&kw) {
      hits += 1;
      reasons.push(format!("Contains suspicious word: '{kw}'."));
    }
  }
  score += f64::from(hits.min(cfg.keyword_cap));

  if lower.matches('.').count() > 3 {
    score += 0.5;
    reasons.push("Many subdomains detected.".to_string());
  }

  let risk = if score >= cfg.high_threshold {
    RiskLevel::High
  } else if score >= cfg.medium_threshold {
    RiskLevel::Medium
  } else {
    RiskLevel::Low
  };

  Ok(Analysis {
    url: url.to_string(),
    score,
    risk,
    reasons,
  })
}

// ASCII digits only; `\d` in `regex` also matches other Unicode digits.
const IPV4_SEGMENT: &str = r"^[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+(:[0-9]+)?$";

fn ipv4_segment() -> anyhow::Result<&'static Regex> {
  static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
  RE.get_or_init(|| Regex::new(IPV4_SEGMENT))
    .as_ref()
    .map_err(|e| anyhow::anyhow!("compile ipv4 pattern: {e}"))
}

/// Any `/`-separated piece shaped like `a.b.c.d` with an optional port.
fn has_ip_segment(lower: &str) -> anyhow::Result<bool> {
  let re = ipv4_segment()?;
  Ok(lower.split('/').any(|p| re.is_match(p)))
}

pub fn write_report(out: &mut impl Write, a: &Analysis) -> anyhow::Result<()> {
  writeln!(out, "----- Analysis for: {}", a.url)?;
  writeln!(out, "Risk score: {:.1}   Risk level: {}", a.score, a.risk)?;
  if a.reasons.is_empty() {
    writeln!(out, "No obvious heuristic issues found.")?;
  } else {
    writeln!(out, "Reasons: {}", a.reasons.join(" "))?;
  }
  writeln!(out, "Recommendation: {}", a.risk.recommendation())?;
  writeln!(out)?;
  Ok(())
}

/// Returns how many URLs were analysed.
pub fn run_session(
  cfg: &HeuristicConfig,
  mut input: impl BufRead,
  mut out: impl Write,
) -> anyhow::Result<u64> {
  writeln!(out, "Simple Phishing URL Checker")?;
  writeln!(out, "Enter a website URL (or type '{EXIT_COMMAND}' to quit):")?;

  let mut analysed = 0;
  loop {
    write!(out, "> ")?;
    out.flush()?;

    let mut buf = Vec::new();
    if input.read_until(b'\n', &mut buf).context("read stdin")? == 0 {
      break;
    }
    let line = String::from_utf8_lossy(&buf);
    let url = line.trim();
    if url.eq_ignore_ascii_case(EXIT_COMMAND) {
      break;
    }
    if url.is_empty() {
      writeln!(out, "Please enter a non-empty URL.")?;
      continue;
    }

    let analysis = analyze_url(url, cfg)?;
    tracing::debug!(
      score = analysis.score,
      risk = %analysis.risk,
      reasons = analysis.reasons.len(),
      "url analysed"
    );
    write_report(&mut out, &analysis)?;
    analysed += 1;
  }

  writeln!(out, "Exiting. Stay safe!")?;
  out.flush()?;
  Ok(analysed)
}

pub fn run(verbose: bool) -> anyhow::Result<()> {
  let base = paths::base_dir()?;
  let cfg = config::load_or_default_readonly(&paths::config_path(&base))?;

  logging::init(
    &paths::logs_dir(&base),
    LOG_FILE_NAME,
    &cfg.logging,
    logging::Sink::from_verbose(verbose),
  )?;
  for w in &cfg.warnings {
    tracing::warn!("{w}");
  }

  let session_id = uuid::Uuid::new_v4();
  let span = tracing::info_span!("session", id = %session_id);
  let _entered = span.enter();

  let analysed = run_session(
    &cfg.heuristic,
    std::io::stdin().lock(),
    std::io::stdout().lock(),
  )?;
  tracing::info!(analysed, "checker session ended");
  Ok(())
}
