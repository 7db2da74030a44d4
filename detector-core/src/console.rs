use crate::model::LoadedModel;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Interactive,
  Check(String),
  ModelInfo,
  InitConfig,
  Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleArgs {
  pub command: Command,
  pub model: Option<String>,
  pub verbose: bool,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<ConsoleArgs> {
  let mut command = Command::Interactive;
  let mut model = None;
  let mut verbose = false;

  // args[0] is the program name.
  let mut i = 1;
  while i < args.len() {
    match args[i].as_str() {
      "--help" | "-h" => command = Command::Help,
      "--verbose" => verbose = true,
      "--model-info" => command = Command::ModelInfo,
      "--init-config" => command = Command::InitConfig,
      "--model" => {
        let v = args
          .get(i + 1)
          .ok_or_else(|| anyhow::anyhow!("expected: --model <path-to-model.json>"))?;
        model = Some(v.clone());
        i += 1;
      }
      "--check" => {
        let v = args
          .get(i + 1)
          .ok_or_else(|| anyhow::anyhow!("expected: --check <url>"))?;
        command = Command::Check(v.clone());
        i += 1;
      }
      other => anyhow::bail!("unknown argument `{other}` (see --help)"),
    }
    i += 1;
  }

  // Help wins over anything else on the line.
  if args.iter().skip(1).any(|a| a == "--help" || a == "-h") {
    command = Command::Help;
  }

  Ok(ConsoleArgs {
    command,
    model,
    verbose,
  })
}

pub fn print_help() {
  println!("PhishGuard detector v{}", env!("CARGO_PKG_VERSION"));
  println!("Usage: detector-core [options]");
  println!("  (no command)           interactive URL shell; type `exit` to quit");
  println!("  --check <url>          classify one URL and exit");
  println!("  --model-info           validate the model artifact and print a summary");
  println!("  --init-config          write or upgrade phishguard.toml in the base directory");
  println!("  --model <path>         model artifact (default: models/model_simple.json)");
  println!("  --verbose              also log to stderr");
  println!("  --version");
  println!("Base directory: $PHISHGUARD_HOME, else the current directory.");
}

pub fn write_model_info(
  out: &mut impl Write,
  path: &Path,
  loaded: &LoadedModel,
) -> anyhow::Result<()> {
  let s = loaded.model.summary();
  let features: Vec<&str> = s.features.iter().map(|f| f.as_str()).collect();
  writeln!(out, "Model: {}", path.display())?;
  writeln!(out, "Format version: {}", s.format_version)?;
  writeln!(out, "Features: [{}]", features.join(", "))?;
  writeln!(out, "Trees: {}", s.trees)?;
  writeln!(out, "Nodes: {}", s.nodes)?;
  writeln!(out, "Max depth: {}", s.max_depth)?;
  writeln!(out, "SHA-256: {}", loaded.sha256)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ForestModel;

  fn args(v: &[&str]) -> Vec<String> {
    std::iter::once("detector-core")
      .chain(v.iter().copied())
      .map(String::from)
      .collect()
  }

  #[test]
  fn no_args_is_interactive() {
    let a = parse_args(&args(&[])).unwrap();
    assert_eq!(a.command, Command::Interactive);
    assert!(a.model.is_none());
    assert!(!a.verbose);
  }

  #[test]
  fn model_override_and_check() {
    let a = parse_args(&args(&["--model", "m.json", "--check", "http://1.2.3.4/", "--verbose"]))
      .unwrap();
    assert_eq!(a.command, Command::Check("http://1.2.3.4/".to_string()));
    assert_eq!(a.model.as_deref(), Some("m.json"));
    assert!(a.verbose);
  }

  #[test]
  fn missing_values_and_unknown_flags_fail() {
    assert!(parse_args(&args(&["--model"])).is_err());
    assert!(parse_args(&args(&["--check"])).is_err());
    assert!(parse_args(&args(&["--quick"])).is_err());
  }

  #[test]
  fn help_wins() {
    let a = parse_args(&args(&["--model-info", "-h"])).unwrap();
    assert_eq!(a.command, Command::Help);
  }

  #[test]
  fn model_info_lists_summary() {
    let model = ForestModel::from_json_str(crate::model::tests::SMALL_FOREST).unwrap();
    let loaded = LoadedModel {
      model,
      sha256: "00ff".to_string(),
    };
    let mut out = Vec::new();
    write_model_info(&mut out, Path::new("m.json"), &loaded).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Features: [UrlLength, AtSymbol, IpAddress, NoHttps]"));
    assert!(out.contains("Trees: 2"));
    assert!(out.contains("SHA-256: 00ff"));
  }
}
