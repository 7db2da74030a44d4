pub mod config;
pub mod console;
pub mod features;
pub mod logging;
pub mod model;
pub mod paths;
pub mod shell;
pub mod types;

use anyhow::Context;
use console::Command;

const LOG_FILE_NAME: &str = "detector-core.log";

pub fn run_predictor(args: &[String]) -> anyhow::Result<()> {
  let opts = console::parse_args(args)?;
  if opts.command == Command::Help {
    console::print_help();
    return Ok(());
  }

  let base = paths::base_dir()?;
  let config_path = paths::config_path(&base);
  let cfg = if opts.command == Command::InitConfig {
    config::load_or_create_default(&config_path)?
  } else {
    config::load_or_default_readonly(&config_path)?
  };

  logging::init(
    &paths::logs_dir(&base),
    LOG_FILE_NAME,
    &cfg.logging,
    logging::Sink::from_verbose(opts.verbose),
  )?;
  for w in &cfg.warnings {
    tracing::warn!(config = %config_path.display(), "{w}");
  }

  if opts.command == Command::InitConfig {
    println!("Config ready at {}", config_path.display());
    return Ok(());
  }

  let model_path = paths::model_path(&base, opts.model.as_deref().unwrap_or(&cfg.model.path));
  let loaded = model::load(&model_path, cfg.model.expected_sha256.as_deref())
    .with_context(|| format!("load classifier artifact {}", model_path.display()))?;

  let stdout = std::io::stdout();
  match opts.command {
    Command::ModelInfo => console::write_model_info(&mut stdout.lock(), &model_path, &loaded),
    Command::Check(url) => {
      let shell = shell::Shell::new(loaded.model);
      shell.check_one(&url, &mut stdout.lock())?;
      Ok(())
    }
    _ => {
      let session_id = uuid::Uuid::new_v4();
      let span = tracing::info_span!("session", id = %session_id);
      let _entered = span.enter();

      tracing::info!(model = %model_path.display(), "starting interactive session");
      let shell = shell::Shell::new(loaded.model);
      let summary = shell.run(std::io::stdin().lock(), stdout.lock())?;
      tracing::info!(
        predictions = summary.predictions,
        phishing = summary.phishing,
        "session ended"
      );
      Ok(())
    }
  }
}
