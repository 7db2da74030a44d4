use crate::features::{self, FeatureRecord};
use crate::model::Classifier;
use crate::types::{Label, PredictionResult};
use anyhow::Context;
use std::io::{BufRead, Write};

pub const PROMPT: &str = "Enter URL: ";
pub const EXIT_COMMAND: &str = "exit";
pub const FAREWELL: &str = "Exiting... Stay safe online!";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
  pub predictions: u64,
  pub phishing: u64,
}

enum State {
  ReadLoop,
  Predict(String),
  Exit,
}

pub struct Shell<C> {
  classifier: C,
}

impl<C: Classifier> Shell<C> {
  pub fn new(classifier: C) -> Self {
    Self { classifier }
  }

  pub fn classify(&self, url: &str) -> anyhow::Result<(FeatureRecord, PredictionResult)> {
    let record = features::extract(url);
    let x = record.to_vector();
    let label = self.classifier.predict(&x).context("classifier predict")?;
    let probability = self
      .classifier
      .predict_probability(&x)
      .context("classifier predict_probability")?;
    Ok((record, PredictionResult { label, probability }))
  }

  /// Prints the result block for one URL.
  pub fn check_one(&self, url: &str, out: &mut impl Write) -> anyhow::Result<PredictionResult> {
    let (record, result) = self.classify(url)?;
    write_result(out, &record, &result)?;
    Ok(result)
  }

  pub fn run(&self, mut input: impl BufRead, mut out: impl Write) -> anyhow::Result<SessionSummary> {
    writeln!(out, "Phishing URL Detector (ML Model)")?;
    writeln!(out, "Type a URL to check (or '{EXIT_COMMAND}' to quit):")?;

    let mut summary = SessionSummary::default();
    let mut state = State::ReadLoop;
    loop {
      state = match state {
        State::ReadLoop => {
          write!(out, "\n{PROMPT}")?;
          out.flush()?;
          match read_trimmed_line(&mut input)? {
            None => State::Exit,
            Some(line) if line.eq_ignore_ascii_case(EXIT_COMMAND) => State::Exit,
            Some(line) => State::Predict(line),
          }
        }
        State::Predict(url) => {
          let result = self.check_one(&url, &mut out)?;
          summary.predictions += 1;
          if result.label == Label::Phishing {
            summary.phishing += 1;
          }
          tracing::debug!(
            url_length = url.chars().count(),
            label = ?result.label,
            probability = result.probability,
            "url classified"
          );
          State::ReadLoop
        }
        State::Exit => {
          writeln!(out, "{FAREWELL}")?;
          out.flush()?;
          return Ok(summary);
        }
      };
    }
  }
}

fn write_result(
  out: &mut impl Write,
  record: &FeatureRecord,
  result: &PredictionResult,
) -> anyhow::Result<()> {
  writeln!(out, "\nFeatures: {record}")?;
  writeln!(out, "Prediction: {}", result.label)?;
  writeln!(out, "Probability of phishing: {:.2}", result.probability)?;
  Ok(())
}

/// `None` at end of input. Invalid UTF-8 is replaced rather than rejected.
fn read_trimmed_line(input: &mut impl BufRead) -> anyhow::Result<Option<String>> {
  let mut buf = Vec::new();
  let n = input.read_until(b'\n', &mut buf).context("read stdin")?;
  if n == 0 {
    return Ok(None);
  }
  Ok(Some(String::from_utf8_lossy(&buf).trim().to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::features::FeatureVector;
  use crate::model::ForestModel;
  use std::cell::RefCell;
  use std::io::Cursor;

  #[derive(Default)]
  struct Recording {
    seen: RefCell<Vec<FeatureVector>>,
  }

  impl Classifier for &Recording {
    fn predict(&self, x: &FeatureVector) -> anyhow::Result<Label> {
      self.seen.borrow_mut().push(*x);
      Label::from_class(if x[2] > 0.5 { 1 } else { 0 })
    }

    fn predict_probability(&self, x: &FeatureVector) -> anyhow::Result<f64> {
      Ok(if x[2] > 0.5 { 0.876 } else { 0.124 })
    }
  }

  struct Broken;

  impl Classifier for Broken {
    fn predict(&self, _x: &FeatureVector) -> anyhow::Result<Label> {
      Err(anyhow::anyhow!("feature shape mismatch"))
    }

    fn predict_probability(&self, _x: &FeatureVector) -> anyhow::Result<f64> {
      Ok(0.0)
    }
  }

  fn run_with<C: Classifier>(c: C, input: &str) -> (anyhow::Result<SessionSummary>, String) {
    let mut out = Vec::new();
    let res = Shell::new(c).run(Cursor::new(input.as_bytes().to_vec()), &mut out);
    (res, String::from_utf8(out).unwrap())
  }

  #[test]
  fn one_url_then_exit() {
    let model = ForestModel::from_json_str(crate::model::tests::SMALL_FOREST).unwrap();
    let (res, out) = run_with(model, "http://1.2.3.4/login@bank.com\nexit\n");
    let summary = res.unwrap();
    assert_eq!(summary, SessionSummary { predictions: 1, phishing: 1 });

    assert_eq!(out.matches("Features: ").count(), 1);
    assert!(out.contains("Features: {UrlLength: 29, AtSymbol: 1, IpAddress: 1, NoHttps: 1}"));
    assert_eq!(out.matches("Prediction: ").count(), 1);
    assert!(out.contains("Prediction: Phishing"));
    assert!(out.contains("Probability of phishing: 0.90"));
    assert!(out.trim_end().ends_with(FAREWELL));
    assert_eq!(out.matches(PROMPT).count(), 2);
  }

  #[test]
  fn vector_reaches_classifier_in_column_order() {
    let rec = Recording::default();
    let (res, out) = run_with(&rec, "  https://example.com/a@b  \nEXIT\n");
    res.unwrap();
    assert_eq!(*rec.seen.borrow(), vec![[23.0, 1.0, 0.0, 0.0]]);
    assert!(out.contains("Prediction: Safe"));
    assert!(out.contains("Probability of phishing: 0.12"));
  }

  #[test]
  fn probability_rounds_to_two_places() {
    let rec = Recording::default();
    let (_, out) = run_with(&rec, "http://10.0.0.1/\nexit\n");
    assert!(out.contains("Probability of phishing: 0.88"));
  }

  #[test]
  fn exit_is_trimmed_and_case_insensitive() {
    let rec = Recording::default();
    let (res, out) = run_with(&rec, "   ExIt   \nhttp://never.example/\n");
    assert_eq!(res.unwrap().predictions, 0);
    assert!(rec.seen.borrow().is_empty());
    assert!(out.contains(FAREWELL));
  }

  #[test]
  fn end_of_input_exits_cleanly() {
    let rec = Recording::default();
    let (res, out) = run_with(&rec, "http://a.example/");
    assert_eq!(res.unwrap().predictions, 1);
    assert!(out.trim_end().ends_with(FAREWELL));
  }

  #[test]
  fn empty_line_is_classified() {
    let rec = Recording::default();
    let (res, _) = run_with(&rec, "\nexit\n");
    assert_eq!(res.unwrap().predictions, 1);
    assert_eq!(*rec.seen.borrow(), vec![[0.0, 0.0, 0.0, 1.0]]);
  }

  #[test]
  fn invalid_utf8_is_not_fatal() {
    let rec = Recording::default();
    let mut out = Vec::new();
    let input = b"http://\xff\xfe/\nexit\n".to_vec();
    let res = Shell::new(&rec).run(Cursor::new(input), &mut out);
    assert_eq!(res.unwrap().predictions, 1);
  }

  #[test]
  fn classifier_failure_is_fatal() {
    let (res, out) = run_with(Broken, "http://a.example/\nexit\n");
    let err = res.unwrap_err();
    assert!(format!("{err:#}").contains("feature shape mismatch"));
    assert!(!out.contains(FAREWELL));
  }

  #[test]
  fn check_one_prints_single_block() {
    let rec = Recording::default();
    let mut out = Vec::new();
    let r = Shell::new(&rec).check_one("http://1.2.3.4/", &mut out).unwrap();
    assert_eq!(r.label, Label::Phishing);
    let out = String::from_utf8(out).unwrap();
    assert!(!out.contains(PROMPT));
    assert!(out.contains("Prediction: Phishing"));
  }
}
