use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
  Legitimate,
  Phishing,
}

impl Label {
  pub fn from_class(class: u8) -> anyhow::Result<Self> {
    match class {
      0 => Ok(Self::Legitimate),
      1 => Ok(Self::Phishing),
      other => Err(anyhow::anyhow!("unknown class label {other}")),
    }
  }

  pub fn class(self) -> u8 {
    match self {
      Self::Legitimate => 0,
      Self::Phishing => 1,
    }
  }

  pub fn display_name(self) -> &'static str {
    match self {
      Self::Legitimate => "Safe",
      Self::Phishing => "Phishing",
    }
  }
}

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.display_name())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
  pub label: Label,
  /// Probability of the phishing class.
  pub probability: f64,
}
