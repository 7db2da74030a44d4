use crate::features::{FeatureName, FeatureVector, FEATURES, FEATURE_COUNT};
use crate::types::Label;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub const FORMAT_VERSION: u32 = 1;

/// Predict / predict-probability contract the shell depends on.
pub trait Classifier {
  fn predict(&self, x: &FeatureVector) -> anyhow::Result<Label>;

  /// Probability of the phishing class, in `[0, 1]`.
  fn predict_probability(&self, x: &FeatureVector) -> anyhow::Result<f64>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
  pub format_version: u32,
  pub features: Vec<FeatureName>,
  pub classes: Vec<u8>,
  pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
  pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
  Split {
    feature: usize,
    threshold: f64,
    left: usize,
    right: usize,
  },
  Leaf {
    value: Vec<f64>,
  },
}

#[derive(Debug, Clone)]
pub struct LoadedModel {
  pub model: ForestModel,
  pub sha256: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
  pub format_version: u32,
  pub features: Vec<FeatureName>,
  pub trees: usize,
  pub nodes: usize,
  pub max_depth: usize,
}

pub fn load(path: &Path, expected_sha256: Option<&str>) -> anyhow::Result<LoadedModel> {
  let raw = fs::read(path).with_context(|| format!("read model artifact {}", path.display()))?;
  let sha256 = sha256_hex(&raw);

  if let Some(expected) = expected_sha256 {
    let expected = expected.trim();
    if !expected.eq_ignore_ascii_case(&sha256) {
      anyhow::bail!(
        "model artifact {} has sha256 {sha256}, expected {expected}",
        path.display()
      );
    }
  }

  let text = std::str::from_utf8(&raw)
    .with_context(|| format!("model artifact {} is not UTF-8", path.display()))?;
  let model = ForestModel::from_json_str(text)
    .with_context(|| format!("incompatible model artifact {}", path.display()))?;

  let summary = model.summary();
  tracing::info!(
    sha256 = %sha256,
    trees = summary.trees,
    nodes = summary.nodes,
    max_depth = summary.max_depth,
    "model artifact loaded"
  );

  Ok(LoadedModel { model, sha256 })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  format!("{:x}", hasher.finalize())
}

impl ForestModel {
  pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
    let model: ForestModel = serde_json::from_str(raw).context("parse model JSON")?;
    model.validate()?;
    Ok(model)
  }

  pub fn validate(&self) -> anyhow::Result<()> {
    if self.format_version != FORMAT_VERSION {
      anyhow::bail!(
        "unsupported format_version {} (expected {FORMAT_VERSION})",
        self.format_version
      );
    }

    if self.features.as_slice() != FEATURES.as_slice() {
      let got: Vec<&str> = self.features.iter().map(|f| f.as_str()).collect();
      let want: Vec<&str> = FEATURES.iter().map(|f| f.as_str()).collect();
      anyhow::bail!("feature columns {got:?} do not match {want:?}");
    }

    let mut classes = self.classes.clone();
    classes.sort_unstable();
    if classes != [0, 1] {
      anyhow::bail!("classes must be exactly 0 and 1, got {:?}", self.classes);
    }

    if self.trees.is_empty() {
      anyhow::bail!("model has no trees");
    }

    for (t, tree) in self.trees.iter().enumerate() {
      validate_tree(tree, self.classes.len()).with_context(|| format!("tree {t}"))?;
    }

    Ok(())
  }

  pub fn summary(&self) -> ModelSummary {
    ModelSummary {
      format_version: self.format_version,
      features: self.features.clone(),
      trees: self.trees.len(),
      nodes: self.trees.iter().map(|t| t.nodes.len()).sum(),
      max_depth: self.trees.iter().map(Tree::depth).max().unwrap_or(0),
    }
  }

  /// Mean of the normalised leaf distributions, indexed like `classes`.
  pub fn predict_distribution(&self, x: &FeatureVector) -> anyhow::Result<Vec<f64>> {
    // Fields are public, so a model may reach here without `validate()`.
    if self.trees.is_empty() || self.classes.is_empty() {
      anyhow::bail!("model has no trees or no classes");
    }
    let mut acc = vec![0.0; self.classes.len()];
    for (t, tree) in self.trees.iter().enumerate() {
      let value = tree.leaf_for(x).with_context(|| format!("tree {t}"))?;
      let total: f64 = value.iter().sum();
      if value.len() != acc.len() || total <= 0.0 {
        anyhow::bail!("tree {t}: leaf does not match {} classes", acc.len());
      }
      for (a, v) in acc.iter_mut().zip(value) {
        *a += v / total;
      }
    }
    let n = self.trees.len() as f64;
    for a in &mut acc {
      *a /= n;
    }
    Ok(acc)
  }

  fn class_index(&self, class: u8) -> anyhow::Result<usize> {
    self
      .classes
      .iter()
      .position(|c| *c == class)
      .ok_or_else(|| anyhow::anyhow!("class {class} missing from model"))
  }
}

impl Classifier for ForestModel {
  fn predict(&self, x: &FeatureVector) -> anyhow::Result<Label> {
    let dist = self.predict_distribution(x)?;
    let mut best = 0;
    for (i, p) in dist.iter().enumerate() {
      if *p > dist[best] {
        best = i;
      }
    }
    Label::from_class(self.classes[best])
  }

  fn predict_probability(&self, x: &FeatureVector) -> anyhow::Result<f64> {
    let dist = self.predict_distribution(x)?;
    let p = dist[self.class_index(Label::Phishing.class())?];
    Ok(p.clamp(0.0, 1.0))
  }
}

impl Tree {
  fn leaf_for(&self, x: &FeatureVector) -> anyhow::Result<&[f64]> {
    let mut idx = 0;
    loop {
      match self.nodes.get(idx) {
        Some(Node::Leaf { value }) => return Ok(value),
        Some(Node::Split {
          feature,
          threshold,
          left,
          right,
        }) => {
          let v = x
            .get(*feature)
            .ok_or_else(|| anyhow::anyhow!("node {idx} reads feature {feature}"))?;
          idx = if *v <= *threshold { *left } else { *right };
        }
        None => anyhow::bail!("node {idx} out of range"),
      }
    }
  }

  fn depth(&self) -> usize {
    // Children always point forward, so one pass in index order suffices.
    let mut depth = vec![0usize; self.nodes.len()];
    let mut max = 0;
    for (i, node) in self.nodes.iter().enumerate() {
      max = max.max(depth[i]);
      if let Node::Split { left, right, .. } = node {
        let next = depth[i] + 1;
        for child in [*left, *right] {
          if let Some(d) = depth.get_mut(child) {
            *d = (*d).max(next);
          }
        }
      }
    }
    max
  }
}

fn validate_tree(tree: &Tree, n_classes: usize) -> anyhow::Result<()> {
  if tree.nodes.is_empty() {
    anyhow::bail!("tree has no nodes");
  }

  let n = tree.nodes.len();
  for (i, node) in tree.nodes.iter().enumerate() {
    match node {
      Node::Split {
        feature,
        threshold,
        left,
        right,
      } => {
        if *feature >= FEATURE_COUNT {
          anyhow::bail!("node {i}: feature index {feature} out of range");
        }
        if !threshold.is_finite() {
          anyhow::bail!("node {i}: threshold is not finite");
        }
        for child in [*left, *right] {
          if child <= i || child >= n {
            anyhow::bail!("node {i}: child {child} must be in {}..{n}", i + 1);
          }
        }
      }
      Node::Leaf { value } => {
        if value.len() != n_classes {
          anyhow::bail!(
            "node {i}: leaf has {} weights for {n_classes} classes",
            value.len()
          );
        }
        if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
          anyhow::bail!("node {i}: leaf weights must be finite and non-negative");
        }
        if value.iter().sum::<f64>() <= 0.0 {
          anyhow::bail!("node {i}: leaf weights sum to zero");
        }
      }
    }
  }

  Ok(())
}
