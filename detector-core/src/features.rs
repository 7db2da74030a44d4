use serde::{Deserialize, Serialize};
use std::fmt;

pub const FEATURE_COUNT: usize = 4;

/// Column order the classifier was fit on. Vector assembly and the model
/// schema check both read this list; reordering it invalidates every artifact.
pub const FEATURES: [FeatureName; FEATURE_COUNT] = [
  FeatureName::UrlLength,
  FeatureName::AtSymbol,
  FeatureName::IpAddress,
  FeatureName::NoHttps,
];

pub type FeatureVector = [f64; FEATURE_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureName {
  UrlLength,
  AtSymbol,
  IpAddress,
  NoHttps,
}

impl FeatureName {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::UrlLength => "UrlLength",
      Self::AtSymbol => "AtSymbol",
      Self::IpAddress => "IpAddress",
      Self::NoHttps => "NoHttps",
    }
  }
}

impl fmt::Display for FeatureName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureRecord {
  pub url_length: usize,
  pub at_symbol: bool,
  pub ip_address: bool,
  pub no_https: bool,
}

impl FeatureRecord {
  pub fn value(&self, name: FeatureName) -> f64 {
    match name {
      FeatureName::UrlLength => self.url_length as f64,
      FeatureName::AtSymbol => flag(self.at_symbol),
      FeatureName::IpAddress => flag(self.ip_address),
      FeatureName::NoHttps => flag(self.no_https),
    }
  }

  pub fn to_vector(&self) -> FeatureVector {
    FEATURES.map(|name| self.value(name))
  }
}

impl fmt::Display for FeatureRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("{")?;
    for (i, name) in FEATURES.iter().enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }
      write!(f, "{name}: {}", self.value(*name) as u64)?;
    }
    f.write_str("}")
  }
}

fn flag(b: bool) -> f64 {
  if b {
    1.0
  } else {
    0.0
  }
}

/// Total over every input string: malformed URLs degrade to absent features.
pub fn extract(url: &str) -> FeatureRecord {
  FeatureRecord {
    url_length: url.chars().count(),
    at_symbol: url.contains('@'),
    ip_address: authority(url).is_some_and(is_dotted_numeric),
    no_https: !url.to_lowercase().starts_with("https"),
  }
}

/// Third `/`-delimited segment, i.e. the host[:port] of `scheme://host/...`.
fn authority(url: &str) -> Option<&str> {
  url.split('/').nth(2)
}

fn is_dotted_numeric(authority: &str) -> bool {
  let mut segments = authority.split('.').filter(|s| !s.is_empty()).peekable();
  // An authority with no non-empty segment is not an address.
  if segments.peek().is_none() {
    return false;
  }
  segments.all(|s| s.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_string_has_only_no_https() {
    let r = extract("");
    assert_eq!(r.to_vector(), [0.0, 0.0, 0.0, 1.0]);
  }

  #[test]
  fn dotted_numeric_host_is_ip() {
    let r = extract("http://1.2.3.4/path");
    assert_eq!(r.url_length, 19);
    assert!(!r.at_symbol);
    assert!(r.ip_address);
    assert!(r.no_https);
  }

  #[test]
  fn at_symbol_in_path_with_https() {
    let r = extract("https://example.com/a@b");
    assert!(r.at_symbol);
    assert!(!r.ip_address);
    assert!(!r.no_https);
  }

  #[test]
  fn empty_authority_is_not_ip() {
    let r = extract("ftp://");
    assert!(!r.ip_address);
    assert!(r.no_https);

    assert!(!extract("http://.../x").ip_address);
    assert!(!extract("http:///x").ip_address);
  }

  #[test]
  fn https_prefix_is_case_insensitive() {
    assert!(!extract("HTTPS://Example.com").no_https);
    assert!(!extract("hTtPs").no_https);
    assert!(extract("http://example.com").no_https);
    assert!(extract(" https://example.com").no_https);
  }

  #[test]
  fn too_few_segments_is_not_ip() {
    assert!(!extract("1.2.3.4").ip_address);
    assert!(!extract("http:/1.2.3.4").ip_address);
  }

  #[test]
  fn host_with_port_or_letters_is_not_ip() {
    assert!(!extract("http://1.2.3.4:8080/").ip_address);
    assert!(!extract("http://10.0.0.one/").ip_address);
  }

  #[test]
  fn trailing_and_doubled_dots_are_ignored() {
    assert!(extract("http://1.2.3.4./").ip_address);
    assert!(extract("http://1..2/").ip_address);
    assert!(extract("http://127").ip_address);
  }

  #[test]
  fn non_ascii_digits_do_not_count() {
    assert!(!extract("http://١٢.٣/").ip_address);
  }

  #[test]
  fn length_counts_characters_not_bytes() {
    assert_eq!(extract("héllo").url_length, 5);
    assert_eq!(extract("  a b  ").url_length, 7);
  }

  #[test]
  fn extract_is_idempotent() {
    for s in ["", "ftp://", "http://1.2.3.4/login@bank.com", "\u{0}//\u{ffff}"] {
      assert_eq!(extract(s), extract(s));
    }
  }

  #[test]
  fn vector_follows_feature_order() {
    let r = extract("http://1.2.3.4/login@bank.com");
    let v = r.to_vector();
    for (i, name) in FEATURES.iter().enumerate() {
      assert_eq!(v[i], r.value(*name));
    }
    assert_eq!(v, [29.0, 1.0, 1.0, 1.0]);
  }

  #[test]
  fn display_lists_fields_in_order() {
    let r = extract("https://example.com/a@b");
    assert_eq!(
      r.to_string(),
      "{UrlLength: 23, AtSymbol: 1, IpAddress: 0, NoHttps: 0}"
    );
  }

  #[test]
  fn feature_names_serialize_as_column_headers() {
    let json = serde_json::to_string(&FEATURES).unwrap();
    assert_eq!(json, r#"["UrlLength","AtSymbol","IpAddress","NoHttps"]"#);
  }
}
