use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

/// A Content-Security-Policy as a map of directive name to its sources,
/// e.g. `script-src: ["'self'", "cdn.example.com"]`.
pub type CspPolicy = BTreeMap<String, CspSources>;

/// Sources for one CSP directive, written either as a single
/// space-separated string or as a list.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CspSources {
    One(String),
    Many(Vec<String>),
}

impl CspSources {
    /// Flattens the sources into individual tokens.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            CspSources::One(s) => s.split_whitespace().map(str::to_string).collect(),
            CspSources::Many(v) => v.clone(),
        }
    }
}

impl From<&str> for CspSources {
    fn from(value: &str) -> Self {
        CspSources::One(value.to_string())
    }
}

/// `SameSite` attribute for the CSRF cookie.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Distinguishes a key that is absent (`None`) from one explicitly set to
/// null (`Some(None)`).
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_split_single_string() {
        let sources = CspSources::from("'self' data:");
        assert_eq!(sources.to_vec(), vec!["'self'", "data:"]);
    }

    #[test]
    fn test_sources_keep_list() {
        let sources = CspSources::Many(vec!["'self'".into(), "cdn.example.com".into()]);
        assert_eq!(sources.to_vec(), vec!["'self'", "cdn.example.com"]);
    }
}
