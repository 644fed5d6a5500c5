//! Storage mode selection
//!
//! The mode is resolved once per process from an explicit choice or, failing
//! that, from whether the managed-store credential is present in a snapshot of
//! the environment. Nothing downstream looks at the credential again to decide
//! which backend to use.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Environment variable holding the managed store access key
pub const DEFAULT_CREDENTIAL_VAR: &str = "HOPSWORKS_API_KEY";

/// Which backend the pipeline runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// File-backed store on the local disk
    #[serde(rename = "local")]
    Local,
    /// Managed feature store and model registry
    #[serde(rename = "production", alias = "remote")]
    Remote,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Remote => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Mode::Local),
            "production" | "remote" => Ok(Mode::Remote),
            other => Err(StoreError::Validation(format!(
                "Invalid mode: {}. Must be 'local' or 'production'",
                other
            ))),
        }
    }
}

/// Immutable copy of the process environment taken at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Non-unicode entries are skipped.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Build a snapshot from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// The value of `key` unless it is unset or blank
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }
}

/// Decides between [`Mode::Local`] and [`Mode::Remote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeResolver {
    credential_var: String,
}

impl Default for ModeResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL_VAR)
    }
}

impl ModeResolver {
    pub fn new(credential_var: impl Into<String>) -> Self {
        Self {
            credential_var: credential_var.into(),
        }
    }

    pub fn credential_var(&self) -> &str {
        &self.credential_var
    }

    /// An explicit mode wins verbatim; otherwise a present credential means remote.
    ///
    /// The explicit mode is not checked against the credential. A remote mode
    /// without a usable key fails later, when the backend connects.
    pub fn resolve(&self, explicit: Option<Mode>, env: &EnvSnapshot) -> Mode {
        if let Some(mode) = explicit {
            return mode;
        }
        if env.non_empty(&self.credential_var).is_some() {
            Mode::Remote
        } else {
            Mode::Local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, &[], Mode::Local)]
    #[case(None, &[("HOPSWORKS_API_KEY", "abc123")], Mode::Remote)]
    #[case(None, &[("HOPSWORKS_API_KEY", "   ")], Mode::Local)]
    #[case(None, &[("OTHER_KEY", "abc123")], Mode::Local)]
    #[case(Some(Mode::Local), &[("HOPSWORKS_API_KEY", "abc123")], Mode::Local)]
    #[case(Some(Mode::Remote), &[], Mode::Remote)]
    fn test_resolve(
        #[case] explicit: Option<Mode>,
        #[case] vars: &[(&str, &str)],
        #[case] expected: Mode,
    ) {
        let env = EnvSnapshot::from_pairs(vars.iter().copied());
        assert_eq!(ModeResolver::default().resolve(explicit, &env), expected);
    }

    #[test]
    fn test_custom_credential_var() {
        let env = EnvSnapshot::from_pairs([("FEATURE_STORE_TOKEN", "t0k3n")]);
        let resolver = ModeResolver::new("FEATURE_STORE_TOKEN");
        assert_eq!(resolver.resolve(None, &env), Mode::Remote);
        assert_eq!(ModeResolver::default().resolve(None, &env), Mode::Local);
    }

    #[rstest]
    #[case("local", Mode::Local)]
    #[case("production", Mode::Remote)]
    #[case(" Remote ", Mode::Remote)]
    fn test_parse_mode(#[case] text: &str, #[case] expected: Mode) {
        assert_eq!(text.parse::<Mode>().unwrap(), expected);
    }

    #[test]
    fn test_parse_mode_rejects_unknown() {
        let err = "staging".parse::<Mode>().unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_display_uses_cli_names() {
        assert_eq!(Mode::Local.to_string(), "local");
        assert_eq!(Mode::Remote.to_string(), "production");
    }
}
