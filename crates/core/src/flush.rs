//! Flush-mode values
//!
//! `FlushModeType` mirrors the wrapped engine's flush policies one-to-one.
//! The bridge never invents a policy of its own; a session that does not
//! support a member rejects it with `BridgeError::UnsupportedFlushMode`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Flush policy of a persistence session
///
/// Configuration files use the lowercase names (`"auto"`, `"commit"`,
/// `"manual"`, `"always"`). `Display` prints the uppercase engine names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushModeType {
    /// Flush before queries that could observe pending changes, and at commit
    #[default]
    Auto,
    /// Flush only at transaction commit
    Commit,
    /// Flush only when the application asks for it
    Manual,
    /// Flush before every query
    Always,
}

impl FlushModeType {
    /// Every member, in engine declaration order
    pub const ALL: [FlushModeType; 4] = [
        FlushModeType::Auto,
        FlushModeType::Commit,
        FlushModeType::Manual,
        FlushModeType::Always,
    ];

    /// Uppercase engine name
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushModeType::Auto => "AUTO",
            FlushModeType::Commit => "COMMIT",
            FlushModeType::Manual => "MANUAL",
            FlushModeType::Always => "ALWAYS",
        }
    }
}

impl fmt::Display for FlushModeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no flush mode
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown flush mode '{0}', expected one of auto, commit, manual, always")]
pub struct ParseFlushModeError(pub String);

impl FromStr for FlushModeType {
    type Err = ParseFlushModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(FlushModeType::Auto),
            "commit" => Ok(FlushModeType::Commit),
            "manual" => Ok(FlushModeType::Manual),
            "always" => Ok(FlushModeType::Always),
            _ => Err(ParseFlushModeError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_auto() {
        assert_eq!(FlushModeType::default(), FlushModeType::Auto);
    }

    #[test]
    fn test_display_uses_engine_names() {
        assert_eq!(FlushModeType::Manual.to_string(), "MANUAL");
        assert_eq!(FlushModeType::Commit.to_string(), "COMMIT");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("MANUAL".parse::<FlushModeType>(), Ok(FlushModeType::Manual));
        assert_eq!(" commit ".parse::<FlushModeType>(), Ok(FlushModeType::Commit));
        assert_eq!("Always".parse::<FlushModeType>(), Ok(FlushModeType::Always));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "eventually".parse::<FlushModeType>().unwrap_err();
        assert!(err.to_string().contains("eventually"));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&FlushModeType::Manual).unwrap();
        assert_eq!(json, "\"manual\"");
        let back: FlushModeType = serde_json::from_str("\"always\"").unwrap();
        assert_eq!(back, FlushModeType::Always);
    }

    #[test]
    fn test_all_members_listed_once() {
        for (i, a) in FlushModeType::ALL.iter().enumerate() {
            for b in &FlushModeType::ALL[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
