use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Workspace-wide error type.
///
/// Controllers never fail once built: every runtime edge case (dt ≤ 0, empty
/// history, out-of-range phase) has a defined degenerate branch.  Errors only
/// arise while turning configuration into a controller.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SynchroError {
    #[error("Invalid configuration: `{field}` {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Config file error: {0}")]
    ConfigFile(String),
}

impl SynchroError {
    /// Shorthand for [`SynchroError::InvalidConfig`].
    pub fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_display_names_the_field() {
        let err = SynchroError::invalid_config("rate_limit", "must be >= 0 (got -1)");
        let msg = err.to_string();
        assert!(msg.contains("rate_limit"));
        assert!(msg.contains("-1"));
    }

    #[test]
    fn error_serialization_roundtrip() {
        let err = SynchroError::ConfigFile("missing [controller] table".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: SynchroError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
