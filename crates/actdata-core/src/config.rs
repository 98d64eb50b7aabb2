//! Document configuration.
//!
//! Reads overrides from environment variables:
//! - `ACTDATA_UNDO_LIMIT`: maximum number of committed transactions kept on
//!   the undo stack (default: 100)

use serde::{Deserialize, Serialize};

/// Default depth of the undo stack.
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// Environment variable overriding [`DocumentConfig::undo_limit`].
pub const UNDO_LIMIT_ENV: &str = "ACTDATA_UNDO_LIMIT";

/// Per-document settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Maximum number of deltas on the undo stack. Default: 100.
    pub undo_limit: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        DocumentConfig {
            undo_limit: DEFAULT_UNDO_LIMIT,
        }
    }
}

impl DocumentConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = DocumentConfig::default();
        if let Some(raw) = lookup(UNDO_LIMIT_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(limit) => config.undo_limit = limit,
                Err(_) => tracing::warn!(
                    value = %raw,
                    "ignoring unparsable {}",
                    UNDO_LIMIT_ENV
                ),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_undo_limit_is_100() {
        assert_eq!(DocumentConfig::default().undo_limit, 100);
    }

    #[test]
    fn lookup_overrides_undo_limit() {
        let config = DocumentConfig::from_lookup(|key| {
            (key == UNDO_LIMIT_ENV).then(|| "12".to_string())
        });
        assert_eq!(config.undo_limit, 12);
    }

    #[test]
    fn unparsable_override_keeps_default() {
        let config = DocumentConfig::from_lookup(|_| Some("many".to_string()));
        assert_eq!(config.undo_limit, DEFAULT_UNDO_LIMIT);
    }
}
