//! Repository configuration, read from the environment.

use tracing::warn;

/// Environment variable holding the commit retry count.
pub const COMMIT_RETRIES_VAR: &str = "CATALOG_COMMIT_RETRIES";

pub const DEFAULT_COMMIT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Extra attempts `execute` makes after an optimistic concurrency
    /// conflict. `0` disables retrying.
    pub max_retries: u32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_COMMIT_RETRIES,
        }
    }
}

impl RepositoryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_retries = match lookup(COMMIT_RETRIES_VAR) {
            None => DEFAULT_COMMIT_RETRIES,
            Some(raw) => raw.trim().parse::<u32>().unwrap_or_else(|_| {
                warn!(
                    var = COMMIT_RETRIES_VAR,
                    value = %raw,
                    default = DEFAULT_COMMIT_RETRIES,
                    "invalid retry count, using default"
                );
                DEFAULT_COMMIT_RETRIES
            }),
        };
        Self { max_retries }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_var_uses_default() {
        let config = RepositoryConfig::from_lookup(|_| None);
        assert_eq!(config, RepositoryConfig::default());
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn parses_retry_count() {
        let config = RepositoryConfig::from_lookup(|key| {
            (key == COMMIT_RETRIES_VAR).then(|| " 7 ".to_string())
        });
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let config = RepositoryConfig::from_lookup(|_| Some("-1".to_string()));
        assert_eq!(config.max_retries, DEFAULT_COMMIT_RETRIES);
    }
}
