use std::time::Duration;

/// Connection and pragma configuration for the SQLite backend: a plain
/// struct with a sensible `Default` covering WAL mode, foreign keys, and a
/// 5-second busy timeout.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub db_path: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            db_path: "cadence.db".to_string(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteConfig {
    #[must_use]
    pub fn with_db_path(mut self, db_path: impl Into<String>) -> Self {
        self.db_path = db_path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = SqliteConfig::default();
        assert_eq!(config.db_path, "cadence.db");
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn with_db_path_overrides_only_the_path() {
        let config = SqliteConfig::default().with_db_path("/tmp/test.db");
        assert_eq!(config.db_path, "/tmp/test.db");
        assert_eq!(config.max_connections, 5);
    }
}
