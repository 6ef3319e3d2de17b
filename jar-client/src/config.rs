use std::env;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:memory_jar.sqlite3?mode=rwc";

/// Where the client talks to and where it keeps its local keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_url: String,
    pub database_url: String,
}

impl ClientConfig {
    /// Reads `MEMORY_JAR_SERVER_URL` and `MEMORY_JAR_DATABASE`, falling back
    /// to a local server and a sqlite file in the working directory.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            server_url: non_empty("MEMORY_JAR_SERVER_URL")
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            database_url: non_empty("MEMORY_JAR_DATABASE")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        }
    }

    pub fn with_server_url(mut self, server_url: Option<String>) -> Self {
        if let Some(url) = server_url {
            self.server_url = url;
        }
        self
    }

    pub fn with_database_url(mut self, database_url: Option<String>) -> Self {
        if let Some(url) = database_url {
            self.database_url = url;
        }
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset_or_blank() {
        let vars: HashMap<&str, &str> = [("MEMORY_JAR_SERVER_URL", "  ")].into();
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_env_then_flags() {
        let vars: HashMap<&str, &str> = [
            ("MEMORY_JAR_SERVER_URL", "https://jar.example.com"),
            ("MEMORY_JAR_DATABASE", "sqlite::memory:"),
        ]
        .into();
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.server_url, "https://jar.example.com");

        let config = config
            .with_server_url(Some("http://127.0.0.1:9000".into()))
            .with_database_url(None);
        assert_eq!(config.server_url, "http://127.0.0.1:9000");
        assert_eq!(config.database_url, "sqlite::memory:");
    }
}
