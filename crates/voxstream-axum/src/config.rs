//! Server configuration.

use serde::{Deserialize, Serialize};

/// CORS policy for the HTTP routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CorsConfig {
    /// Allow any origin (local development).
    #[default]
    AllowAll,
    /// Allow only the listed origins.
    AllowOrigins(Vec<String>),
}

/// Where and how the transport listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9890,
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string for the listener; the host may be a name.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_on_loopback() {
        assert_eq!(ServerConfig::default().address(), "127.0.0.1:9890");
    }

    #[test]
    fn cors_origins_round_trip_through_json() {
        let json = r#"{"port":8080,"cors":{"allowOrigins":["http://localhost:5173"]}}"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(
            config.cors,
            CorsConfig::AllowOrigins(vec!["http://localhost:5173".into()])
        );
    }
}
