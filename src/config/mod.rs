use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::telemetry::TelemetryConfig;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default)]
    pub telemetry_enabled: bool,
    #[serde(default = "default_telemetry_service_name")]
    pub telemetry_service_name: String,
    #[serde(default = "default_telemetry_service_version")]
    pub telemetry_service_version: String,
    #[serde(default = "default_telemetry_environment")]
    pub telemetry_environment: String,
    #[serde(default = "default_telemetry_otlp_endpoint")]
    pub telemetry_otlp_endpoint: String,
}

fn default_app_env() -> String {
    "development".to_string()
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_telemetry_service_name() -> String {
    "tours-api".to_string()
}

fn default_telemetry_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_telemetry_environment() -> String {
    "development".to_string()
}

fn default_telemetry_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(Environment::default())
    }

    fn from_source(source: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("database_max_connections", 5)?
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    /// Error responses only carry internal details outside production.
    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.telemetry_service_name.clone(),
            service_version: self.telemetry_service_version.clone(),
            environment: self.telemetry_environment.clone(),
            otlp_endpoint: self.telemetry_otlp_endpoint.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn source(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_source(source(&[
            ("DATABASE_URL", "postgres://localhost/tours"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.app_env, "development");
        assert!(!config.is_production());
        assert!(!config.telemetry_enabled);
        assert_eq!(config.telemetry().service_name, "tours-api");
    }

    #[test]
    fn test_production_env() {
        let config = AppConfig::from_source(source(&[
            ("DATABASE_URL", "postgres://localhost/tours"),
            ("JWT_SECRET", "secret"),
            ("APP_ENV", "Production"),
            ("DATABASE_MAX_CONNECTIONS", "20"),
        ]))
        .unwrap();

        assert!(config.is_production());
        assert_eq!(config.database_max_connections, 20);
    }

    #[test]
    fn test_missing_database_url() {
        let result = AppConfig::from_source(source(&[("JWT_SECRET", "secret")]));

        assert!(result.is_err());
    }
}
