// src/config.rs
// Environment-sourced configuration. Read-only after startup.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Process-wide configuration, loaded once from the environment.
pub static CONFIG: Lazy<QuorumConfig> = Lazy::new(QuorumConfig::from_env);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub cors_origins: Vec<String>,
    pub debug: bool,
}

impl QuorumConfig {
    pub fn from_env() -> Self {
        // Don't panic if .env doesn't exist (production reads real env).
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/quorum.db".to_string()),
            qdrant_url: std::env::var("QDRANT_URL")
                .unwrap_or_else(|_| "http://localhost:6334".to_string()),
            qdrant_collection: std::env::var("QDRANT_COLLECTION")
                .unwrap_or_else(|_| "quorum_messages".to_string()),
            cors_origins: parse_cors_origins(
                std::env::var("CORS_ORIGINS").ok().as_deref(),
            ),
            debug: std::env::var("DEBUG")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}

fn parse_cors_origins(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => raw
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect(),
        _ => vec![
            "http://localhost:3000".to_string(),
            "http://127.0.0.1:3000".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_origins_split_on_commas() {
        let origins = parse_cors_origins(Some("http://a.test, http://b.test"));
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn cors_origins_default_to_localhost() {
        let origins = parse_cors_origins(None);
        assert_eq!(origins.len(), 2);
        assert!(origins[0].contains("localhost"));
    }
}
