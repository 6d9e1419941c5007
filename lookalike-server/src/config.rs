//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use lookalike_core::{
    MatchConfig, DEFAULT_MAX_DESCRIPTOR_DISTANCE, DEFAULT_MIN_FEATURE_MATCHES,
    DEFAULT_NEAR_MATCH_THRESHOLD,
};

use crate::validation::DEFAULT_MAX_FILE_SIZE;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 5000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 50)
    pub body_limit_mb: usize,
    /// Maximum file size per upload in MB (default: 25)
    pub max_file_size_mb: usize,
    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL URL for the corpus store; in-memory when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 10)
    pub database_max_connections: u32,
    /// Reference image folder, synced at startup and served at /our_images
    pub reference_dir: PathBuf,
    /// Where uploads are kept; not persisted when unset
    pub upload_dir: Option<PathBuf>,
    /// Minimum near-hash similarity score (default: 75)
    pub near_match_threshold: f64,
    /// Minimum good keypoint matches for a feature match (default: 30)
    pub min_feature_matches: usize,
    /// Descriptor distance cutoff for a good keypoint match (default: 50)
    pub feature_max_distance: u32,
    /// Per-upload matching budget in seconds (default: 30)
    pub match_deadline_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 50,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE / (1024 * 1024),
            timeout_secs: 60,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 10,
            reference_dir: PathBuf::from("our_images"),
            upload_dir: None,
            near_match_threshold: DEFAULT_NEAR_MATCH_THRESHOLD,
            min_feature_matches: DEFAULT_MIN_FEATURE_MATCHES,
            feature_max_distance: DEFAULT_MAX_DESCRIPTOR_DISTANCE,
            match_deadline_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty());

        let reference_dir = std::env::var("REFERENCE_DIR")
            .ok()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.reference_dir);

        let upload_dir = std::env::var("UPLOAD_DIR")
            .ok()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        Self {
            port,
            host,
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB").unwrap_or(defaults.body_limit_mb),
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB").unwrap_or(defaults.max_file_size_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC")
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            reference_dir,
            upload_dir,
            near_match_threshold: env_parse("NEAR_MATCH_THRESHOLD")
                .unwrap_or(defaults.near_match_threshold),
            min_feature_matches: env_parse("FEATURE_MIN_MATCHES")
                .unwrap_or(defaults.min_feature_matches),
            feature_max_distance: env_parse("FEATURE_MAX_DISTANCE")
                .unwrap_or(defaults.feature_max_distance),
            match_deadline_secs: env_parse("MATCH_DEADLINE_SECS")
                .unwrap_or(defaults.match_deadline_secs),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Per-upload matching budget. Zero disables the deadline.
    pub fn match_deadline(&self) -> Option<Duration> {
        (self.match_deadline_secs > 0).then(|| Duration::from_secs(self.match_deadline_secs))
    }

    /// Cascade settings derived from this configuration
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            near_match_threshold: self.near_match_threshold,
            min_feature_matches: self.min_feature_matches,
            deadline: self.match_deadline(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.reference_dir, PathBuf::from("our_images"));
        assert!(config.upload_dir.is_none());
        assert!(config.database_url.is_none());
        assert!(!config.rate_limit_enabled);
    }

    #[test]
    fn test_socket_addr() {
        let config = Config {
            host: [0, 0, 0, 0],
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_match_config_from_defaults() {
        let match_config = Config::default().match_config();
        assert_eq!(match_config.near_match_threshold, 75.0);
        assert_eq!(match_config.min_feature_matches, 30);
        assert_eq!(match_config.deadline, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_deadline_disables_budget() {
        let config = Config {
            match_deadline_secs: 0,
            ..Config::default()
        };
        assert!(config.match_deadline().is_none());
    }
}
