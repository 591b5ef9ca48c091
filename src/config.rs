//! Configuration management for Shelf Server

use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    /// Directory used by the local provider
    pub path: String,
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Local,
    Minio,
    R2,
    S3,
    B2,
}

impl StorageProvider {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "minio" => StorageProvider::Minio,
            "r2" => StorageProvider::R2,
            "s3" => StorageProvider::S3,
            "b2" => StorageProvider::B2,
            _ => StorageProvider::Local,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Largest accepted upload body, in bytes
    pub max_upload_bytes: usize,
    /// Upper bound on each blob write
    pub blob_write_timeout_secs: u64,
}

impl IngestConfig {
    pub fn blob_write_timeout(&self) -> Duration {
        Duration::from_secs(self.blob_write_timeout_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 100 * 1024 * 1024,
            blob_write_timeout_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                provider: StorageProvider::Local,
                path: "./data/blobs".to_string(),
                endpoint: "http://localhost:9000".to_string(),
                bucket: "library".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
            },
            database: DatabaseConfig {
                url: "sqlite:./shelf.db".to_string(),
            },
            ingest: IngestConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// S3 variables are only required when an S3-compatible provider is
    /// selected.
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Config::default();
        let provider = StorageProvider::parse(
            &env::var("STORAGE_PROVIDER").unwrap_or_else(|_| "local".to_string()),
        );

        let s3_var = |name: &str, fallback: &str| -> Result<String, env::VarError> {
            match provider {
                StorageProvider::Local => Ok(env::var(name).unwrap_or_else(|_| fallback.to_string())),
                _ => env::var(name),
            }
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.server.port),
            },
            storage: StorageConfig {
                provider,
                path: env::var("STORAGE_PATH").unwrap_or(defaults.storage.path),
                endpoint: s3_var("S3_ENDPOINT", &defaults.storage.endpoint)?,
                bucket: s3_var("S3_BUCKET", &defaults.storage.bucket)?,
                access_key: s3_var("S3_ACCESS_KEY", &defaults.storage.access_key)?,
                secret_key: s3_var("S3_SECRET_KEY", &defaults.storage.secret_key)?,
                region: env::var("S3_REGION").ok().or(defaults.storage.region),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            ingest: IngestConfig {
                max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.ingest.max_upload_bytes),
                blob_write_timeout_secs: env::var("BLOB_WRITE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.ingest.blob_write_timeout_secs),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.provider, StorageProvider::Local);
        assert_eq!(config.database.url, "sqlite:./shelf.db");
        assert_eq!(config.ingest.max_upload_bytes, 104_857_600);
        assert_eq!(config.ingest.blob_write_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(StorageProvider::parse("R2"), StorageProvider::R2);
        assert_eq!(StorageProvider::parse("minio"), StorageProvider::Minio);
        assert_eq!(StorageProvider::parse("anything"), StorageProvider::Local);
    }
}
