use std::path::PathBuf;

use fresco_store::constants::{DEFAULT_GZIP_LEVEL, DEFAULT_MAX_STORE_BYTES};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub gzip_level: u32,
    pub max_store_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            data_dir: PathBuf::from("./data"),
            gzip_level: DEFAULT_GZIP_LEVEL,
            max_store_bytes: DEFAULT_MAX_STORE_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                config.port = parsed;
            } else {
                tracing::warn!(value = %port, "Invalid PORT, using default");
            }
        }

        if let Ok(dir) = std::env::var("DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        if let Ok(level) = std::env::var("DB_GZIP_LEVEL") {
            match level.parse::<u32>() {
                Ok(n) if (1..=9).contains(&n) => config.gzip_level = n,
                _ => {
                    tracing::warn!(value = %level, "Invalid DB_GZIP_LEVEL, using default");
                }
            }
        }

        if let Ok(bytes) = std::env::var("MAX_STORE_BYTES") {
            if let Ok(n) = bytes.parse::<u64>() {
                config.max_store_bytes = n;
            } else {
                tracing::warn!(value = %bytes, "Invalid MAX_STORE_BYTES, using default");
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.gzip_level, 9);
        assert_eq!(config.max_store_bytes, 1024 * 1024 * 1024);
    }
}
