use crate::error::{Result, VaultError};
use blob_envelope::EnvelopeKey;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tiered_storage::TieredStorageConfig;

/// Service configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub port: u16,
    pub cache_dir: PathBuf,
    pub remote_dir: PathBuf,
    pub encryption_key: EnvelopeKey,
    /// Idle time after which a cached file is promoted
    pub cold_threshold: Duration,
    /// `None` disables the background sweep
    pub sweep_interval: Option<Duration>,
    pub remote_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl VaultConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Parse configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or(&lookup, "PORT", 3005)?;

        let cache_dir = lookup("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./cache/files"));

        let remote_dir = lookup("REMOTE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./remote/objects"));

        let encryption_key = lookup("ENCRYPTION_KEY")
            .ok_or_else(|| VaultError::Config("ENCRYPTION_KEY is required".to_string()))
            .and_then(|raw| {
                EnvelopeKey::parse(&raw)
                    .map_err(|e| VaultError::Config(format!("ENCRYPTION_KEY: {}", e)))
            })?;

        let cold_threshold = Duration::from_secs(parse_or(&lookup, "COLD_THRESHOLD_SECS", 3600)?);

        let sweep_interval = match parse_or(&lookup, "SWEEP_INTERVAL_SECS", 300)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let remote_timeout = Duration::from_secs(parse_or(&lookup, "REMOTE_TIMEOUT_SECS", 30)?);

        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", 100 * 1024 * 1024)?;

        Ok(Self {
            port,
            cache_dir,
            remote_dir,
            encryption_key,
            cold_threshold,
            sweep_interval,
            remote_timeout,
            max_upload_bytes,
        })
    }

    pub fn storage_config(&self) -> TieredStorageConfig {
        TieredStorageConfig {
            remote_timeout: self.remote_timeout,
            ..TieredStorageConfig::default()
        }
    }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| VaultError::Config(format!("{} has an invalid value: {:?}", name, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const RAW_KEY: &str = "0123456789abcdef0123456789abcdef";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = VaultConfig::from_lookup(lookup(&[("ENCRYPTION_KEY", RAW_KEY)])).unwrap();

        assert_eq!(config.port, 3005);
        assert_eq!(config.cache_dir, PathBuf::from("./cache/files"));
        assert_eq!(config.remote_dir, PathBuf::from("./remote/objects"));
        assert_eq!(config.cold_threshold, Duration::from_secs(3600));
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(300)));
        assert_eq!(config.remote_timeout, Duration::from_secs(30));
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.encryption_key.as_bytes(), RAW_KEY.as_bytes());
    }

    #[test]
    fn test_overrides() {
        let config = VaultConfig::from_lookup(lookup(&[
            ("ENCRYPTION_KEY", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="),
            ("PORT", "8080"),
            ("CACHE_DIR", "/var/cache/vault"),
            ("COLD_THRESHOLD_SECS", "50"),
            ("SWEEP_INTERVAL_SECS", "0"),
            ("REMOTE_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/vault"));
        assert_eq!(config.cold_threshold, Duration::from_secs(50));
        assert_eq!(config.sweep_interval, None);
        assert_eq!(config.encryption_key.as_bytes(), &[0u8; 32]);
        assert_eq!(
            config.storage_config().remote_timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let err = VaultConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(format!("{}", err).contains("ENCRYPTION_KEY is required"));
    }

    #[test]
    fn test_short_key_is_rejected() {
        let err = VaultConfig::from_lookup(lookup(&[("ENCRYPTION_KEY", "too-short")])).unwrap_err();
        assert!(matches!(err, VaultError::Config(_)));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = VaultConfig::from_lookup(lookup(&[
            ("ENCRYPTION_KEY", RAW_KEY),
            ("PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(format!("{}", err).contains("PORT"));
    }
}
