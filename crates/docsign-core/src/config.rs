//! Signing configuration
//!
//! Layered as defaults, then an optional JSON file, then `DOCSIGN_*`
//! environment variables. Command-line flags are applied on top by the
//! binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shared_crypto::{CryptoProvider, DigestAlgorithm};
use shared_pdf::DEFAULT_PLACEHOLDER_SIZE;
use shared_types::Resolution;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Settings shared by every signing operation of one engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub digest: DigestAlgorithm,
    /// DER capacity reserved for the CMS, in bytes
    pub placeholder_size: usize,
    /// Resolution assumed for captures that carry none
    pub default_resolution: Resolution,
    pub signer_name: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    /// 1-based page for the signature widget; last page when unset
    pub page: Option<u32>,
    /// Add a signing-time signed attribute to the CMS
    pub include_signing_time: bool,
    /// Retry once with a larger placeholder when the CMS does not fit
    pub retry_oversized: bool,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            digest: DigestAlgorithm::Sha256,
            placeholder_size: DEFAULT_PLACEHOLDER_SIZE,
            default_resolution: Resolution::default(),
            signer_name: None,
            reason: None,
            location: None,
            contact_info: None,
            page: None,
            include_signing_time: true,
            retry_oversized: true,
        }
    }
}

impl SigningConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded signing config");
        config.validate()
    }

    /// Defaults, then `file` when given, then the process environment
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match file {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        base.with_env()
    }

    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `DOCSIGN_*` values obtained from `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DOCSIGN_DIGEST") {
            self.digest = value
                .parse()
                .map_err(|reason| invalid("DOCSIGN_DIGEST", &value, reason))?;
        }
        if let Some(value) = lookup("DOCSIGN_PLACEHOLDER_SIZE") {
            self.placeholder_size = parse_number("DOCSIGN_PLACEHOLDER_SIZE", &value)?;
        }
        if let Some(value) = lookup("DOCSIGN_RESOLUTION") {
            self.default_resolution = parse_resolution(&value)?;
        }
        if let Some(value) = lookup("DOCSIGN_PAGE") {
            self.page = Some(parse_number("DOCSIGN_PAGE", &value)?);
        }
        if let Some(value) = lookup("DOCSIGN_SIGNING_TIME") {
            self.include_signing_time = parse_flag("DOCSIGN_SIGNING_TIME", &value)?;
        }
        if let Some(value) = lookup("DOCSIGN_RETRY_OVERSIZED") {
            self.retry_oversized = parse_flag("DOCSIGN_RETRY_OVERSIZED", &value)?;
        }
        for (key, slot) in [
            ("DOCSIGN_SIGNER_NAME", &mut self.signer_name),
            ("DOCSIGN_REASON", &mut self.reason),
            ("DOCSIGN_LOCATION", &mut self.location),
            ("DOCSIGN_CONTACT_INFO", &mut self.contact_info),
        ] {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        }
        self.validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.placeholder_size == 0 {
            return Err(invalid("placeholder_size", "0", "must be positive".into()));
        }
        if self.default_resolution.validate().is_err() {
            let value = format!(
                "{}x{}",
                self.default_resolution.horz, self.default_resolution.vert
            );
            return Err(invalid("default_resolution", &value, "must be positive".into()));
        }
        if self.page == Some(0) {
            return Err(invalid("page", "0", "pages are numbered from 1".into()));
        }
        Ok(self)
    }

    pub fn provider(&self) -> CryptoProvider {
        CryptoProvider::new(self.digest).with_signing_time_attribute(self.include_signing_time)
    }
}

fn invalid(key: &str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected true or false".into())),
    }
}

/// `600` or `600x400`
pub fn parse_resolution(value: &str) -> Result<Resolution, ConfigError> {
    const KEY: &str = "DOCSIGN_RESOLUTION";
    let (horz, vert) = match value.split_once(['x', 'X']) {
        Some((h, v)) => (parse_number(KEY, h)?, parse_number(KEY, v)?),
        None => {
            let dpi = parse_number(KEY, value)?;
            (dpi, dpi)
        }
    };
    Resolution::new(horz, vert).map_err(|e| invalid(KEY, value, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SigningConfig::default();
        assert_eq!(config.digest, DigestAlgorithm::Sha256);
        assert_eq!(config.placeholder_size, 8192);
        assert_eq!(config.default_resolution, Resolution { horz: 600, vert: 600 });
        assert!(config.retry_oversized);
        assert_eq!(config.provider().digest_algorithm(), DigestAlgorithm::Sha256);
        assert!(config.provider().includes_signing_time());

        let without = SigningConfig {
            include_signing_time: false,
            ..SigningConfig::default()
        };
        assert!(!without.provider().includes_signing_time());
    }

    #[test]
    fn test_env_overrides() {
        let config = SigningConfig::default()
            .with_overrides(env(&[
                ("DOCSIGN_DIGEST", "SHA-512"),
                ("DOCSIGN_PLACEHOLDER_SIZE", "16384"),
                ("DOCSIGN_RESOLUTION", "300x200"),
                ("DOCSIGN_REASON", "Approved"),
                ("DOCSIGN_RETRY_OVERSIZED", "off"),
                ("DOCSIGN_LOCATION", ""),
            ]))
            .unwrap();
        assert_eq!(config.digest, DigestAlgorithm::Sha512);
        assert_eq!(config.placeholder_size, 16384);
        assert_eq!(config.default_resolution, Resolution { horz: 300, vert: 200 });
        assert_eq!(config.reason.as_deref(), Some("Approved"));
        assert_eq!(config.location, None);
        assert!(!config.retry_oversized);
    }

    #[test]
    fn test_invalid_env_values() {
        for (key, value) in [
            ("DOCSIGN_DIGEST", "md5"),
            ("DOCSIGN_PLACEHOLDER_SIZE", "lots"),
            ("DOCSIGN_PLACEHOLDER_SIZE", "0"),
            ("DOCSIGN_RESOLUTION", "0x600"),
            ("DOCSIGN_PAGE", "0"),
            ("DOCSIGN_SIGNING_TIME", "maybe"),
        ] {
            let result = SigningConfig::default().with_overrides(env(&[(key, value)]));
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { .. })),
                "{key}={value} accepted"
            );
        }
    }

    #[test]
    fn test_json_file_with_partial_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"digest": "sha512", "reason": "Contract", "page": 2}}"#).unwrap();

        let config = SigningConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.digest, DigestAlgorithm::Sha512);
        assert_eq!(config.reason.as_deref(), Some("Contract"));
        assert_eq!(config.page, Some(2));
        assert_eq!(config.placeholder_size, DEFAULT_PLACEHOLDER_SIZE);
    }

    #[test]
    fn test_json_file_errors() {
        let missing = SigningConfig::from_json_file("/nonexistent/docsign.json");
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            SigningConfig::from_json_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_square_resolution() {
        assert_eq!(parse_resolution("600").unwrap(), Resolution { horz: 600, vert: 600 });
        assert!(parse_resolution("600x").is_err());
    }
}
