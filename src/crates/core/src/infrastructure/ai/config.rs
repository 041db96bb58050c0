//! Client configuration: defaults, TOML files and `TARX_*` environment overrides.

use crate::util::errors::{TarxError, TarxResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LOCAL_SERVER_URL: &str = "http://localhost:11435";
pub const DEFAULT_MESH_API_URL: &str = "http://localhost:11436";
pub const DEFAULT_MODEL: &str = "tx-16g";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;

pub const ENV_LOCAL_SERVER_URL: &str = "TARX_LOCAL_SERVER_URL";
pub const ENV_MESH_API_URL: &str = "TARX_MESH_API_URL";
pub const ENV_ENABLE_MESH_ROUTING: &str = "TARX_ENABLE_MESH_ROUTING";
pub const ENV_ENABLE_CLOUD_FALLBACK: &str = "TARX_ENABLE_CLOUD_FALLBACK";
pub const ENV_MODEL: &str = "TARX_MODEL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "TARX_REQUEST_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TarxClientConfig {
    pub local_server_url: String,
    pub mesh_api_url: String,
    pub enable_mesh_routing: bool,
    pub enable_cloud_fallback: bool,
    pub model: String,
    pub request_timeout_ms: u64,
}

impl Default for TarxClientConfig {
    fn default() -> Self {
        Self {
            local_server_url: DEFAULT_LOCAL_SERVER_URL.to_string(),
            mesh_api_url: DEFAULT_MESH_API_URL.to_string(),
            enable_mesh_routing: true,
            enable_cloud_fallback: false,
            model: DEFAULT_MODEL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl TarxClientConfig {
    pub fn from_toml_str(content: &str) -> TarxResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> TarxResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded client config: path={}", path.display());
        Ok(config)
    }

    /// `<config dir>/tarx/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tarx").join("config.toml"))
    }

    /// Loads the default config file when present, otherwise the defaults.
    pub fn load_default() -> TarxResult<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; unparsable values are ignored with a warning.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_LOCAL_SERVER_URL) {
            self.local_server_url = url;
        }
        if let Some(url) = lookup(ENV_MESH_API_URL) {
            self.mesh_api_url = url;
        }
        if let Some(raw) = lookup(ENV_ENABLE_MESH_ROUTING) {
            match parse_flag(&raw) {
                Some(flag) => self.enable_mesh_routing = flag,
                None => warn!("Ignoring invalid {}: {}", ENV_ENABLE_MESH_ROUTING, raw),
            }
        }
        if let Some(raw) = lookup(ENV_ENABLE_CLOUD_FALLBACK) {
            match parse_flag(&raw) {
                Some(flag) => self.enable_cloud_fallback = flag,
                None => warn!("Ignoring invalid {}: {}", ENV_ENABLE_CLOUD_FALLBACK, raw),
            }
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.model = model;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.request_timeout_ms = ms,
                Err(_) => warn!("Ignoring invalid {}: {}", ENV_REQUEST_TIMEOUT_MS, raw),
            }
        }
        self
    }

    pub fn validate(&self) -> TarxResult<()> {
        validate_url("localServerUrl", &self.local_server_url)?;
        validate_url("meshApiUrl", &self.mesh_api_url)?;
        if self.model.trim().is_empty() {
            return Err(TarxError::config("model must not be empty"));
        }
        if self.request_timeout_ms == 0 {
            return Err(TarxError::config("requestTimeoutMs must be greater than 0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn local_endpoint(&self, path: &str) -> String {
        join_url(&self.local_server_url, path)
    }

    pub fn mesh_endpoint(&self, path: &str) -> String {
        join_url(&self.mesh_api_url, path)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn validate_url(field: &str, value: &str) -> TarxResult<()> {
    let url = reqwest::Url::parse(value)
        .map_err(|e| TarxError::config(format!("{} is not a valid URL ({}): {}", field, value, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(TarxError::config(format!(
            "{} must use http or https, got {}",
            field, other
        ))),
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = TarxClientConfig::default();
        assert_eq!(config.local_server_url, "http://localhost:11435");
        assert_eq!(config.mesh_api_url, "http://localhost:11436");
        assert!(config.enable_mesh_routing);
        assert!(!config.enable_cloud_fallback);
        assert_eq!(config.model, "tx-16g");
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        config.validate().expect("defaults should validate");
    }

    #[test]
    fn toml_uses_camel_case_and_fills_missing_fields() {
        let config = TarxClientConfig::from_toml_str(
            r#"
            meshApiUrl = "http://10.0.0.2:11436/"
            enableMeshRouting = false
            requestTimeoutMs = 5000
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.mesh_api_url, "http://10.0.0.2:11436/");
        assert!(!config.enable_mesh_routing);
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.local_server_url, DEFAULT_LOCAL_SERVER_URL);
        assert_eq!(
            config.mesh_endpoint("/mesh/status"),
            "http://10.0.0.2:11436/mesh/status"
        );
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = TarxClientConfig::from_toml_str("requestTimeoutMs = \"soon\"")
            .expect_err("wrong type should fail");
        assert!(matches!(err, TarxError::Config(_)));
    }

    #[test]
    fn env_overrides_apply_and_skip_garbage() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_MODEL, "tx-8g"),
            (ENV_ENABLE_CLOUD_FALLBACK, "yes"),
            (ENV_ENABLE_MESH_ROUTING, "maybe"),
            (ENV_REQUEST_TIMEOUT_MS, "-1"),
        ]);
        let config = TarxClientConfig::default()
            .with_overrides_from(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.model, "tx-8g");
        assert!(config.enable_cloud_fallback);
        assert!(config.enable_mesh_routing);
        assert_eq!(config.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = TarxClientConfig::default();
        config.local_server_url = "localhost:11435".to_string();
        assert!(config.validate().is_err());

        let mut config = TarxClientConfig::default();
        config.request_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = TarxClientConfig::default();
        config.model = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
