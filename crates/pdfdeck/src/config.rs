use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const FILENAME: &str = "config.yaml";
const APP_DIR: &str = "pdfdeck";

pub const SERVICE_URL_ENV: &str = "PDF_SERVICE_URL";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 64;
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_MAX_TOKENS: u32 = 300;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<NarrationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windowed: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the conversion service. Falls back to PDF_SERVICE_URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_upload_mb: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// API key. If not set, falls back to ANTHROPIC_API_KEY.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR).join(FILENAME))
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow::anyhow!("No config found. Run `pdfdeck config show` to see defaults.")
            } else {
                anyhow::anyhow!("Failed to read config: {e}")
            }
        })?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        let contents = format!("# pdfdeck configuration\n{yaml}");
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "defaults.theme" => {
                match value {
                    "light" | "dark" => {}
                    _ => anyhow::bail!("Invalid theme: {value}. Must be 'light' or 'dark'."),
                }
                self.defaults
                    .get_or_insert_with(DefaultsConfig::default)
                    .theme = Some(value.to_string());
            }
            "defaults.windowed" => {
                self.defaults
                    .get_or_insert_with(DefaultsConfig::default)
                    .windowed = Some(parse_bool(key, value)?);
            }
            "service.url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    anyhow::bail!(
                        "Invalid service.url: {value}. Must start with http:// or https://."
                    );
                }
                self.service
                    .get_or_insert_with(ServiceConfig::default)
                    .url = Some(value.trim_end_matches('/').to_string());
            }
            "service.timeout_secs" => {
                let secs = parse_positive(key, value)?;
                self.service
                    .get_or_insert_with(ServiceConfig::default)
                    .timeout_secs = Some(secs);
            }
            "service.max_upload_mb" => {
                let mb = parse_positive(key, value)?;
                self.service
                    .get_or_insert_with(ServiceConfig::default)
                    .max_upload_mb = Some(mb as usize);
            }
            "narration.enabled" => {
                self.narration
                    .get_or_insert_with(NarrationConfig::default)
                    .enabled = parse_bool(key, value)?;
            }
            "narration.model" => {
                if value.trim().is_empty() {
                    anyhow::bail!("narration.model cannot be empty");
                }
                self.narration
                    .get_or_insert_with(NarrationConfig::default)
                    .model = Some(value.to_string());
            }
            "narration.max_tokens" => {
                let tokens = parse_positive(key, value)?;
                self.narration
                    .get_or_insert_with(NarrationConfig::default)
                    .max_tokens = Some(u32::try_from(tokens)?);
            }
            "narration.api_key" => {
                self.narration
                    .get_or_insert_with(NarrationConfig::default)
                    .api_key = Some(value.to_string());
            }
            _ => anyhow::bail!(
                "Unknown config key: {key}. Valid keys: defaults.theme, defaults.windowed, \
                 service.url, service.timeout_secs, service.max_upload_mb, narration.enabled, \
                 narration.model, narration.max_tokens, narration.api_key"
            ),
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("Invalid value for {key}: {value}. Must be 'true' or 'false'."),
    }
}

fn parse_positive(key: &str, value: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => anyhow::bail!("Invalid value for {key}: {value}. Must be a positive integer."),
    }
}

/// Effective settings, resolved once at startup from the config file and
/// environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub service_url: String,
    pub timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub narration_enabled: bool,
    pub model: String,
    pub max_tokens: u32,
    pub api_key: Option<String>,
    pub theme: Option<String>,
    pub windowed: bool,
}

impl Settings {
    pub fn from_env(config: &Config) -> Self {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    pub fn resolve(config: &Config, env: impl Fn(&str) -> Option<String>) -> Self {
        let service = config.service.clone().unwrap_or_default();
        let narration = config.narration.clone().unwrap_or_default();
        let defaults = config.defaults.clone().unwrap_or_default();

        let service_url = service
            .url
            .filter(|u| !u.is_empty())
            .or_else(|| env(SERVICE_URL_ENV).filter(|u| !u.is_empty()))
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());
        let api_key = narration
            .api_key
            .filter(|k| !k.is_empty())
            .or_else(|| env(API_KEY_ENV).filter(|k| !k.is_empty()));

        Self {
            service_url,
            timeout_secs: service.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            max_upload_bytes: service.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB) * 1024 * 1024,
            narration_enabled: narration.enabled,
            model: narration
                .model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: narration.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            api_key,
            theme: defaults.theme,
            windowed: defaults.windowed.unwrap_or(false),
        }
    }

    pub fn masked_api_key(&self) -> String {
        match &self.api_key {
            None => "(not set)".to_string(),
            Some(key) if key.chars().count() <= 8 => "****".to_string(),
            Some(key) => format!("{}****", key.chars().take(4).collect::<String>()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(&Config::default(), no_env);
        assert_eq!(settings.service_url, DEFAULT_SERVICE_URL);
        assert_eq!(settings.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(settings.max_upload_bytes, 64 * 1024 * 1024);
        assert!(!settings.narration_enabled);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.max_tokens, 300);
        assert!(settings.api_key.is_none());
        assert!(!settings.windowed);
    }

    #[test]
    fn test_env_fallbacks() {
        let env = |name: &str| match name {
            SERVICE_URL_ENV => Some("http://pdf:9000".to_string()),
            API_KEY_ENV => Some("sk-ant-123456789".to_string()),
            _ => None,
        };
        let settings = Settings::resolve(&Config::default(), env);
        assert_eq!(settings.service_url, "http://pdf:9000");
        assert_eq!(settings.masked_api_key(), "sk-a****");
    }

    #[test]
    fn test_config_beats_env() {
        let mut config = Config::default();
        config.set("service.url", "https://convert.example.com/").unwrap();
        let env = |_: &str| Some("http://other".to_string());
        let settings = Settings::resolve(&config, env);
        assert_eq!(settings.service_url, "https://convert.example.com");
    }

    #[test]
    fn test_set_validates() {
        let mut config = Config::default();
        assert!(config.set("defaults.theme", "dark").is_ok());
        assert!(config.set("defaults.theme", "neon").is_err());
        assert!(config.set("service.url", "localhost:8000").is_err());
        assert!(config.set("service.timeout_secs", "0").is_err());
        assert!(config.set("narration.enabled", "maybe").is_err());
        assert!(config.set("narration.enabled", "true").is_ok());
        assert!(config.set("nope", "x").is_err());
        assert!(config.narration.as_ref().unwrap().enabled);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdfdeck").join(FILENAME);

        let mut config = Config::default();
        config.set("service.timeout_secs", "30").unwrap();
        config.set("narration.model", "claude-haiku-4-5").unwrap();
        config.set("defaults.windowed", "yes").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        let settings = Settings::resolve(&loaded, no_env);
        assert_eq!(settings.timeout_secs, 30);
        assert_eq!(settings.model, "claude-haiku-4-5");
        assert!(settings.windowed);
    }

    #[test]
    fn test_missing_file_message() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("No config found"));
    }
}
