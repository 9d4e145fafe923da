use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::llm::backend::{Provider, ProviderSettings};
use crate::llm::request::InferenceOptions;

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProfileConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    profiles: Option<HashMap<String, ProfileConfig>>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot resolve config path: set AIDEMOS_CONFIG or HOME/XDG_CONFIG_HOME.")]
    NoConfigPath,
    #[error("Failed to read config file '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Config file '{path}' does not contain a [profiles] section.")]
    NoProfiles { path: PathBuf },
    #[error("Profile '{name}' not found in config file '{path}'.")]
    ProfileNotFound { name: String, path: PathBuf },
    #[error("Invalid profile provider '{value}'. Supported values: {supported}.")]
    InvalidProfileProvider { value: String, supported: String },
    #[error("Invalid {var} '{value}'. Supported values: {supported}.")]
    InvalidEnvProvider {
        var: &'static str,
        value: String,
        supported: String,
    },
    #[error("Invalid {var} '{value}': expected {expected}.")]
    InvalidEnvValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

pub fn load_profile(name: &str) -> Result<ProfileConfig, ConfigError> {
    let path = config_path()?;
    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    let config: ConfigFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;

    let profiles = config
        .profiles
        .ok_or_else(|| ConfigError::NoProfiles { path: path.clone() })?;

    profiles
        .get(name)
        .cloned()
        .ok_or_else(|| ConfigError::ProfileNotFound {
            name: name.to_string(),
            path,
        })
}

fn config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = non_empty_env("AIDEMOS_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    if let Some(xdg) = non_empty_env("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("aidemos").join("config.toml"));
    }

    let home = non_empty_env("HOME").ok_or(ConfigError::NoConfigPath)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("aidemos")
        .join("config.toml"))
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed_env<T: FromStr>(
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    non_empty_env(var)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidEnvValue {
                    var,
                    value: value.clone(),
                    expected,
                })
        })
        .transpose()
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub profile: Option<String>,
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub region: Option<String>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub inference: InferenceOptions,
}

impl Settings {
    /// Resolves CLI flag > environment > profile > default.
    pub fn resolve(cli: &CliOverrides) -> Result<Self, ConfigError> {
        let profile = match cli.profile.as_deref() {
            Some(name) => load_profile(name)?,
            None => ProfileConfig::default(),
        };

        let profile_provider = profile
            .provider
            .as_deref()
            .map(|value| {
                Provider::parse(value).ok_or_else(|| ConfigError::InvalidProfileProvider {
                    value: value.to_string(),
                    supported: Provider::supported_values(),
                })
            })
            .transpose()?;
        let env_provider = non_empty_env("AIDEMOS_PROVIDER")
            .map(|value| {
                Provider::parse(&value).ok_or_else(|| ConfigError::InvalidEnvProvider {
                    var: "AIDEMOS_PROVIDER",
                    value: value.clone(),
                    supported: Provider::supported_values(),
                })
            })
            .transpose()?;
        let provider = cli
            .provider
            .or(env_provider)
            .or(profile_provider)
            .unwrap_or(Provider::Bedrock);

        let model = cli
            .model
            .clone()
            .or_else(|| non_empty_env("AIDEMOS_MODEL"))
            .or(profile.model)
            .unwrap_or_else(|| provider.default_model().to_string());

        let region = cli
            .region
            .clone()
            .or_else(|| non_empty_env("AIDEMOS_REGION"))
            .or(profile.region)
            .or_else(|| non_empty_env("AWS_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let endpoint = non_empty_env("AIDEMOS_ENDPOINT").or(profile.endpoint);

        let inference = InferenceOptions {
            max_tokens: parsed_env("AIDEMOS_MAX_TOKENS", "a positive integer")?
                .or(profile.max_tokens),
            temperature: parsed_env("AIDEMOS_TEMPERATURE", "a number")?.or(profile.temperature),
        };

        Ok(Self {
            provider: ProviderSettings {
                provider,
                model,
                region,
                endpoint,
            },
            inference,
        })
    }
}
