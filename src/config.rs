use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::{AudioInEncoding, AudioOutEncoding, AudioSettings};
use crate::backend::{ChannelTarget, ProtocolRevision, ASSISTANT_SCOPE, DEFAULT_ENDPOINT};
use crate::session::{DeviceIdentity, DialogState};

/// Prefix of environment overrides, e.g. `ASSISTANT__SERVICE__ENDPOINT`
const ENV_PREFIX: &str = "ASSISTANT";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    pub device: DeviceConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub revision: ProtocolRevision,
    #[serde(default = "default_language_code")]
    pub language_code: String,
    /// Conversation deadline in seconds, 0 = unlimited
    #[serde(default)]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub device_id: String,
    pub device_model_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub in_encoding: AudioInEncoding,
    #[serde(default = "default_sample_rate")]
    pub in_sample_rate_hz: i32,
    #[serde(default)]
    pub out_encoding: AudioOutEncoding,
    #[serde(default = "default_sample_rate")]
    pub out_sample_rate_hz: i32,
    #[serde(default = "default_volume_pct")]
    pub volume_pct: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Client secret JSON of an installed application
    pub client_secret_path: Option<PathBuf>,
    #[serde(default = "default_callback_bind")]
    pub callback_bind: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_service_name() -> String {
    "assistant-session".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_language_code() -> String {
    "en-US".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_sample_rate() -> i32 {
    16000
}

fn default_volume_pct() -> i32 {
    100
}

fn default_callback_bind() -> String {
    "127.0.0.1:25480".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![ASSISTANT_SCOPE.to_string()]
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            endpoint: default_endpoint(),
            revision: ProtocolRevision::default(),
            language_code: default_language_code(),
            timeout_secs: 0,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            in_encoding: AudioInEncoding::default(),
            in_sample_rate_hz: default_sample_rate(),
            out_encoding: AudioOutEncoding::default(),
            out_sample_rate_hz: default_sample_rate(),
            volume_pct: default_volume_pct(),
        }
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_secret_path: None,
            callback_bind: default_callback_bind(),
            scopes: default_scopes(),
        }
    }
}

impl Config {
    /// Load from a config file (extension optional) plus `ASSISTANT__*` overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Cannot load config from {}", path))?;

        let cfg: Self = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.audio_settings()?;

        Ok(cfg)
    }

    pub fn audio_settings(&self) -> Result<AudioSettings> {
        AudioSettings::new(
            self.audio.in_encoding,
            self.audio.in_sample_rate_hz,
            self.audio.out_encoding,
            self.audio.out_sample_rate_hz,
            self.audio.volume_pct,
        )
        .context("Invalid audio settings")
    }

    pub fn device_identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(&self.device.device_id, &self.device.device_model_id)
    }

    pub fn dialog_state(&self) -> DialogState {
        DialogState::new(&self.service.language_code)
    }

    pub fn channel_target(&self) -> ChannelTarget {
        ChannelTarget {
            endpoint: self.service.endpoint.clone(),
            scopes: self.oauth.scopes.clone(),
            revision: self.service.revision,
            connect_timeout: Duration::from_secs(self.service.connect_timeout_secs),
        }
    }

    /// Conversation deadline; `None` when unlimited
    pub fn conversation_timeout(&self) -> Option<Duration> {
        match self.service.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn callback_addr(&self) -> Result<SocketAddr> {
        self.oauth
            .callback_bind
            .parse()
            .with_context(|| format!("Invalid callback_bind {}", self.oauth.callback_bind))
    }
}
