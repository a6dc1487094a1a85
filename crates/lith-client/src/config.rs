//! Runtime configuration: persisted settings plus environment overrides.

use lith_proto::constants::{DEFAULT_MAX_FRAME_LEN, HISTORY_PAGE_SIZE};

use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Env: `LITH_HOST`
    pub host: String,

    /// Env: `LITH_PORT`
    pub port: u16,

    /// Whether the relay expects TLS.
    /// Env: `LITH_ENCRYPTED` (true/false)
    pub encrypted: bool,

    /// Env: `LITH_PASSPHRASE`
    pub passphrase: String,

    /// Link summary threshold, in characters.
    /// Env: `LITH_URL_THRESHOLD`
    pub url_threshold: usize,

    /// Largest frame the reader will buffer before dropping the connection.
    /// Env: `LITH_MAX_FRAME`
    /// Default: 32 MiB
    pub max_frame_len: usize,

    /// Lines requested per "fetch more" and per buffer during the handshake.
    pub history_page: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ClientConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            encrypted: settings.encrypted,
            passphrase: settings.passphrase.clone(),
            url_threshold: settings.shorten_long_urls_threshold,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            history_page: HISTORY_PAGE_SIZE,
        }
    }

    /// Settings overridden by `LITH_*` environment variables.
    pub fn from_env(settings: &Settings) -> Self {
        Self::from_lookup(settings, |key| std::env::var(key).ok())
    }

    fn from_lookup(settings: &Settings, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::from_settings(settings);

        if let Some(host) = lookup("LITH_HOST") {
            config.host = host;
        }

        if let Some(val) = lookup("LITH_PORT") {
            match val.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => tracing::warn!(value = %val, "Invalid LITH_PORT, using default"),
            }
        }

        if let Some(val) = lookup("LITH_ENCRYPTED") {
            config.encrypted = val != "false" && val != "0";
        }

        if let Some(passphrase) = lookup("LITH_PASSPHRASE") {
            config.passphrase = passphrase;
        }

        if let Some(val) = lookup("LITH_URL_THRESHOLD") {
            match val.parse::<usize>() {
                Ok(n) => config.url_threshold = n,
                Err(_) => tracing::warn!(value = %val, "Invalid LITH_URL_THRESHOLD, using default"),
            }
        }

        if let Some(val) = lookup("LITH_MAX_FRAME") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_frame_len = n,
                _ => tracing::warn!(value = %val, "Invalid LITH_MAX_FRAME, using default"),
            }
        }

        config
    }
}
