use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};
use serde::Deserialize;
use config::Config;
use crate::server::watcher::DebounceSettings;
use crate::utils::error::ChartsError;

/// Configuration settings for the preview server.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// The port on which the server will listen. `0` lets the OS choose.
    pub port: u16,
    /// Interface the listener binds to.
    pub host: String,
    /// Directory under which new workspaces are created.
    pub workspaces_root: PathBuf,
    /// Quiet period a changed file must stay unchanged before a reload fires.
    pub debounce_ms: u64,
    /// How often a pending file is re-checked while it settles.
    pub poll_interval_ms: u64,
    /// Interval between keep-alive comments on the event stream.
    pub keep_alive_secs: u64,
    /// How long stopping waits for open connections before aborting the listener.
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "127.0.0.1".into(),
            workspaces_root: PathBuf::from("workspaces"),
            debounce_ms: 300,
            poll_interval_ms: 100,
            keep_alive_secs: 15,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl ServerConfig {
    /// Loads the server configuration from environment variables.
    ///
    /// Environment variables should be prefixed with `CHARTS_`, e.g. `CHARTS_PORT=4000`.
    /// Anything not set falls back to [`ServerConfig::default`].
    ///
    /// # Errors
    /// Returns a `ChartsError::ConfigurationError` if the configuration cannot be loaded.
    pub fn from_env() -> Result<Self, ChartsError> {
        let defaults = Self::default();

        Config::builder()
            .set_default("port", i64::from(defaults.port))
            .and_then(|b| b.set_default("host", defaults.host.as_str()))
            .and_then(|b| {
                b.set_default(
                    "workspaces_root",
                    defaults.workspaces_root.to_string_lossy().as_ref(),
                )
            })
            .and_then(|b| b.set_default("debounce_ms", defaults.debounce_ms))
            .and_then(|b| b.set_default("poll_interval_ms", defaults.poll_interval_ms))
            .and_then(|b| b.set_default("keep_alive_secs", defaults.keep_alive_secs))
            .and_then(|b| b.set_default("shutdown_grace_ms", defaults.shutdown_grace_ms))
            .map_err(|e| ChartsError::ConfigurationError(e.to_string()))?
            .add_source(config::Environment::with_prefix("CHARTS"))
            .build()
            .map_err(|e| ChartsError::ConfigurationError(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ChartsError::ConfigurationError(e.to_string()))
    }

    /// Validates the configuration settings.
    ///
    /// # Errors
    /// Returns a `ChartsError::ConfigurationError` if validation fails.
    pub fn validate(&self) -> Result<(), ChartsError> {
        if self.debounce_ms == 0 {
            return Err(ChartsError::ConfigurationError(
                "debounce_ms must be greater than 0".into(),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(ChartsError::ConfigurationError(
                "poll_interval_ms must be greater than 0".into(),
            ));
        }

        if self.poll_interval_ms > self.debounce_ms {
            return Err(ChartsError::ConfigurationError(format!(
                "poll_interval_ms ({}) cannot exceed debounce_ms ({})",
                self.poll_interval_ms, self.debounce_ms
            )));
        }

        if self.keep_alive_secs == 0 {
            return Err(ChartsError::ConfigurationError(
                "keep_alive_secs must be greater than 0".into(),
            ));
        }

        self.socket_addr().map(|_| ())
    }

    /// The address the listener binds to.
    ///
    /// # Errors
    /// Returns a `ChartsError::ConfigurationError` if `host` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ChartsError> {
        let ip: IpAddr = self.host.parse().map_err(|_| {
            ChartsError::ConfigurationError(format!("Invalid host: {:?}", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn debounce_settings(&self) -> DebounceSettings {
        DebounceSettings {
            stability_threshold: Duration::from_millis(self.debounce_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
