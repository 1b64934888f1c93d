//! Configuration, figment-layered: struct defaults → config.toml → `GARITA_`
//! env vars (double underscore = nesting, e.g. `GARITA_SERVER__BASE_URL`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use garita_stream::ChannelConfig;
use serde::{Deserialize, Serialize};

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub stream: StreamFileConfig,
}

/// Server location (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Reconnect pacing (lives under `[stream]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamFileConfig {
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

impl Default for StreamFileConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    30_000
}

/// Resolved runtime configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub data_dir: PathBuf,
    pub channel: ChannelConfig,
}

impl Config {
    /// Layer defaults, `<data_dir>/config.toml`, and `GARITA_` env vars.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let file: FileConfig = Figment::from(Serialized::defaults(FileConfig::default()))
            .merge(Toml::file(data_dir.join("config.toml")))
            .merge(Env::prefixed("GARITA_").split("__"))
            .extract()
            .context("invalid configuration")?;

        let mut base_url = file.server.base_url;
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            base_url,
            data_dir,
            channel: ChannelConfig {
                backoff_base: Duration::from_millis(file.stream.backoff_base_ms),
                backoff_cap: Duration::from_millis(file.stream.backoff_cap_ms),
            },
        })
    }

    /// Main push endpoint (user and company record changes).
    pub fn stream_url(&self) -> String {
        format!("{}/api/stream", self.base_url)
    }

    /// Access-request push endpoint.
    pub fn requests_stream_url(&self) -> String {
        format!("{}/api/solicitudes/stream", self.base_url)
    }

    /// Where the merged user record is persisted for reload survival.
    pub fn profile_path(&self) -> PathBuf {
        self.data_dir.join("usuario.json")
    }

    /// Where the credential token is read from.
    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join("token")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join("garita")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_without_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(config.stream_url(), "http://localhost:8080/api/stream");
        assert_eq!(
            config.requests_stream_url(),
            "http://localhost:8080/api/solicitudes/stream"
        );
        assert_eq!(config.channel.backoff_base, Duration::from_secs(1));
    }

    #[test]
    fn config_toml_overrides_base_url() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[server]\nbase_url = \"https://acceso.example.com/\"\n",
        )
        .unwrap();
        let config = Config::load(Some(dir.path().to_path_buf())).unwrap();
        // Trailing slash is trimmed so URL joins stay clean.
        assert_eq!(config.base_url, "https://acceso.example.com");
    }
}
