//! Server configuration.

use config::{Config, Environment, File};
use reelforge_bootstrap::{BootstrapConfig, DEFAULT_RELEASE_BASE};
use reelforge_core::{CommandPreset, RequestPolicy};
use reelforge_error::{ConfigError, ReelforgeResult};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument};

/// Everything the `reelforge` binary reads from its environment.
///
/// Sources in order of precedence (later sources override earlier):
/// 1. Compiled defaults
/// 2. `reelforge.toml` in the working directory, if present
/// 3. Process environment, e.g. `PORT=4000` sets `port`
#[derive(Debug, Clone, Deserialize, derive_getters::Getters)]
pub struct ServerConfig {
    /// Bind address
    host: String,
    /// Bind port
    port: u16,
    /// Serve HTTPS with `ssl_key` and `ssl_cert`
    https: bool,
    /// PEM private key
    ssl_key: Option<PathBuf>,
    /// PEM certificate chain
    ssl_cert: Option<PathBuf>,
    /// Allow subprocess agents
    enable_command_llm: bool,
    /// Allow outbound HTTP providers
    enable_http_llm: bool,
    /// Path override for the codex CLI
    codex_path: Option<String>,
    /// Path override for the gemini CLI
    gemini_path: Option<String>,
    /// Path override for the cursor agent CLI
    agent_path: Option<String>,
    /// ffmpeg executable
    ffmpeg_path: String,
    /// Use this gateway binary instead of downloading one
    g4f_path: Option<PathBuf>,
    /// Gateway API root
    g4f_api_url: String,
    /// Gateway startup budget in milliseconds, 0 waits forever
    g4f_startup_timeout_ms: u64,
    /// Expected SHA-256 of the gateway release asset
    g4f_sha256: Option<String>,
    /// Gateway release download root
    g4f_release_url: String,
    /// Root for uploads, installed binaries and merge scratch space
    data_dir: PathBuf,
    /// Catalog executable
    catalog_command: String,
    /// Whitespace-separated catalog arguments
    catalog_args: String,
    /// Working directory for the catalog process
    catalog_dir: Option<PathBuf>,
    /// Static UI directory
    public_dir: PathBuf,
    /// Subprocess agent budget in milliseconds
    command_timeout_ms: u64,
    /// Output ceiling per stream for subprocess agents
    max_output_bytes: usize,
    /// Request body ceiling
    max_body_bytes: usize,
    /// Request body ceiling for `/api/merge-videos`
    max_merge_body_bytes: usize,
}

impl ServerConfig {
    /// Load from defaults, `reelforge.toml` and the process environment.
    ///
    /// Call `dotenvy::dotenv()` first so a `.env` file takes part.
    ///
    /// # Errors
    ///
    /// Returns a config error if a value does not parse or HTTPS is enabled
    /// without both key and certificate.
    #[instrument]
    pub fn load() -> ReelforgeResult<Self> {
        debug!("Loading configuration: environment > reelforge.toml > defaults");
        Self::build(
            Some(File::with_name("reelforge").required(false)),
            Environment::default(),
        )
    }

    /// Load from defaults and the given variables only. Intended for tests.
    pub fn from_env_map<I, K, V>(vars: I) -> ReelforgeResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::build(None, Environment::default().source(Some(map)))
    }

    fn build(
        file: Option<File<config::FileSourceFile, config::FileFormat>>,
        env: Environment,
    ) -> ReelforgeResult<Self> {
        let defaults = Config::builder()
            .set_default("host", "127.0.0.1")
            .and_then(|b| b.set_default("port", 3333_i64))
            .and_then(|b| b.set_default("https", false))
            .and_then(|b| b.set_default("enable_command_llm", false))
            .and_then(|b| b.set_default("enable_http_llm", false))
            .and_then(|b| b.set_default("ffmpeg_path", "ffmpeg"))
            .and_then(|b| b.set_default("g4f_api_url", "http://127.0.0.1:1337"))
            .and_then(|b| b.set_default("g4f_startup_timeout_ms", 60_000_i64))
            .and_then(|b| b.set_default("g4f_release_url", DEFAULT_RELEASE_BASE))
            .and_then(|b| b.set_default("data_dir", "./tmp"))
            .and_then(|b| b.set_default("catalog_command", "node"))
            .and_then(|b| b.set_default("catalog_args", "dist/server.js"))
            .and_then(|b| b.set_default("public_dir", "./public"))
            .and_then(|b| b.set_default("command_timeout_ms", 60_000_i64))
            .and_then(|b| b.set_default("max_output_bytes", 2_000_000_i64))
            .and_then(|b| b.set_default("max_body_bytes", 20_000_000_i64))
            .and_then(|b| b.set_default("max_merge_body_bytes", 268_435_456_i64))
            .map_err(|e| ConfigError::new(format!("Invalid default configuration: {}", e)))?;

        let mut builder = defaults;
        if let Some(file) = file {
            builder = builder.add_source(file);
        }

        let config: Self = builder
            .add_source(env)
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ReelforgeResult<()> {
        if self.https && self.tls().is_none() {
            Err(ConfigError::new(
                "HTTPS is enabled but SSL_KEY and SSL_CERT are not both set",
            ))?
        }
        Ok(())
    }

    /// Replace the bind address with command-line values, when given.
    pub fn with_bind(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// `(cert, key)` when HTTPS is on.
    pub fn tls(&self) -> Option<(PathBuf, PathBuf)> {
        if !self.https {
            return None;
        }
        let non_empty = |p: &Option<PathBuf>| p.clone().filter(|p| !p.as_os_str().is_empty());
        Some((non_empty(&self.ssl_cert)?, non_empty(&self.ssl_key)?))
    }

    /// Feature gates and limits for request validation.
    pub fn request_policy(&self) -> RequestPolicy {
        RequestPolicy {
            command_llm: self.enable_command_llm,
            http_llm: self.enable_http_llm,
            ..RequestPolicy::default()
        }
    }

    /// Executable override for a known agent preset.
    pub fn command_override(&self, preset: &CommandPreset) -> Option<&str> {
        let path = match preset {
            CommandPreset::Codex => self.codex_path.as_deref(),
            CommandPreset::Gemini => self.gemini_path.as_deref(),
            CommandPreset::Agent => self.agent_path.as_deref(),
            CommandPreset::Custom(_) => None,
        };
        path.filter(|p| !p.trim().is_empty())
    }

    /// Catalog arguments as a vector.
    pub fn catalog_arg_list(&self) -> Vec<String> {
        self.catalog_args
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Working directory for the catalog process, when set and non-empty.
    pub fn catalog_working_dir(&self) -> Option<&PathBuf> {
        self.catalog_dir.as_ref().filter(|d| !d.as_os_str().is_empty())
    }

    /// Scratch directory for request attachments.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Parent of the per-platform gateway installs.
    pub fn bin_root(&self) -> PathBuf {
        self.data_dir.join("bin")
    }

    /// Parent of the per-call merge scratch directories.
    pub fn merge_dir(&self) -> PathBuf {
        self.data_dir.join("merge")
    }

    /// Subprocess agent budget.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Gateway bootstrap settings.
    pub fn bootstrap_config(&self) -> ReelforgeResult<BootstrapConfig> {
        let mut builder = BootstrapConfig::builder();
        builder
            .api_url(self.g4f_api_url.trim_end_matches('/'))
            .bin_root(self.bin_root())
            .release_base(self.g4f_release_url.clone())
            .startup_timeout(Duration::from_millis(self.g4f_startup_timeout_ms));
        if let Some(sha) = self.g4f_sha256.as_deref().filter(|s| !s.trim().is_empty()) {
            builder.sha256(sha.trim());
        }
        if let Some(path) = self.g4f_path.clone().filter(|p| !p.as_os_str().is_empty()) {
            builder.binary_override(path);
        }
        Ok(builder.build()?)
    }
}
