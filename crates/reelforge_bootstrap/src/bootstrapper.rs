//! The bootstrap state machine and the gateway process it owns.

use crate::{BinaryAsset, BootstrapPhase, DEFAULT_RELEASE_BASE, Platform};
use crate::{download_verified, extract_executable};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reelforge_error::{BootstrapError, BootstrapErrorKind, ConfigError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

const EXECUTABLE_STEM: &str = "g4f";

/// Bootstrap settings.
///
/// # Examples
///
/// ```
/// use reelforge_bootstrap::BootstrapConfig;
/// use std::time::Duration;
///
/// let config = BootstrapConfig::builder()
///     .api_url("http://127.0.0.1:1337")
///     .bin_root("./tmp/bin")
///     .startup_timeout(Duration::ZERO)
///     .build()
///     .unwrap();
/// assert_eq!(*config.probe_interval(), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, derive_builder::Builder, derive_getters::Getters)]
#[builder(setter(into), build_fn(private, name = "build_internal"))]
pub struct BootstrapConfig {
    /// Gateway API root, e.g. `http://127.0.0.1:1337`
    api_url: String,
    /// Parent of the per-platform install directories
    bin_root: PathBuf,
    /// Release download root
    #[builder(default = "DEFAULT_RELEASE_BASE.to_string()")]
    release_base: String,
    /// Expected SHA-256 of the release asset
    #[builder(default, setter(strip_option))]
    sha256: Option<String>,
    /// Use this executable instead of downloading one
    #[builder(default, setter(strip_option))]
    binary_override: Option<PathBuf>,
    /// How long to wait for the health probe; zero waits forever
    #[builder(default = "Duration::from_millis(60_000)")]
    startup_timeout: Duration,
    /// Delay between health probes
    #[builder(default = "Duration::from_millis(500)")]
    probe_interval: Duration,
    /// Target platform for asset lookup
    #[builder(default = "Platform::current()")]
    platform: Platform,
    /// Longest silence tolerated from the release server mid-download
    #[builder(default = "Duration::from_secs(30)")]
    stall_timeout: Duration,
    /// Redirects followed while downloading
    #[builder(default = "5")]
    max_redirects: usize,
}

impl BootstrapConfig {
    /// Start building a config.
    pub fn builder() -> BootstrapConfigBuilder {
        BootstrapConfigBuilder::default()
    }
}

impl BootstrapConfigBuilder {
    /// Build the config.
    ///
    /// # Errors
    ///
    /// Returns a config error if `api_url` or `bin_root` is missing.
    #[track_caller]
    pub fn build(&self) -> Result<BootstrapConfig, ConfigError> {
        self.build_internal()
            .map_err(|e| ConfigError::new(format!("gateway bootstrap: {}", e)))
    }
}

type InFlight = Shared<BoxFuture<'static, Result<String, BootstrapError>>>;

/// Owns the gateway binary, its process and the in-flight bootstrap.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct Bootstrapper {
    inner: Arc<Inner>,
}

struct Inner {
    config: BootstrapConfig,
    client: reqwest::Client,
    probe: reqwest::Client,
    phase: watch::Sender<BootstrapPhase>,
    inflight: Mutex<Option<InFlight>>,
    gateway: Mutex<Option<Child>>,
}

impl std::fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrapper")
            .field("config", &self.inner.config)
            .field("phase", &self.phase())
            .finish()
    }
}

impl Bootstrapper {
    /// Create a bootstrapper. Nothing is downloaded or launched until
    /// [`ensure_ready`](Self::ensure_ready) is called.
    pub fn new(config: BootstrapConfig) -> Result<Self, BootstrapError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| BootstrapError::new(BootstrapErrorKind::Download(e.to_string())))?;
        let probe = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| BootstrapError::new(BootstrapErrorKind::Launch(e.to_string())))?;

        let installed = config.binary_override.as_deref().is_some_and(Path::is_file)
            || config
                .platform
                .release_asset(&config.release_base, &config.bin_root, None)
                .map(|asset| asset.is_installed())
                .unwrap_or(false);
        let initial = if installed {
            BootstrapPhase::Installed
        } else {
            BootstrapPhase::Absent
        };
        let (phase, _) = watch::channel(initial);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                client,
                probe,
                phase,
                inflight: Mutex::new(None),
                gateway: Mutex::new(None),
            }),
        })
    }

    /// Current phase.
    pub fn phase(&self) -> BootstrapPhase {
        *self.inner.phase.borrow()
    }

    /// Watch phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<BootstrapPhase> {
        self.inner.phase.subscribe()
    }

    /// The release asset for the configured platform.
    pub fn asset(&self) -> Result<BinaryAsset, BootstrapError> {
        let config = &self.inner.config;
        config.platform.release_asset(
            &config.release_base,
            &config.bin_root,
            config.sha256.as_deref(),
        )
    }

    /// Make sure the gateway is installed, running and healthy, and return its
    /// API root.
    ///
    /// Concurrent callers await the same bootstrap. A failed bootstrap is not
    /// cached; the next call starts over.
    pub async fn ensure_ready(&self) -> Result<String, BootstrapError> {
        let shared = {
            let mut slot = self.inner.inflight.lock();
            match slot.as_ref() {
                Some(running) => {
                    debug!("Joining in-flight bootstrap");
                    running.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fresh = async move { inner.run().await }.boxed().shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };
        shared.await
    }

    /// Kill the gateway process if this bootstrapper launched one.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let child = self.inner.gateway.lock().take();
        if let Some(mut child) = child {
            info!(pid = ?child.id(), "Stopping gateway");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to stop gateway");
            }
            self.inner.set_phase(BootstrapPhase::Installed);
        }
    }
}

impl Inner {
    fn set_phase(&self, phase: BootstrapPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!(from = %previous, to = %phase, "Bootstrap phase");
        }
    }

    async fn run(self: Arc<Self>) -> Result<String, BootstrapError> {
        let result = self.bootstrap().await;
        if let Err(e) = &result {
            warn!(error = %e, "Gateway bootstrap failed");
            self.set_phase(BootstrapPhase::Failed);
        }
        self.inflight.lock().take();
        result
    }

    #[instrument(skip(self), fields(api_url = %self.config.api_url))]
    async fn bootstrap(&self) -> Result<String, BootstrapError> {
        if self.is_healthy().await {
            debug!("Gateway already healthy");
            self.set_phase(BootstrapPhase::Ready);
            return Ok(self.config.api_url.clone());
        }

        let executable = self.install().await?;
        self.set_phase(BootstrapPhase::Installed);

        self.launch(&executable)?;
        self.wait_healthy().await?;

        info!("Gateway ready");
        self.set_phase(BootstrapPhase::Ready);
        Ok(self.config.api_url.clone())
    }

    async fn install(&self) -> Result<PathBuf, BootstrapError> {
        if let Some(path) = &self.config.binary_override {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(BootstrapError::new(BootstrapErrorKind::Install(format!(
                "G4F_PATH points to a missing file: {}",
                path.display()
            ))));
        }

        let asset = self.config.platform.release_asset(
            &self.config.release_base,
            &self.config.bin_root,
            self.config.sha256.as_deref(),
        )?;
        let install_err = |reason: String| BootstrapError::new(BootstrapErrorKind::Install(reason));
        if asset.is_installed() {
            if !is_executable(&asset.install_path) {
                warn!(path = %asset.install_path.display(), "Installed gateway is not executable; repairing");
                mark_executable(&asset.install_path).map_err(|e| install_err(e.to_string()))?;
            }
            return Ok(asset.install_path);
        }

        let dir = asset
            .install_path
            .parent()
            .ok_or_else(|| install_err(format!("no parent for {}", asset.install_path.display())))?
            .to_path_buf();

        info!(url = %asset.url, platform = %asset.platform_key, "Downloading gateway");
        self.set_phase(BootstrapPhase::Downloading);
        let staged = download_verified(
            &self.client,
            &asset.url,
            &dir,
            asset.sha256.as_deref(),
            self.config.stall_timeout,
            || self.set_phase(BootstrapPhase::Verifying),
        )
        .await?;

        if asset.archive {
            self.set_phase(BootstrapPhase::Extracting);
            let scratch = tempfile::Builder::new()
                .prefix(".extract-")
                .tempdir_in(&dir)
                .map_err(|e| install_err(format!("{}: {}", dir.display(), e)))?;
            let archive_path = staged.path().to_path_buf();
            let scratch_path = scratch.path().to_path_buf();
            let extracted = tokio::task::spawn_blocking(move || {
                extract_executable(&archive_path, &scratch_path, EXECUTABLE_STEM)
            })
            .await
            .map_err(|e| BootstrapError::new(BootstrapErrorKind::Extraction(e.to_string())))??;
            mark_executable(&extracted).map_err(|e| install_err(e.to_string()))?;
            tokio::fs::rename(&extracted, &asset.install_path)
                .await
                .map_err(|e| install_err(format!("{}: {}", asset.install_path.display(), e)))?;
        } else {
            // The install path only ever holds a file that is already executable.
            mark_executable(staged.path()).map_err(|e| install_err(e.to_string()))?;
            staged
                .persist(&asset.install_path)
                .map_err(|e| install_err(format!("{}: {}", asset.install_path.display(), e)))?;
        }

        info!(path = %asset.install_path.display(), "Gateway installed");
        Ok(asset.install_path)
    }

    fn launch(&self, executable: &Path) -> Result<(), BootstrapError> {
        let mut gateway = self.gateway.lock();
        if let Some(child) = gateway.as_mut() {
            if let Ok(None) = child.try_wait() {
                debug!("Gateway process already running");
                self.set_phase(BootstrapPhase::Starting);
                return Ok(());
            }
        }

        let bind = bind_address(&self.config.api_url)?;
        self.set_phase(BootstrapPhase::Starting);
        let child = Command::new(executable)
            .args(["api", "--bind", bind.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BootstrapError::new(BootstrapErrorKind::Launch(format!(
                    "{}: {}",
                    executable.display(),
                    e
                )))
            })?;
        info!(pid = ?child.id(), %bind, "Launched gateway");
        *gateway = Some(child);
        Ok(())
    }

    async fn wait_healthy(&self) -> Result<(), BootstrapError> {
        let started = Instant::now();
        let deadline = self.config.startup_timeout;
        loop {
            self.check_alive()?;
            if self.is_healthy().await {
                return Ok(());
            }
            if !deadline.is_zero() && started.elapsed() >= deadline {
                let stale = self.gateway.lock().take();
                if let Some(mut child) = stale {
                    if let Err(e) = child.start_kill() {
                        debug!(error = %e, "Gateway already gone");
                    }
                }
                return Err(BootstrapError::new(BootstrapErrorKind::StartupTimeout(
                    deadline.as_millis() as u64,
                )));
            }
            tokio::time::sleep(self.config.probe_interval).await;
        }
    }

    /// Fail immediately if the gateway exited instead of polling a dead process.
    fn check_alive(&self) -> Result<(), BootstrapError> {
        let mut gateway = self.gateway.lock();
        let Some(child) = gateway.as_mut() else {
            return Ok(());
        };
        match child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => {
                gateway.take();
                Err(BootstrapError::new(BootstrapErrorKind::ExitedBeforeReady(
                    status.to_string(),
                )))
            }
            Err(e) => Err(BootstrapError::new(BootstrapErrorKind::Launch(e.to_string()))),
        }
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/v1/models", self.config.api_url.trim_end_matches('/'));
        match self.probe.get(&url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(status = %response.status(), "Gateway not ready");
                false
            }
            Err(e) => {
                debug!(error = %e, "Gateway not reachable");
                false
            }
        }
    }
}

fn bind_address(api_url: &str) -> Result<String, BootstrapError> {
    let parsed = url::Url::parse(api_url).map_err(|e| {
        BootstrapError::new(BootstrapErrorKind::Launch(format!("G4F_API_URL '{}': {}", api_url, e)))
    })?;
    let host = parsed.host_str().unwrap_or("127.0.0.1");
    let port = parsed.port_or_known_default().unwrap_or(1337);
    Ok(format!("{}:{}", host, port))
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        assert_eq!(bind_address("http://127.0.0.1:1337").unwrap(), "127.0.0.1:1337");
        assert_eq!(bind_address("http://localhost").unwrap(), "localhost:80");
        assert!(bind_address("not a url").is_err());
    }

    #[test]
    fn test_missing_fields_are_config_errors() {
        let err = BootstrapConfig::builder().api_url("http://x").build().unwrap_err();
        assert!(err.to_string().contains("bin_root"));
    }
}
