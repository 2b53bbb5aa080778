//! HTTP gateway for the Reelforge orchestrator.
//!
//! Wires the provider dispatcher, the catalog bridge, the gateway
//! bootstrapper and the extension queue behind an axum router.
//!
//! # Example
//!
//! ```no_run
//! use reelforge_server::{AppState, ServerConfig, router};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::load()?;
//! let state = AppState::from_config(&config)?;
//! let app = router(state, &config);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3333").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod backends;
mod config;
mod dispatcher;
mod queue;
mod state;

pub use api::{ApiError, router, status_for};
pub use backends::{ChatTarget, FetchedImage, HttpBackends, MAX_PROXY_IMAGE_BYTES};
pub use config::ServerConfig;
pub use dispatcher::{
    CliDiagnostic, Dispatcher, DispatcherBuilder, GatewayStatus, GenerationMode, Generated,
};
pub use queue::ExtensionQueue;
pub use state::AppState;
