//! Client for the prompt/tool catalog process.
//!
//! The catalog speaks JSON-RPC 2.0 (Model Context Protocol methods) over a
//! single newline-delimited pipe. The pipe is not safe for interleaved use, so
//! [`CatalogBridge`] runs one call at a time in submission order. The channel
//! is opened lazily on the first call and reopened after a transport failure.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bridge;
mod connector;
mod rpc;

pub use bridge::CatalogBridge;
pub use connector::{CatalogChannel, CatalogConnector, ProcessConnector};
