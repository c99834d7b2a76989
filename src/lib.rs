//! Stream relay library.
//!
//! Resolves a video page URL to a direct media URL with an external resolver
//! and relays that media stream to the caller.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::{Relay, RelayError};
