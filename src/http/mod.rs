//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, handlers)
//!     → request.rs (request ID, query extraction)
//!     → relay subsystem (resolve, open upstream, pump)
//!     → response.rs (status, forwarded headers, streamed body)
//!       or playlist.rs (generated master playlist)
//!     → Send to client
//! ```

pub mod playlist;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRelayRequestId, X_REQUEST_ID};
pub use server::HttpServer;
