//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Content type used when neither upstream nor resolver name one.
pub const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Root configuration for the stream relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, session limit).
    pub listener: ListenerConfig,

    /// External resolver invocation.
    pub resolver: ResolverConfig,

    /// Per-stage timeouts.
    pub timeouts: TimeoutConfig,

    /// Relay behaviour (chunking, content type, limits).
    pub relay: RelaySettings,

    /// Generated master playlist settings.
    pub hls: HlsConfig,

    /// Response header policy.
    pub http: HttpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum concurrent relay sessions (backpressure).
    pub max_sessions: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_sessions: 256,
        }
    }
}

/// How the resolver process is invoked.
///
/// The command line is `program extra_args... -f format --get-url -- target`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Resolver executable (looked up on `PATH` when not absolute).
    pub program: String,

    /// Format selector passed with `-f`.
    pub format: String,

    /// Arguments placed before the format selector.
    pub extra_args: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            format: "best[protocol=m3u8]/best".to_string(),
            extra_args: vec![
                "--no-warnings".to_string(),
                "--socket-timeout".to_string(),
                "15".to_string(),
            ],
        }
    }
}

/// Timeout configuration, one bound per suspension point.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for the resolver process in milliseconds.
    pub resolve_ms: u64,

    /// Upstream connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Upstream read timeout (headers and each body chunk) in milliseconds.
    pub read_ms: u64,

    /// Time the downstream client may take to accept one chunk, in milliseconds.
    pub write_ms: u64,

    /// Time in-flight requests get to finish after a shutdown signal.
    pub drain_ms: u64,
}

impl TimeoutConfig {
    pub fn resolve(&self) -> Duration {
        Duration::from_millis(self.resolve_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_millis(self.drain_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            resolve_ms: 30_000,
            connect_ms: 5_000,
            read_ms: 15_000,
            write_ms: 30_000,
            drain_ms: 10_000,
        }
    }
}

/// Relay behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Largest chunk handed to the downstream writer, in bytes.
    pub chunk_size: usize,

    /// Content type used when upstream does not report one.
    pub default_content_type: String,

    /// Longest accepted target identifier, in bytes.
    pub max_target_len: usize,

    /// User-Agent sent upstream.
    pub user_agent: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024,
            default_content_type: HLS_CONTENT_TYPE.to_string(),
            max_target_len: 2048,
            user_agent: concat!("stream-relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Master playlist generation for `/m3u8/{id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HlsConfig {
    /// Prefix the sanitized video id is appended to.
    pub watch_url_base: String,

    /// BANDWIDTH attribute of the single variant.
    pub variant_bandwidth: u64,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            watch_url_base: "https://www.youtube.com/watch?v=".to_string(),
            variant_bandwidth: 8_000_000,
        }
    }
}

/// Response header policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Add `Access-Control-Allow-Origin: *` to every response.
    pub cors_allow_any: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            cors_allow_any: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
