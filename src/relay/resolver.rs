//! External resolver invocation.
//!
//! # Responsibilities
//! - Build the resolver command line for a target
//! - Run it under a deadline, killing the child on timeout or cancellation
//! - Turn stdout into a [`ResolvedUpstream`]
//!
//! The child is spawned with `kill_on_drop`, so a request future dropped
//! mid-resolution (client gone, server shutdown) takes the process down too.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use url::Url;

use crate::config::{ResolverConfig, HLS_CONTENT_TYPE};
use crate::observability::metrics;
use crate::relay::error::ResolveError;
use crate::relay::Target;

/// Direct media URL produced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUpstream {
    pub url: Url,
    /// Content type implied by the URL itself, if any.
    pub content_type: Option<&'static str>,
}

impl ResolvedUpstream {
    fn from_url(url: Url) -> Self {
        let content_type = url
            .path()
            .to_ascii_lowercase()
            .ends_with(".m3u8")
            .then_some(HLS_CONTENT_TYPE);
        Self { url, content_type }
    }
}

/// Runs the configured resolver program.
#[derive(Debug, Clone)]
pub struct Resolver {
    config: ResolverConfig,
    timeout: Duration,
}

impl Resolver {
    pub fn new(config: ResolverConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    /// Arguments for one invocation. `--` keeps a target starting with `-`
    /// from being read as an option.
    pub fn args(&self, target: &Target) -> Vec<String> {
        let mut args = self.config.extra_args.clone();
        args.extend([
            "-f".to_string(),
            self.config.format.clone(),
            "--get-url".to_string(),
            "--".to_string(),
            target.as_str().to_string(),
        ]);
        args
    }

    /// Resolve a target to its direct media URL.
    pub async fn resolve(&self, target: &Target) -> Result<ResolvedUpstream, ResolveError> {
        let started = Instant::now();
        let result = self.run(target).await;
        metrics::record_resolution(result.is_ok(), started);
        result
    }

    async fn run(&self, target: &Target) -> Result<ResolvedUpstream, ResolveError> {
        let mut child = Command::new(&self.config.program)
            .args(self.args(target))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let finished = tokio::time::timeout(self.timeout, async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (out_res, err_res, status) = tokio::join!(
                read_all(stdout.as_mut(), &mut out),
                read_all(stderr.as_mut(), &mut err),
                child.wait(),
            );
            out_res?;
            err_res?;
            Ok::<_, std::io::Error>((status?, out, err))
        })
        .await;

        let (status, out, err) = match finished {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    target_url = %target,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Resolver timed out, killing process"
                );
                if let Err(e) = child.kill().await {
                    tracing::error!(error = %e, "Failed to kill resolver process");
                }
                return Err(ResolveError::TimedOut);
            }
        };

        parse_output(status, &out, &err)
    }
}

async fn read_all<R>(reader: Option<&mut R>, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match reader {
        Some(reader) => reader.read_to_end(buf).await,
        None => Ok(0),
    }
}

fn parse_output(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Result<ResolvedUpstream, ResolveError> {
    if !status.success() {
        let stderr = String::from_utf8_lossy(stderr).trim().to_string();
        tracing::error!(status = %status, stderr = %stderr, "Resolver failed");
        return Err(ResolveError::Exited {
            status: status.to_string(),
            stderr,
        });
    }

    // Split formats print one URL per line; the first is the one we relay.
    let stdout = String::from_utf8_lossy(stdout);
    let Some(line) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Err(ResolveError::NoStream);
    };

    match Url::parse(line) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Ok(ResolvedUpstream::from_url(url))
        }
        _ => Err(ResolveError::InvalidUrl(line.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Resolver {
        Resolver::new(
            ResolverConfig {
                program: "sh".into(),
                format: "best".into(),
                extra_args: vec!["-c".into(), script.into(), "resolver".into()],
            },
            Duration::from_secs(5),
        )
    }

    fn target() -> Target {
        Target::parse("https://example.com/watch?v=abc", 2048).unwrap()
    }

    #[test]
    fn args_follow_contract() {
        let resolver = Resolver::new(ResolverConfig::default(), Duration::from_secs(1));
        let args = resolver.args(&target());
        assert_eq!(
            &args[args.len() - 5..],
            [
                "-f",
                "best[protocol=m3u8]/best",
                "--get-url",
                "--",
                "https://example.com/watch?v=abc"
            ]
        );
    }

    #[tokio::test]
    async fn first_line_is_used() {
        let resolver = sh("printf '\\nhttps://cdn.example.com/v.m3u8\\nhttps://cdn.example.com/a.m4a\\n'");
        let resolved = resolver.resolve(&target()).await.unwrap();
        assert_eq!(resolved.url.as_str(), "https://cdn.example.com/v.m3u8");
        assert_eq!(resolved.content_type, Some(HLS_CONTENT_TYPE));
    }

    #[tokio::test]
    async fn target_is_last_argument() {
        let resolver = sh("test \"$3\" = --get-url && test \"$5\" = 'https://example.com/watch?v=abc' && echo https://cdn.example.com/v.ts");
        let resolved = resolver.resolve(&target()).await.unwrap();
        assert_eq!(resolved.content_type, None);
    }

    #[tokio::test]
    async fn empty_output_is_not_found() {
        let err = sh("true").resolve(&target()).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoStream));
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_stderr() {
        let err = sh("echo 'ERROR: unsupported URL' >&2; exit 1")
            .resolve(&target())
            .await
            .unwrap_err();
        match err {
            ResolveError::Exited { stderr, .. } => assert_eq!(stderr, "ERROR: unsupported URL"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_output_is_rejected() {
        let err = sh("echo 'not a url'").resolve(&target()).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let resolver = Resolver::new(
            ResolverConfig {
                program: "/nonexistent/resolver-binary".into(),
                ..ResolverConfig::default()
            },
            Duration::from_secs(1),
        );
        let err = resolver.resolve(&target()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Spawn(_)));
    }

    #[tokio::test]
    async fn slow_resolver_times_out() {
        let mut resolver = sh("exec sleep 30");
        resolver.timeout = Duration::from_millis(200);
        let started = Instant::now();
        let err = resolver.resolve(&target()).await.unwrap_err();
        assert!(matches!(err, ResolveError::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
