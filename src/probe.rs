//! Network probes for a single candidate: DNS resolution, TLS reachability
//! and plain HTTP reachability.

use std::error::Error as _;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::trace;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::TokioAsyncResolver;
use url::{Host, Url};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Dns,
    Tls,
    Http,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Dns => "dns",
            Stage::Tls => "tls",
            Stage::Http => "http",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NxDomain,
    Dns,
    Timeout,
    Connect,
    Certificate,
    Tls,
    Http,
    InvalidHost,
    Cancelled,
}

/// A recoverable per-candidate failure. Recorded in the result, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{stage} probe failed: {message}")]
pub struct ProbeError {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn new(stage: Stage, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(stage: Stage, after: Duration) -> Self {
        Self::new(stage, ErrorKind::Timeout, format!("timed out after {after:?}"))
    }

    pub fn cancelled(stage: Stage) -> Self {
        Self::new(stage, ErrorKind::Cancelled, "run cancelled before probe")
    }
}

/// What a successful HTTP probe observed. Redirects are not followed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpInfo {
    pub status: u16,
    pub server: Option<String>,
    pub location: Option<String>,
}

/// One probe step per method. Implementations hold no per-candidate state.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, ProbeError>;

    async fn tls(&self, domain: &str) -> Result<(), ProbeError>;

    async fn http(&self, domain: &str) -> Result<HttpInfo, ProbeError>;
}

/// Probes against the live network using the system-independent default
/// resolver configuration.
pub struct NetworkProbe {
    resolver: TokioAsyncResolver,
    client: reqwest::Client,
}

impl fmt::Debug for NetworkProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkProbe").finish_non_exhaustive()
    }
}

impl NetworkProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { resolver, client })
    }
}

#[async_trait]
impl Probe for NetworkProbe {
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, ProbeError> {
        let host = ascii_host(domain, Stage::Dns)?;
        let lookup = self
            .resolver
            .lookup_ip(host.as_str())
            .await
            .map_err(|err| resolve_error(&err))?;

        let addresses: Vec<IpAddr> = lookup.iter().collect();
        trace!(domain, count = addresses.len(), "resolved");
        if addresses.is_empty() {
            return Err(ProbeError::new(Stage::Dns, ErrorKind::NxDomain, "no addresses"));
        }
        Ok(addresses)
    }

    async fn tls(&self, domain: &str) -> Result<(), ProbeError> {
        let url = probe_url("https", domain, Stage::Tls)?;
        match self.client.head(url).send().await {
            Ok(response) => {
                trace!(domain, status = response.status().as_u16(), "tls handshake completed");
                Ok(())
            }
            Err(err) => {
                let failure = request_error(Stage::Tls, &err);
                trace!(domain, error = %failure, "https request failed");
                handshake_outcome(failure)
            }
        }
    }

    async fn http(&self, domain: &str) -> Result<HttpInfo, ProbeError> {
        let url = probe_url("http", domain, Stage::Http)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| request_error(Stage::Http, &err))?;

        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let info = HttpInfo {
            status: response.status().as_u16(),
            server: header(reqwest::header::SERVER),
            location: header(reqwest::header::LOCATION),
        };
        trace!(domain, status = info.status, "http responded");
        Ok(info)
    }
}

/// IDNA-encodes `domain` so homoglyph candidates can be queried.
fn ascii_host(domain: &str, stage: Stage) -> Result<String, ProbeError> {
    Host::parse(domain)
        .map(|host| host.to_string())
        .map_err(|err| ProbeError::new(stage, ErrorKind::InvalidHost, err.to_string()))
}

fn probe_url(scheme: &str, domain: &str, stage: Stage) -> Result<Url, ProbeError> {
    let host = ascii_host(domain, stage)?;
    Url::parse(&format!("{scheme}://{host}/"))
        .map_err(|err| ProbeError::new(stage, ErrorKind::InvalidHost, err.to_string()))
}

fn resolve_error(err: &ResolveError) -> ProbeError {
    let kind = match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => ErrorKind::NxDomain,
        ResolveErrorKind::Timeout => ErrorKind::Timeout,
        _ => ErrorKind::Dns,
    };
    ProbeError::new(Stage::Dns, kind, err.to_string())
}

fn request_error(stage: Stage, err: &reqwest::Error) -> ProbeError {
    let message = error_chain(err);
    let kind = classify(stage, err.is_timeout(), err.is_connect(), &message);
    ProbeError::new(stage, kind, message)
}

/// Handshake failures surface from the connector; anything that is not a
/// timeout or connect error happened after the connection was up.
fn classify(stage: Stage, timed_out: bool, connect: bool, message: &str) -> ErrorKind {
    let lowered = message.to_lowercase();
    if timed_out {
        ErrorKind::Timeout
    } else if lowered.contains("certificate") {
        ErrorKind::Certificate
    } else if stage == Stage::Tls && (lowered.contains("tls") || lowered.contains("handshake")) {
        ErrorKind::Tls
    } else if connect {
        ErrorKind::Connect
    } else {
        ErrorKind::Http
    }
}

/// An HTTP-level failure on the HTTPS request (reset after the handshake,
/// malformed response) still means the TLS endpoint answered.
fn handshake_outcome(failure: ProbeError) -> Result<(), ProbeError> {
    if failure.kind == ErrorKind::Http {
        Ok(())
    } else {
        Err(failure)
    }
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_host_encodes_homoglyphs() {
        let host = ascii_host("t\u{0435}st.com", Stage::Dns).unwrap();
        assert!(host.starts_with("xn--"));
        assert!(host.ends_with(".com"));
    }

    #[test]
    fn probe_url_rejects_garbage() {
        let err = probe_url("http", "exa mple.com", Stage::Http).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidHost);
        assert_eq!(err.stage, Stage::Http);
    }

    #[test]
    fn probe_url_builds_root() {
        let url = probe_url("https", "example.com", Stage::Tls).unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn classifies_request_failures() {
        assert_eq!(classify(Stage::Tls, true, true, "operation timed out"), ErrorKind::Timeout);
        assert_eq!(
            classify(Stage::Tls, false, true, "invalid peer certificate: UnknownIssuer"),
            ErrorKind::Certificate
        );
        assert_eq!(
            classify(Stage::Tls, false, true, "received fatal alert: HandshakeFailure"),
            ErrorKind::Tls
        );
        assert_eq!(classify(Stage::Http, false, true, "connection refused"), ErrorKind::Connect);
        assert_eq!(
            classify(Stage::Http, false, false, "connection closed before message completed"),
            ErrorKind::Http
        );
    }

    #[test]
    fn reset_after_handshake_counts_as_reachable() {
        let reset = ProbeError::new(
            Stage::Tls,
            classify(Stage::Tls, false, false, "error sending request: connection reset by peer"),
            "reset",
        );
        assert!(handshake_outcome(reset).is_ok());

        let refused = ProbeError::new(
            Stage::Tls,
            classify(Stage::Tls, false, true, "tcp connect error: connection refused"),
            "refused",
        );
        assert_eq!(handshake_outcome(refused).unwrap_err().kind, ErrorKind::Connect);
    }

    #[test]
    fn probe_error_serializes_snake_case() {
        let err = ProbeError::timeout(Stage::Dns, Duration::from_secs(1));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["stage"], "dns");
        assert_eq!(json["kind"], "timeout");
    }
}
