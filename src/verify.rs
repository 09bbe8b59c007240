//! Concurrent verification of candidates.
//!
//! A fixed pool of workers drains a queue that is filled once before any
//! worker starts. Each worker probes its candidate DNS → TLS → HTTP, checking
//! the run's cancellation token before every step, and sends exactly one
//! [`VerificationResult`] per candidate. Results arrive in completion order.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::Stream;
use serde::{Serialize, Serializer};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::generate::Candidate;
use crate::probe::{ErrorKind, Probe, ProbeError, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyConfig {
    pub workers: usize,
    pub enable_tls: bool,
    pub enable_http: bool,
    /// Applied to each probe step separately.
    pub probe_timeout: Duration,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            enable_tls: false,
            enable_http: false,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl VerifyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("worker count must be positive".to_string()));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::Config("probe timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Probing is I/O bound, so the pool is a multiple of the core count.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 4)
        .unwrap_or(8)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub dns_resolved: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<IpAddr>,
    pub tls_reachable: Option<bool>,
    pub http_reachable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_location: Option<String>,
    pub error: Option<ProbeError>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

impl VerificationResult {
    fn pending(candidate: Candidate) -> Self {
        Self {
            candidate,
            dns_resolved: false,
            addresses: Vec::new(),
            tls_reachable: None,
            http_reachable: None,
            http_status: None,
            http_server: None,
            http_location: None,
            error: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(&self.error, Some(e) if e.kind == ErrorKind::Cancelled)
    }

    /// Keeps the first failure; cancellation always wins.
    fn record(&mut self, error: ProbeError) {
        if error.kind == ErrorKind::Cancelled || self.error.is_none() {
            self.error = Some(error);
        }
    }
}

fn as_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// Filled once, then only popped from.
#[derive(Debug)]
struct WorkQueue {
    items: Mutex<VecDeque<Candidate>>,
}

impl WorkQueue {
    fn new(items: impl IntoIterator<Item = Candidate>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().collect()),
        }
    }

    fn pop(&self) -> Option<Candidate> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

/// One-shot verifier. `verify` consumes it; build a new one per run.
#[derive(Debug)]
pub struct Verifier<P: Probe> {
    probe: Arc<P>,
    config: Arc<VerifyConfig>,
    cancel: CancellationToken,
}

impl<P: Probe> Verifier<P> {
    pub fn new(probe: P, config: VerifyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            probe: Arc::new(probe),
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    /// Spawns the worker pool on the current tokio runtime and returns the
    /// result stream. The stream ends once every candidate has a result.
    pub fn verify<I>(self, candidates: I) -> impl Stream<Item = VerificationResult> + Send + Unpin
    where
        I: IntoIterator<Item = Candidate>,
    {
        let queue = Arc::new(WorkQueue::new(candidates));
        let (tx, mut rx) = mpsc::unbounded_channel();

        debug!(workers = self.config.workers, "starting verification workers");
        for id in 0..self.config.workers {
            tokio::spawn(worker(
                id,
                Arc::clone(&self.probe),
                Arc::clone(&queue),
                tx.clone(),
                Arc::clone(&self.config),
                self.cancel.clone(),
            ));
        }
        drop(tx);

        futures::stream::poll_fn(move |cx| rx.poll_recv(cx))
    }
}

async fn worker<P: Probe>(
    id: usize,
    probe: Arc<P>,
    queue: Arc<WorkQueue>,
    results: mpsc::UnboundedSender<VerificationResult>,
    config: Arc<VerifyConfig>,
    cancel: CancellationToken,
) {
    while let Some(candidate) = queue.pop() {
        let result = probe_candidate(probe.as_ref(), candidate, &config, &cancel).await;
        if results.send(result).is_err() {
            debug!(worker = id, "result stream dropped, stopping");
            return;
        }
    }
    trace!(worker = id, "queue drained");
}

async fn probe_candidate<P: Probe>(
    probe: &P,
    candidate: Candidate,
    config: &VerifyConfig,
    cancel: &CancellationToken,
) -> VerificationResult {
    let started = Instant::now();
    let domain = candidate.domain.clone();
    let mut result = VerificationResult::pending(candidate);
    let budget = config.probe_timeout;

    if cancel.is_cancelled() {
        result.record(ProbeError::cancelled(Stage::Dns));
        return finish(result, started);
    }
    match timeout(budget, probe.resolve(&domain)).await {
        Ok(Ok(addresses)) => {
            result.dns_resolved = true;
            result.addresses = addresses;
        }
        Ok(Err(err)) => {
            result.record(err);
            return finish(result, started);
        }
        Err(_) => {
            result.record(ProbeError::timeout(Stage::Dns, budget));
            return finish(result, started);
        }
    }

    if config.enable_tls {
        if cancel.is_cancelled() {
            result.record(ProbeError::cancelled(Stage::Tls));
            return finish(result, started);
        }
        let outcome = match timeout(budget, probe.tls(&domain)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::timeout(Stage::Tls, budget)),
        };
        result.tls_reachable = Some(outcome.is_ok());
        if let Err(err) = outcome {
            result.record(err);
        }
    }

    if config.enable_http {
        if cancel.is_cancelled() {
            result.record(ProbeError::cancelled(Stage::Http));
            return finish(result, started);
        }
        let outcome = match timeout(budget, probe.http(&domain)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::timeout(Stage::Http, budget)),
        };
        match outcome {
            Ok(info) => {
                result.http_reachable = Some(true);
                result.http_status = Some(info.status);
                result.http_server = info.server;
                result.http_location = info.location;
            }
            Err(err) => {
                result.http_reachable = Some(false);
                result.record(err);
            }
        }
    }

    finish(result, started)
}

fn finish(mut result: VerificationResult, started: Instant) -> VerificationResult {
    result.elapsed = started.elapsed();
    trace!(domain = %result.candidate.domain, resolved = result.dns_resolved, "probe finished");
    result
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;
    use crate::probe::HttpInfo;

    /// Resolves names listed in `live`, tracks concurrency, sleeps `delay` per
    /// step plus a second for names in `slow`.
    #[derive(Debug, Default)]
    struct FakeProbe {
        live: HashSet<String>,
        slow: HashSet<String>,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeProbe {
        fn resolving(domains: &[&str]) -> Self {
            Self {
                live: domains.iter().map(|d| d.to_string()).collect(),
                ..Default::default()
            }
        }

        async fn step(&self, domain: &str) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut delay = self.delay;
            if self.slow.contains(domain) {
                delay += Duration::from_secs(1);
            }
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Probe for FakeProbe {
        async fn resolve(&self, domain: &str) -> std::result::Result<Vec<IpAddr>, ProbeError> {
            self.step(domain).await;
            if self.live.contains(domain) {
                Ok(vec![IpAddr::from([192, 0, 2, 1])])
            } else {
                Err(ProbeError::new(Stage::Dns, ErrorKind::NxDomain, "nxdomain"))
            }
        }

        async fn tls(&self, domain: &str) -> std::result::Result<(), ProbeError> {
            self.step(domain).await;
            if domain.starts_with("tls") {
                Ok(())
            } else {
                Err(ProbeError::new(Stage::Tls, ErrorKind::Certificate, "untrusted"))
            }
        }

        async fn http(&self, domain: &str) -> std::result::Result<HttpInfo, ProbeError> {
            self.step(domain).await;
            Ok(HttpInfo {
                status: 301,
                server: Some("fake".to_string()),
                location: Some("https://elsewhere/".to_string()),
            })
        }
    }

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| Candidate {
                domain: format!("c{i}.com"),
                strategy: "addition".to_string(),
                original: "c.com".to_string(),
            })
            .collect()
    }

    fn candidate(domain: &str) -> Candidate {
        Candidate {
            domain: domain.to_string(),
            strategy: "addition".to_string(),
            original: "example.com".to_string(),
        }
    }

    fn config(workers: usize) -> VerifyConfig {
        VerifyConfig {
            workers,
            enable_tls: true,
            enable_http: true,
            probe_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn rejects_zero_workers() {
        let err = Verifier::new(FakeProbe::default(), config(0)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut cfg = config(1);
        cfg.probe_timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = VerifyConfig::default();
        assert!(cfg.workers > 0);
        assert!(!cfg.enable_tls);
        assert!(!cfg.enable_http);
        cfg.validate().unwrap();
    }

    #[tokio::test]
    async fn dns_failures_skip_transport_probes() {
        let verifier = Verifier::new(FakeProbe::default(), config(1)).unwrap();
        let results: Vec<_> = verifier.verify(candidates(5)).collect().await;

        assert_eq!(results.len(), 5);
        for r in &results {
            assert!(!r.dns_resolved);
            assert_eq!(r.tls_reachable, None);
            assert_eq!(r.http_reachable, None);
            assert_eq!(r.error.as_ref().unwrap().kind, ErrorKind::NxDomain);
        }
    }

    #[tokio::test]
    async fn single_worker_preserves_submission_order() {
        let verifier = Verifier::new(FakeProbe::default(), config(1)).unwrap();
        let domains: Vec<_> = verifier
            .verify(candidates(4))
            .map(|r| r.candidate.domain)
            .collect()
            .await;
        assert_eq!(domains, vec!["c0.com", "c1.com", "c2.com", "c3.com"]);
    }

    #[tokio::test(start_paused = true)]
    async fn results_arrive_in_completion_order() {
        let probe = FakeProbe {
            slow: ["slow.example.com".to_string()].into(),
            ..Default::default()
        };
        let mut cfg = config(2);
        cfg.probe_timeout = Duration::from_secs(5);
        let verifier = Verifier::new(probe, cfg).unwrap();
        let domains: Vec<_> = verifier
            .verify([candidate("slow.example.com"), candidate("fast.example.com")])
            .map(|r| r.candidate.domain)
            .collect()
            .await;
        assert_eq!(domains, vec!["fast.example.com", "slow.example.com"]);
    }

    #[tokio::test]
    async fn records_transport_outcomes() {
        let probe = FakeProbe::resolving(&["tls.example.com", "plain.example.com"]);
        let verifier = Verifier::new(probe, config(2)).unwrap();
        let results: Vec<_> = verifier
            .verify([candidate("tls.example.com"), candidate("plain.example.com")])
            .collect()
            .await;

        let tls = results.iter().find(|r| r.candidate.domain == "tls.example.com").unwrap();
        assert!(tls.dns_resolved);
        assert_eq!(tls.tls_reachable, Some(true));
        assert_eq!(tls.http_reachable, Some(true));
        assert_eq!(tls.http_status, Some(301));
        assert_eq!(tls.http_location.as_deref(), Some("https://elsewhere/"));
        assert!(tls.error.is_none());

        let plain = results.iter().find(|r| r.candidate.domain == "plain.example.com").unwrap();
        assert_eq!(plain.tls_reachable, Some(false));
        assert_eq!(plain.http_reachable, Some(true));
        let err = plain.error.as_ref().unwrap();
        assert_eq!((err.stage, err.kind), (Stage::Tls, ErrorKind::Certificate));
    }

    #[tokio::test]
    async fn disabled_probes_stay_unset() {
        let probe = FakeProbe::resolving(&["tls.example.com"]);
        let mut cfg = config(1);
        cfg.enable_tls = false;
        cfg.enable_http = false;
        let verifier = Verifier::new(probe, cfg).unwrap();
        let results: Vec<_> = verifier.verify([candidate("tls.example.com")]).collect().await;

        assert!(results[0].dns_resolved);
        assert_eq!(results[0].tls_reachable, None);
        assert_eq!(results[0].http_reachable, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_worker_count() {
        let probe = FakeProbe {
            delay: Duration::from_millis(20),
            ..Default::default()
        };
        let verifier = Verifier::new(probe, config(3)).unwrap();
        let probe = Arc::clone(&verifier.probe);

        let results: Vec<_> = verifier.verify(candidates(12)).collect().await;

        assert_eq!(results.len(), 12);
        assert!(probe.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_steps_time_out_independently() {
        let probe = FakeProbe {
            live: ["slow.example.com".to_string()].into(),
            delay: Duration::from_millis(900),
            ..Default::default()
        };
        // Each step takes 900ms against a 1s budget: all three fit even
        // though the total exceeds one budget.
        let verifier = Verifier::new(probe, config(1)).unwrap();
        let results: Vec<_> = verifier.verify([candidate("slow.example.com")]).collect().await;
        assert!(results[0].dns_resolved);
        assert_eq!(results[0].http_reachable, Some(true));

        let probe = FakeProbe {
            delay: Duration::from_secs(30),
            ..Default::default()
        };
        let verifier = Verifier::new(probe, config(1)).unwrap();
        let results: Vec<_> = verifier.verify([candidate("slow.example.com")]).collect().await;
        let err = results[0].error.as_ref().unwrap();
        assert_eq!((err.stage, err.kind), (Stage::Dns, ErrorKind::Timeout));
        assert!(!results[0].dns_resolved);
    }

    #[tokio::test]
    async fn cancellation_accounts_for_every_candidate() {
        let probe = FakeProbe {
            delay: Duration::from_millis(5),
            ..Default::default()
        };
        let verifier = Verifier::new(probe, config(1)).unwrap();
        let cancel = verifier.cancellation_token();
        let mut stream = verifier.verify(candidates(10));

        let mut results = Vec::new();
        while let Some(result) = stream.next().await {
            results.push(result);
            if results.len() == 2 {
                cancel.cancel();
            }
        }

        assert_eq!(results.len(), 10);
        let unique: HashSet<_> = results.iter().map(|r| r.candidate.domain.clone()).collect();
        assert_eq!(unique.len(), 10);

        let cancelled = results.iter().filter(|r| r.is_cancelled()).count();
        assert!((7..=8).contains(&cancelled), "cancelled = {cancelled}");
        assert!(results[..2].iter().all(|r| !r.is_cancelled()));
    }

    #[tokio::test]
    async fn cancelled_before_start_yields_cancelled_records() {
        let verifier = Verifier::new(FakeProbe::default(), config(2)).unwrap();
        verifier.cancellation_token().cancel();
        let probe = Arc::clone(&verifier.probe);

        let results: Vec<_> = verifier.verify(candidates(3)).collect().await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(VerificationResult::is_cancelled));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn serializes_one_flat_record() {
        let mut result = VerificationResult::pending(candidate("exanple.com"));
        result.elapsed = Duration::from_millis(42);
        result.record(ProbeError::new(Stage::Dns, ErrorKind::NxDomain, "nx"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["domain"], "exanple.com");
        assert_eq!(json["strategy"], "addition");
        assert_eq!(json["dns_resolved"], false);
        assert!(json["tls_reachable"].is_null());
        assert_eq!(json["error"]["kind"], "nx_domain");
        assert_eq!(json["elapsed_ms"], 42);
        assert!(json.get("addresses").is_none());
    }
}
