//! Typosquat domain enumeration and verification.
//!
//! A base domain is parsed into label and suffix, every selected strategy is
//! applied to produce a deduplicated candidate set, and the candidates are
//! probed (DNS, then optionally TLS and HTTP) by a bounded worker pool whose
//! results stream out as JSON Lines.

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod error;
pub mod generate;
pub mod logging;
pub mod probe;
pub mod report;
pub mod strategy;
pub mod tables;
pub mod verify;

pub use aggregate::{Aggregator, RunSummary};
pub use config::RunConfig;
pub use domain::{parse, Domain};
pub use error::{Error, Result, TableError};
pub use generate::{generate, Candidate, CandidateSet, Generator};
pub use probe::{ErrorKind, NetworkProbe, Probe, ProbeError, Stage};
pub use report::{OutputStyle, Reporter};
pub use strategy::{default_strategies, Strategy, StrategyTables, Target};
pub use verify::{VerificationResult, Verifier, VerifyConfig};
