use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::Domain;
use crate::error::{Error, Result};
use crate::strategy::{default_strategies, Strategy, Target};

/// A generated lookalike domain and the first strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub domain: String,
    pub strategy: String,
    pub original: String,
}

/// Candidates in first-insertion order, unique by ASCII-case-folded domain.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
    seen: HashSet<String>,
}

impl CandidateSet {
    /// Returns `false` if the domain was already present; the earlier
    /// attribution is kept.
    fn insert(&mut self, candidate: Candidate) -> bool {
        if !self.seen.insert(candidate.domain.to_ascii_lowercase()) {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.seen.contains(&domain.to_ascii_lowercase())
    }

    pub fn get(&self, domain: &str) -> Option<&Candidate> {
        if !self.contains(domain) {
            return None;
        }
        self.candidates
            .iter()
            .find(|c| c.domain.eq_ignore_ascii_case(domain))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.candidates
    }
}

impl IntoIterator for CandidateSet {
    type Item = Candidate;
    type IntoIter = std::vec::IntoIter<Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// Applies a strategy set to a domain.
#[derive(Debug, Clone)]
pub struct Generator {
    strategies: Vec<Strategy>,
    tld_allow_list: Option<HashSet<String>>,
    max_candidates: Option<usize>,
}

impl Generator {
    /// An empty `strategies` falls back to the default set.
    pub fn new(strategies: Vec<Strategy>) -> Self {
        let strategies = if strategies.is_empty() {
            default_strategies()
        } else {
            strategies
        };
        Self {
            strategies,
            tld_allow_list: None,
            max_candidates: None,
        }
    }

    /// Suffix-strategy output is kept only when its final label is listed.
    pub fn with_tld_allow_list<I, S>(mut self, tlds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tlds: HashSet<String> = tlds
            .into_iter()
            .map(|t| t.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self.tld_allow_list = (!tlds.is_empty()).then_some(tlds);
        self
    }

    pub fn with_max_candidates(mut self, max: Option<usize>) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn generate(&self, domain: &Domain) -> Result<CandidateSet> {
        self.generate_parts(domain.label(), domain.suffix())
    }

    fn generate_parts(&self, label: &str, suffix: &str) -> Result<CandidateSet> {
        if label.is_empty() || suffix.is_empty() {
            return Err(Error::InvalidDomain {
                input: format!("{label}.{suffix}"),
            });
        }

        let original = format!("{label}.{suffix}");
        let mut set = CandidateSet::default();

        'strategies: for strategy in &self.strategies {
            let target = strategy.target();
            let input = match target {
                Target::Label => label,
                Target::Suffix => suffix,
            };

            let variants = strategy.apply(input)?;
            let before = set.len();

            for variant in variants {
                if self.max_candidates.is_some_and(|max| set.len() >= max) {
                    debug!(max = set.len(), "candidate cap reached");
                    break 'strategies;
                }

                let domain = match target {
                    Target::Label => format!("{variant}.{suffix}"),
                    Target::Suffix => {
                        if !self.tld_allowed(&variant) {
                            continue;
                        }
                        format!("{label}.{variant}")
                    }
                };

                // DNS names are case-insensitive
                if domain.eq_ignore_ascii_case(&original) {
                    continue;
                }

                set.insert(Candidate {
                    domain,
                    strategy: strategy.name().to_string(),
                    original: original.clone(),
                });
            }

            debug!(
                strategy = strategy.name(),
                added = set.len() - before,
                "applied strategy"
            );
        }

        info!(domain = %original, candidates = set.len(), "generation complete");
        Ok(set)
    }

    fn tld_allowed(&self, suffix_variant: &str) -> bool {
        let Some(allowed) = &self.tld_allow_list else {
            return true;
        };
        let last = suffix_variant.rsplit('.').next().unwrap_or(suffix_variant);
        allowed.contains(&last.to_lowercase())
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Generates candidates for `label.suffix` with `strategies`, or the default
/// set when `strategies` is empty.
pub fn generate(label: &str, suffix: &str, strategies: &[Strategy]) -> Result<CandidateSet> {
    Generator::new(strategies.to_vec()).generate_parts(label, suffix)
}
