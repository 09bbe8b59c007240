//! Mutation strategies.
//!
//! Every strategy is a pure function of its input string and the tables it
//! carries. Label strategies rewrite the second-level label; suffix strategies
//! rewrite the top-level suffix.

use std::sync::Arc;

use crate::error::TableError;
use crate::tables::{self, MappingTable, DEFAULT_KEYWORDS, DEFAULT_PREFIXES, DEFAULT_TLDS, VOWELS};

/// What part of the domain a strategy rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Label,
    Suffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Addition,
    BitSquatting,
    DoubleHit(Arc<MappingTable>),
    Homoglyph(Arc<MappingTable>),
    Hyphenation,
    Omission,
    Prefix(Arc<Vec<String>>),
    Repetition,
    Replace(Arc<MappingTable>),
    Similar(Arc<MappingTable>),
    SubDomain,
    TldRepeat,
    TldReplace(Arc<Vec<String>>),
    Transposition,
    VowelSwap,
    Combosquatting(Arc<Vec<String>>),
}

impl Strategy {
    pub const NAMES: &'static [&'static str] = &[
        "addition",
        "bit_squatting",
        "double_hit",
        "homoglyph",
        "hyphenation",
        "omission",
        "prefix",
        "repetition",
        "replace",
        "similar",
        "sub_domain",
        "tld_repeat",
        "tld_replace",
        "transposition",
        "vowel_swap",
        "combosquatting",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Addition => "addition",
            Strategy::BitSquatting => "bit_squatting",
            Strategy::DoubleHit(_) => "double_hit",
            Strategy::Homoglyph(_) => "homoglyph",
            Strategy::Hyphenation => "hyphenation",
            Strategy::Omission => "omission",
            Strategy::Prefix(_) => "prefix",
            Strategy::Repetition => "repetition",
            Strategy::Replace(_) => "replace",
            Strategy::Similar(_) => "similar",
            Strategy::SubDomain => "sub_domain",
            Strategy::TldRepeat => "tld_repeat",
            Strategy::TldReplace(_) => "tld_replace",
            Strategy::Transposition => "transposition",
            Strategy::VowelSwap => "vowel_swap",
            Strategy::Combosquatting(_) => "combosquatting",
        }
    }

    pub fn target(&self) -> Target {
        match self {
            Strategy::TldRepeat | Strategy::TldReplace(_) => Target::Suffix,
            _ => Target::Label,
        }
    }

    /// Produces variants of `input`. An empty result is not an error; only a
    /// malformed table is.
    pub fn apply(&self, input: &str) -> Result<Vec<String>, TableError> {
        let chars: Vec<char> = input.chars().collect();

        let variants: Vec<String> = match self {
            Strategy::Addition => ('a'..='z').map(|c| format!("{input}{c}")).collect(),
            Strategy::BitSquatting => bit_squatting(&chars),
            Strategy::DoubleHit(table) => {
                table.validate()?;
                double_hit(&chars, table)
            }
            Strategy::Homoglyph(table) | Strategy::Replace(table) | Strategy::Similar(table) => {
                table.validate()?;
                substitute(&chars, table)
            }
            Strategy::Hyphenation => insert_between(&chars, '-'),
            Strategy::Omission => omission(&chars),
            Strategy::Prefix(prefixes) => prefixes.iter().map(|p| format!("{p}{input}")).collect(),
            Strategy::Repetition => repetition(&chars),
            Strategy::SubDomain => insert_between(&chars, '.'),
            Strategy::TldRepeat => vec![format!("{input}.{input}")],
            Strategy::TldReplace(tlds) => tlds
                .iter()
                .filter(|tld| tld.as_str() != input)
                .cloned()
                .collect(),
            Strategy::Transposition => transposition(&chars),
            Strategy::VowelSwap => vowel_swap(&chars),
            Strategy::Combosquatting(words) => words
                .iter()
                .flat_map(|w| {
                    [
                        format!("{input}-{w}"),
                        format!("{input}{w}"),
                        format!("{w}-{input}"),
                        format!("{w}{input}"),
                    ]
                })
                .collect(),
        };

        Ok(variants
            .into_iter()
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(input))
            .collect())
    }
}

fn bit_squatting(chars: &[char]) -> Vec<String> {
    let mut out = Vec::new();
    for (i, &ch) in chars.iter().enumerate() {
        if !ch.is_ascii() {
            continue;
        }
        // labels cannot start or end with a hyphen
        let edge = i == 0 || i + 1 == chars.len();
        for bit in 0..8 {
            let flipped = char::from(ch as u8 ^ (1 << bit));
            if flipped.is_ascii_lowercase() || flipped.is_ascii_digit() || (flipped == '-' && !edge) {
                out.push(replace_at(chars, i, &flipped.to_string()));
            }
        }
    }
    out
}

fn double_hit(chars: &[char], table: &MappingTable) -> Vec<String> {
    let mut out = Vec::new();
    for (i, &ch) in chars.iter().enumerate() {
        for key in table.get(ch.to_ascii_lowercase()) {
            out.push(replace_at(chars, i, &format!("{key}{ch}")));
            out.push(replace_at(chars, i, &format!("{ch}{key}")));
        }
    }
    out
}

fn substitute(chars: &[char], table: &MappingTable) -> Vec<String> {
    let mut out = Vec::new();
    for (i, &ch) in chars.iter().enumerate() {
        for replacement in table.get(ch.to_ascii_lowercase()) {
            out.push(replace_at(chars, i, replacement));
        }
    }
    out
}

/// Inserts `sep` at interior positions not already touching a separator.
fn insert_between(chars: &[char], sep: char) -> Vec<String> {
    let is_sep = |c: char| c == '-' || c == '.';
    (1..chars.len())
        .filter(|&i| !is_sep(chars[i - 1]) && !is_sep(chars[i]))
        .map(|i| {
            let mut v: String = chars[..i].iter().collect();
            v.push(sep);
            v.extend(&chars[i..]);
            v
        })
        .collect()
}

fn omission(chars: &[char]) -> Vec<String> {
    (0..chars.len()).map(|i| replace_at(chars, i, "")).collect()
}

fn repetition(chars: &[char]) -> Vec<String> {
    chars
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_alphanumeric())
        .map(|(i, &c)| replace_at(chars, i, &format!("{c}{c}")))
        .collect()
}

fn transposition(chars: &[char]) -> Vec<String> {
    (0..chars.len().saturating_sub(1))
        .filter(|&i| chars[i] != chars[i + 1])
        .map(|i| {
            let mut swapped = chars.to_vec();
            swapped.swap(i, i + 1);
            swapped.into_iter().collect()
        })
        .collect()
}

fn vowel_swap(chars: &[char]) -> Vec<String> {
    let mut out = Vec::new();
    for (i, &ch) in chars.iter().enumerate() {
        let lower = ch.to_ascii_lowercase();
        if !VOWELS.contains(&lower) {
            continue;
        }
        for &vowel in VOWELS.iter().filter(|&&v| v != lower) {
            let vowel = if ch.is_ascii_uppercase() {
                vowel.to_ascii_uppercase()
            } else {
                vowel
            };
            out.push(replace_at(chars, i, &vowel.to_string()));
        }
    }
    out
}

fn replace_at(chars: &[char], i: usize, with: &str) -> String {
    let mut v: String = chars[..i].iter().collect();
    v.push_str(with);
    v.extend(&chars[i + 1..]);
    v
}

/// Tables and word lists handed to the table-driven strategies.
#[derive(Debug, Clone)]
pub struct StrategyTables {
    pub keyboard: Arc<MappingTable>,
    pub homoglyphs: Arc<MappingTable>,
    pub similar: Arc<MappingTable>,
    pub prefixes: Arc<Vec<String>>,
    pub tlds: Arc<Vec<String>>,
    pub keywords: Arc<Vec<String>>,
}

impl Default for StrategyTables {
    fn default() -> Self {
        Self {
            keyboard: tables::keyboard(),
            homoglyphs: tables::homoglyphs(),
            similar: tables::similar(),
            prefixes: Arc::new(DEFAULT_PREFIXES.iter().map(|s| s.to_string()).collect()),
            tlds: Arc::new(DEFAULT_TLDS.iter().map(|s| s.to_string()).collect()),
            keywords: Arc::new(DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect()),
        }
    }
}

impl StrategyTables {
    pub fn strategy(&self, name: &str) -> Option<Strategy> {
        let strategy = match name {
            "addition" => Strategy::Addition,
            "bit_squatting" => Strategy::BitSquatting,
            "double_hit" => Strategy::DoubleHit(Arc::clone(&self.keyboard)),
            "homoglyph" => Strategy::Homoglyph(Arc::clone(&self.homoglyphs)),
            "hyphenation" => Strategy::Hyphenation,
            "omission" => Strategy::Omission,
            "prefix" => Strategy::Prefix(Arc::clone(&self.prefixes)),
            "repetition" => Strategy::Repetition,
            "replace" => Strategy::Replace(Arc::clone(&self.keyboard)),
            "similar" => Strategy::Similar(Arc::clone(&self.similar)),
            "sub_domain" => Strategy::SubDomain,
            "tld_repeat" => Strategy::TldRepeat,
            "tld_replace" => Strategy::TldReplace(Arc::clone(&self.tlds)),
            "transposition" => Strategy::Transposition,
            "vowel_swap" => Strategy::VowelSwap,
            "combosquatting" => Strategy::Combosquatting(Arc::clone(&self.keywords)),
            _ => return None,
        };
        Some(strategy)
    }

    /// The default order. Combosquatting is opt-in.
    pub fn default_strategies(&self) -> Vec<Strategy> {
        Strategy::NAMES
            .iter()
            .filter(|&&name| name != "combosquatting")
            .filter_map(|name| self.strategy(name))
            .collect()
    }
}

pub fn default_strategies() -> Vec<Strategy> {
    StrategyTables::default().default_strategies()
}
