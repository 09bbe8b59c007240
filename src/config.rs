//! Run configuration, assembled by the binary from its arguments.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result, TableError};
use crate::generate::Generator;
use crate::strategy::{Strategy, StrategyTables};
use crate::tables::MappingTable;
use crate::verify::VerifyConfig;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub domain: String,
    /// Strategy names in application order; empty selects the default set.
    pub strategies: Vec<String>,
    /// TLD allow-list for suffix strategies; also replaces the TLD list used
    /// by `tld_replace` when set.
    pub tlds: Vec<String>,
    pub keyboard_table: Option<PathBuf>,
    pub homoglyph_table: Option<PathBuf>,
    pub similar_table: Option<PathBuf>,
    /// Word list for combosquatting. Setting it enables the strategy.
    pub dictionary: Option<PathBuf>,
    pub max_candidates: Option<usize>,
    pub generate_only: bool,
    pub banner: bool,
    pub verify: VerifyConfig,
}

impl RunConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            strategies: Vec::new(),
            tlds: Vec::new(),
            keyboard_table: None,
            homoglyph_table: None,
            similar_table: None,
            dictionary: None,
            max_candidates: None,
            generate_only: false,
            banner: true,
            verify: VerifyConfig::default(),
        }
    }

    /// Lowercased, dot-stripped, deduplicated allow-list.
    pub fn normalized_tlds(&self) -> Vec<String> {
        let mut tlds: Vec<String> = Vec::new();
        for tld in self.tlds.iter().flat_map(|t| t.split(',')) {
            let tld = tld.trim().trim_start_matches('.').to_lowercase();
            if !tld.is_empty() && !tlds.contains(&tld) {
                tlds.push(tld);
            }
        }
        tlds
    }

    pub fn strategy_tables(&self) -> Result<StrategyTables> {
        let mut tables = StrategyTables::default();

        if let Some(path) = &self.keyboard_table {
            tables.keyboard = Arc::new(MappingTable::from_json_file("keyboard", path)?);
        }
        if let Some(path) = &self.homoglyph_table {
            tables.homoglyphs = Arc::new(MappingTable::from_json_file("homoglyph", path)?);
        }
        if let Some(path) = &self.similar_table {
            tables.similar = Arc::new(MappingTable::from_json_file("similar", path)?);
        }
        if let Some(path) = &self.dictionary {
            tables.keywords = Arc::new(load_dictionary(path)?);
        }

        let tlds = self.normalized_tlds();
        if !tlds.is_empty() {
            tables.tlds = Arc::new(tlds);
        }
        Ok(tables)
    }

    pub fn strategies(&self, tables: &StrategyTables) -> Result<Vec<Strategy>> {
        let mut strategies = if self.strategies.is_empty() {
            tables.default_strategies()
        } else {
            self.strategies
                .iter()
                .map(|name| {
                    tables
                        .strategy(name)
                        .ok_or_else(|| Error::UnknownStrategy(name.clone()))
                })
                .collect::<Result<Vec<_>>>()?
        };

        if self.dictionary.is_some() && !strategies.iter().any(|s| matches!(s, Strategy::Combosquatting(_))) {
            strategies.push(Strategy::Combosquatting(Arc::clone(&tables.keywords)));
        }
        Ok(strategies)
    }

    pub fn generator(&self) -> Result<Generator> {
        let tables = self.strategy_tables()?;
        let strategies = self.strategies(&tables)?;
        debug!(count = strategies.len(), "strategies selected");

        Ok(Generator::new(strategies)
            .with_tld_allow_list(self.normalized_tlds())
            .with_max_candidates(self.max_candidates))
    }
}

/// One keyword per line; blank lines and `#` comments are skipped.
fn load_dictionary(path: &Path) -> Result<Vec<String>, TableError> {
    let raw = fs::read_to_string(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let words: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|w| !w.is_empty() && !w.starts_with('#'))
        .map(str::to_string)
        .collect();

    if words.is_empty() {
        return Err(TableError::Empty {
            table: "dictionary".to_string(),
        });
    }
    Ok(words)
}
