//! Auxiliary mapping tables used by the table-driven strategies.
//!
//! Built-in tables are shared through `lazy_static`; custom tables can be
//! loaded from JSON objects of the form `{"a": ["а", "α"], "m": ["rn"]}`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use lazy_static::lazy_static;

use crate::error::TableError;

/// Character → replacement strings. Replacements may be longer than one
/// character (`m` → `rn`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTable {
    name: String,
    entries: BTreeMap<char, Vec<String>>,
}

impl MappingTable {
    pub fn new<I, V>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (char, V)>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, values)| (key, values.into_iter().map(Into::into).collect()))
            .collect();
        Self {
            name: name.into(),
            entries,
        }
    }

    /// Keyboard-style table where each character of `neighbours` is one replacement.
    fn from_rows(name: &str, rows: &[(char, &str)]) -> Self {
        Self::new(
            name,
            rows.iter()
                .map(|&(key, neighbours)| (key, neighbours.chars().map(String::from).collect::<Vec<_>>())),
        )
    }

    pub fn from_json_file(name: impl Into<String>, path: &Path) -> Result<Self, TableError> {
        let name = name.into();
        let raw = fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: HashMap<String, Vec<String>> =
            serde_json::from_str(&raw).map_err(|source| TableError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut entries = BTreeMap::new();
        for (key, values) in parsed {
            let mut chars = key.chars();
            let (Some(ch), None) = (chars.next(), chars.next()) else {
                return Err(TableError::InvalidKey { table: name, key });
            };
            entries.insert(ch, values);
        }

        let table = Self { name, entries };
        table.validate()?;
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: char) -> &[String] {
        self.entries.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rejects tables that would emit identity or unusable variants.
    pub fn validate(&self) -> Result<(), TableError> {
        if self.entries.values().all(Vec::is_empty) {
            return Err(TableError::Empty {
                table: self.name.clone(),
            });
        }

        for (&key, values) in &self.entries {
            for value in values {
                if value.chars().eq(std::iter::once(key)) {
                    return Err(TableError::Identity {
                        table: self.name.clone(),
                        key,
                    });
                }
                if value.is_empty() || value.contains('.') || value.chars().any(char::is_whitespace) {
                    return Err(TableError::InvalidReplacement {
                        table: self.name.clone(),
                        key,
                        value: value.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

lazy_static! {
    static ref KEYBOARD: Arc<MappingTable> = Arc::new(MappingTable::from_rows(
        "qwerty",
        &[
            ('1', "2q"), ('2', "13wq"), ('3', "24ew"), ('4', "35re"), ('5', "46tr"),
            ('6', "57yt"), ('7', "68uy"), ('8', "79iu"), ('9', "80oi"), ('0', "9po"),
            ('q', "12wa"), ('w', "23qeas"), ('e', "34wrsd"), ('r', "45etdf"), ('t', "56ryfg"),
            ('y', "67tugh"), ('u', "78yihj"), ('i', "89uojk"), ('o', "90ipkl"), ('p', "0ol"),
            ('a', "qwsz"), ('s', "weadzx"), ('d', "erfsxc"), ('f', "rtgdcv"), ('g', "tyhfvb"),
            ('h', "yujgbn"), ('j', "uikhnm"), ('k', "iojlm"), ('l', "opk"),
            ('z', "asx"), ('x', "zsdc"), ('c', "xdfv"), ('v', "cfgb"), ('b', "vghn"),
            ('n', "bhjm"), ('m', "njk"),
        ],
    ));

    static ref HOMOGLYPHS: Arc<MappingTable> = Arc::new(MappingTable::new(
        "homoglyph",
        [
            ('a', vec!["а", "α", "à", "á", "ä", "ạ"]),
            ('b', vec!["ь", "ḅ"]),
            ('c', vec!["с", "ϲ", "ç"]),
            ('d', vec!["ԁ", "ɗ", "cl"]),
            ('e', vec!["е", "è", "é", "ê", "ë", "ẹ"]),
            ('g', vec!["ɡ", "ġ"]),
            ('h', vec!["һ"]),
            ('i', vec!["і", "ı", "í", "ï"]),
            ('j', vec!["ј"]),
            ('k', vec!["κ", "ķ"]),
            ('l', vec!["ӏ", "ḷ"]),
            ('m', vec!["rn", "ṃ"]),
            ('n', vec!["ո", "ñ"]),
            ('o', vec!["о", "ο", "ö", "ó", "ọ"]),
            ('p', vec!["р", "ρ"]),
            ('q', vec!["ԛ"]),
            ('r', vec!["г"]),
            ('s', vec!["ѕ", "ś"]),
            ('t', vec!["ţ"]),
            ('u', vec!["υ", "ս", "ü", "ú"]),
            ('v', vec!["ν", "ѵ"]),
            ('w', vec!["vv", "ѡ"]),
            ('x', vec!["х"]),
            ('y', vec!["у", "ý", "ÿ"]),
            ('z', vec!["ż", "ʐ"]),
        ],
    ));

    static ref SIMILAR: Arc<MappingTable> = Arc::new(MappingTable::new(
        "similar",
        [
            ('0', vec!["o"]),
            ('1', vec!["l", "i"]),
            ('a', vec!["4"]),
            ('b', vec!["6", "d"]),
            ('d', vec!["b"]),
            ('e', vec!["3"]),
            ('g', vec!["9", "q"]),
            ('i', vec!["1", "l"]),
            ('l', vec!["1", "i"]),
            ('m', vec!["n"]),
            ('n', vec!["m"]),
            ('o', vec!["0"]),
            ('q', vec!["g"]),
            ('s', vec!["5"]),
            ('t', vec!["7"]),
            ('u', vec!["v"]),
            ('v', vec!["u"]),
            ('z', vec!["2"]),
        ],
    ));
}

pub fn keyboard() -> Arc<MappingTable> {
    Arc::clone(&KEYBOARD)
}

pub fn homoglyphs() -> Arc<MappingTable> {
    Arc::clone(&HOMOGLYPHS)
}

pub fn similar() -> Arc<MappingTable> {
    Arc::clone(&SIMILAR)
}

pub const VOWELS: [char; 5] = ['a', 'e', 'i', 'o', 'u'];

pub const DEFAULT_TLDS: &[&str] = &[
    "com", "net", "org", "info", "biz", "us", "co", "io", "me",
    "app", "dev", "tech", "online", "site", "store", "shop",
    "uk", "ca", "de", "fr", "ru", "cn", "jp", "au", "br",
    "tk", "ml", "ga", "cf",
];

pub const DEFAULT_PREFIXES: &[&str] = &[
    "www", "www-", "ww", "m", "mail", "my", "web", "secure-", "login-",
];

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "support", "secure", "login", "pay", "help", "service", "account", "portal", "center", "app",
    "online", "store", "shop", "mail", "cloud", "data", "mobile", "web", "digital", "tech",
    "pro", "plus", "premium", "official", "admin", "manage", "bank", "finance", "crypto",
];
