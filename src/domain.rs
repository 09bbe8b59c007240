use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// A base domain split into its second-level label and top-level suffix.
///
/// Only the last two dot-separated parts are kept: `a.b.com` becomes
/// label `b`, suffix `com`. The suffix is lowercased; the label keeps its case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Domain {
    label: String,
    suffix: String,
}

impl Domain {
    pub fn parse(raw: &str) -> Result<Self> {
        let (label, suffix) = parse(raw).ok_or_else(|| Error::InvalidDomain {
            input: raw.to_string(),
        })?;
        Ok(Self { label, suffix })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.label, self.suffix)
    }
}

/// Splits `raw` into `(label, suffix)`. Returns `None` when there are fewer
/// than two parts or either part is empty. No character-class validation.
pub fn parse(raw: &str) -> Option<(String, String)> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);

    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.len() < 2 {
        return None;
    }

    let label = parts[parts.len() - 2].trim();
    let suffix = parts[parts.len() - 1].trim();
    if label.is_empty() || suffix.is_empty() {
        return None;
    }

    Some((label.to_string(), suffix.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_label_and_suffix() {
        assert_eq!(
            parse("example.com"),
            Some(("example".to_string(), "com".to_string()))
        );
    }

    #[test]
    fn keeps_only_registrable_pair() {
        assert_eq!(parse("a.b.com"), Some(("b".to_string(), "com".to_string())));
    }

    #[test]
    fn lowercases_suffix_but_not_label() {
        assert_eq!(
            parse("  ExAmple.COM. "),
            Some(("ExAmple".to_string(), "com".to_string()))
        );
    }

    #[test]
    fn rejects_single_part() {
        assert_eq!(parse("example"), None);
        assert_eq!(parse("example."), None);
        assert_eq!(parse("a"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn rejects_empty_parts() {
        assert_eq!(parse(".com"), None);
        assert_eq!(parse("example.."), None);
        assert_eq!(parse("example. "), None);
    }

    #[test]
    fn domain_parse_reports_input() {
        let err = Domain::parse("nodots").unwrap_err();
        assert!(matches!(err, Error::InvalidDomain { ref input } if input == "nodots"));

        let domain = Domain::parse("example.com").unwrap();
        assert_eq!(domain.label(), "example");
        assert_eq!(domain.suffix(), "com");
        assert_eq!(domain.to_string(), "example.com");
    }
}
