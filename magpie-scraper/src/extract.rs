use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Canonical numeric identifier for a harvested item (a pin or a document).
///
/// Two URLs that point at the same underlying item always reduce to the same
/// `ItemId`, whatever slug style the site wrapped around the digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

/// Maps raw discovered URLs to canonical identifiers.
///
/// The patterns form a priority chain, first match wins:
///   1. `/<kind>/<digits>` strict path form
///   2. `/<kind>/<slug>--<digits>` double-dash slug form
///   3. `/<kind>/<slug>-<digits>` single-dash slug form
///   4. any bare run of digits in the URL (fallback)
///
/// Pattern 4 trades precision for recall and can latch onto unrelated numeric
/// substrings such as timestamps; `without_bare_fallback` restricts extraction
/// to the kind-scoped patterns 1-3.
pub struct IdExtractor {
    kind: String,
    strict: Regex,
    double_dash: Regex,
    single_dash: Regex,
    bare: Option<Regex>,
}

impl IdExtractor {
    /// Extractor for `kind` path segments with the default 10-20 digit range.
    pub fn new(kind: &str) -> Self {
        Self::with_digit_range(kind, 10, 20)
    }

    pub fn with_digit_range(kind: &str, min_digits: usize, max_digits: usize) -> Self {
        let kind_escaped = regex::escape(kind);
        let digits = format!(r"(\d{{{min_digits},{max_digits}}})");
        // Pattern strings are assembled from validated parts; parse failure
        // here would be a programming error, same class as a bad selector.
        let strict = Regex::new(&format!(r"/{kind_escaped}/{digits}")).expect("strict pattern");
        let double_dash =
            Regex::new(&format!(r"/{kind_escaped}/[^/]*--{digits}/?")).expect("double-dash pattern");
        let single_dash =
            Regex::new(&format!(r"/{kind_escaped}/[^/]*-{digits}/?")).expect("single-dash pattern");
        let bare = Regex::new(&digits).expect("bare digit pattern");

        Self {
            kind: kind.to_string(),
            strict,
            double_dash,
            single_dash,
            bare: Some(bare),
        }
    }

    /// Require one of the kind-scoped patterns to match; never fall back to a
    /// bare digit run.
    pub fn without_bare_fallback(mut self) -> Self {
        self.bare = None;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Extract the canonical identifier from a raw URL.
    ///
    /// `None` means the URL is not an item link; callers discard it without
    /// treating it as a failure of the run.
    pub fn extract(&self, url: &str) -> Option<ItemId> {
        let chain = [&self.strict, &self.double_dash, &self.single_dash];
        for pattern in chain {
            if let Some(caps) = pattern.captures(url) {
                return Some(ItemId::new(&caps[1]));
            }
        }

        if let Some(bare) = &self.bare
            && let Some(caps) = bare.captures(url)
        {
            debug!(url, id = &caps[1], "identifier matched via bare digit fallback");
            return Some(ItemId::new(&caps[1]));
        }

        debug!(url, "no identifier pattern matched");
        None
    }
}
