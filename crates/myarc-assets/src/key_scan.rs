use std::collections::BTreeSet;

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::asset_store::AssetError;

/// Scans rich-text content for asset URLs under a configured public base URL
/// and recovers the distinct set of storage keys they reference.
///
/// There is no foreign-key table linking entries to assets; this scan is the
/// sole mechanism by which the lifecycle discovers which objects are in use.
#[derive(Debug, Clone)]
pub struct AssetUrlScanner {
    pattern: Option<Regex>,
}

impl AssetUrlScanner {
    /// Builds a scanner for URLs beginning with `public_base_url`. An empty
    /// base URL yields an inert scanner that never matches, used when object
    /// storage is unconfigured.
    pub fn new(public_base_url: &str) -> Result<Self, AssetError> {
        let base = public_base_url.trim();
        if base.is_empty() {
            return Ok(Self { pattern: None });
        }

        let escaped = regex::escape(base);
        let pattern = Regex::new(&format!(r#"{escaped}([^"'\s]+)"#))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// Returns the distinct, URL-decoded storage keys referenced by `rich_text`.
    pub fn referenced_keys(&self, rich_text: &str) -> BTreeSet<String> {
        let Some(pattern) = self.pattern.as_ref() else {
            return BTreeSet::new();
        };

        pattern
            .captures_iter(rich_text)
            .filter_map(|captures| captures.get(1))
            .map(|key| {
                percent_decode_str(key.as_str())
                    .decode_utf8_lossy()
                    .into_owned()
            })
            .collect()
    }
}
