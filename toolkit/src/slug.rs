use once_cell::sync::Lazy;
use regex::Regex;

use crate::Toolkit;
use crate::errors::{Error, Result};

/// Runs of anything that is not a lowercase ASCII letter or digit
static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

impl Toolkit {
    /// Lowercases `s`, collapses every run of characters outside `[a-z0-9]` into a single
    /// hyphen and trims hyphens from both ends.
    ///
    /// Fails with [`Error::EmptyInput`] for an empty string and [`Error::EmptyResult`] when
    /// nothing survives normalization (e.g. input written entirely in a non-Latin script).
    pub fn slugify(&self, s: &str) -> Result<String> {
        if s.is_empty() {
            return Err(Error::EmptyInput);
        }

        let lowered = s.to_lowercase();
        let slug = NON_SLUG_CHARS.replace_all(&lowered, "-").trim_matches('-').to_string();
        if slug.is_empty() {
            return Err(Error::EmptyResult);
        }

        Ok(slug)
    }
}
