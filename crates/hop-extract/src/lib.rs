//! Lexical IPv4 hop extraction for route-tracing tool output.
//!
//! `hop-extract` finds dotted-quad IPv4 addresses in the text printed by
//! `traceroute` and `tracert`. Matching is purely lexical: four groups of one
//! to three ASCII digits separated by literal dots. Octets are not range
//! checked, so `999.999.999.999` is reported just like `10.0.0.1`. This keeps
//! the extractor exactly as permissive as the tools whose output it reads.
//!
//! ## Quick Start
//!
//! ```
//! use hop_extract::extract_addresses;
//!
//! let line = " 1  10.1.1.1 (10.1.1.1)  2 ms";
//! assert_eq!(extract_addresses(line), vec!["10.1.1.1", "10.1.1.1"]);
//! ```
//!
//! ## Tagging and Output
//!
//! For structured output (one JSON object per tool line), use `Tagged` and `Tag`:
//!
//! ```no_run
//! use hop_extract::{Extractor, Tag, Tagged};
//!
//! # fn main() -> anyhow::Result<()> {
//! let data = b" 2  192.168.0.1  1.734 ms";
//! let mut tagged = Tagged::new(data);
//!
//! for range in Extractor::global().find_iter(data) {
//!     let ip = std::str::from_utf8(&data[range.clone()])?;
//!     tagged = tagged.tag(Tag::new(ip).with_range(range));
//! }
//! tagged.write_json(&mut std::io::stdout())?;
//! # Ok(())
//! # }
//! ```

use std::ops::Range;
use std::sync::OnceLock;

use regex_automata::meta::Regex;
use regex_automata::MatchKind;
use regex_syntax::hir::Hir;

mod tag;
pub use tag::{Tag, Tagged};

/// Four groups of 1-3 ASCII digits joined by dots. No octet bounds.
static DOTTED_QUAD_PATTERN: &str = r"(?:[0-9]{1,3}\.){3}[0-9]{1,3}";

static GLOBAL: OnceLock<Extractor> = OnceLock::new();

/// A searcher for dotted-quad hop addresses.
///
/// Matches are non-overlapping and reported leftmost-first, which is the same
/// order in which the addresses appear in the tool output. Duplicates are kept:
/// `traceroute` commonly prints a hop both bare and in parentheses.
#[derive(Clone, Debug)]
pub struct Extractor {
    regex: Regex,
}

impl Extractor {
    /// Compile a new extractor.
    ///
    /// Most callers want [`Extractor::global`], which compiles once per process.
    pub fn new() -> anyhow::Result<Extractor> {
        let hir: Hir = regex_syntax::Parser::new().parse(DOTTED_QUAD_PATTERN)?;

        let regex = Regex::builder()
            .configure(
                Regex::config()
                    .auto_prefilter(true)
                    .match_kind(MatchKind::LeftmostFirst),
            )
            .build_from_hir(&hir)?;

        Ok(Extractor { regex })
    }

    /// The process-wide extractor, compiled on first use.
    pub fn global() -> &'static Extractor {
        GLOBAL.get_or_init(|| Extractor::new().expect("dotted-quad pattern is valid"))
    }

    /// Find all dotted quads in a byte slice.
    ///
    /// Returns an iterator of byte ranges `[start, end)` into `haystack`, left to right.
    ///
    /// # Example
    ///
    /// ```
    /// use hop_extract::Extractor;
    ///
    /// let data = b"traceroute to 8.8.8.8 (8.8.8.8), 30 hops max";
    /// let found: Vec<_> = Extractor::global().find_iter(data).collect();
    /// assert_eq!(found, vec![14..21, 23..30]);
    /// ```
    #[inline]
    pub fn find_iter<'a>(&'a self, haystack: &'a [u8]) -> impl Iterator<Item = Range<usize>> + 'a {
        self.regex.find_iter(haystack).map(|m| m.range())
    }

    /// Find all dotted quads in a string, yielding the matched text.
    #[inline]
    pub fn extract<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        // The pattern is pure ASCII, so every range lies on a char boundary.
        self.find_iter(text.as_bytes()).map(move |range| &text[range])
    }
}

/// Extract every dotted-quad address in `text`, in order of appearance.
///
/// Empty input, or input with no matches, yields an empty vector.
pub fn extract_addresses(text: &str) -> Vec<&str> {
    Extractor::global().extract(text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_and_parenthesized_hop() {
        assert_eq!(
            extract_addresses("1  10.1.1.1 (10.1.1.1)  2 ms"),
            vec!["10.1.1.1", "10.1.1.1"]
        );
    }

    #[test]
    fn no_octet_validation() {
        assert_eq!(extract_addresses("x 999.999.999.999 y"), vec!["999.999.999.999"]);
    }

    #[test]
    fn empty_and_unmatched() {
        assert!(extract_addresses("").is_empty());
        assert!(extract_addresses(" 3  * * *").is_empty());
        assert!(extract_addresses("1.2.3 and 4.5").is_empty());
    }

    #[test]
    fn long_digit_runs_match_leftmost() {
        // "1234" cannot start a match, so the scan resumes one byte later.
        assert_eq!(extract_addresses("1234.1.1.1"), vec!["234.1.1.1"]);
        assert_eq!(extract_addresses("1.2.3.4.5.6.7.8"), vec!["1.2.3.4", "5.6.7.8"]);
    }
}
