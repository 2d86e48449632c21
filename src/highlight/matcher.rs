//! Locate a target string within a page's text fragments
//!
//! Two passes: a single fragment that equals the target, then short runs of
//! adjacent fragments whose concatenation equals it. Renderers split text at
//! font and style boundaries, so a citation such as "EBITDA of USD 2.3bn" can
//! arrive as several fragments.
//!
//! Normalization is lower-casing plus trimming the ends. Inner whitespace is
//! kept as-is and fragments are concatenated without separators, exactly as
//! the renderer emits them. Hyphenation, ligatures and non-breaking spaces
//! are not folded, so such text may legitimately not be found.

use super::types::TextFragment;

/// Case/trim folding shared by both passes
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Outcome of matching a target against a page
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MatchResult<'a> {
    NotFound,
    Found {
        /// Index of the first matched fragment
        start: usize,
        /// The minimal contiguous run, never empty
        fragments: &'a [TextFragment],
    },
}

impl<'a> MatchResult<'a> {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    #[must_use]
    pub fn fragments(&self) -> Option<&'a [TextFragment]> {
        match self {
            Self::Found { fragments, .. } => Some(fragments),
            Self::NotFound => None,
        }
    }
}

/// Work performed by a single match call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Number of normalized string comparisons
    pub comparisons: usize,
    /// Largest number of fragments combined in one run
    pub widest_window: usize,
    /// Longest accumulated text (in chars) that was compared
    pub longest_accumulation: usize,
}

/// Bounded-window fragment matcher
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Matcher {
    /// Maximum number of fragments combined into one candidate
    window: usize,
    /// Stop growing a run once it exceeds this multiple of the target length
    length_factor: usize,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            window: Self::DEFAULT_WINDOW,
            length_factor: Self::DEFAULT_LENGTH_FACTOR,
        }
    }
}

impl Matcher {
    pub const DEFAULT_WINDOW: usize = 10;
    pub const DEFAULT_LENGTH_FACTOR: usize = 2;

    #[must_use]
    pub fn new(window: usize, length_factor: usize) -> Self {
        Self {
            window: window.max(1),
            length_factor: length_factor.max(1),
        }
    }

    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    #[must_use]
    pub fn length_factor(&self) -> usize {
        self.length_factor
    }

    /// Find the target among `fragments`
    #[must_use]
    pub fn find<'a>(&self, target: &str, fragments: &'a [TextFragment]) -> MatchResult<'a> {
        self.find_with_stats(target, fragments).0
    }

    /// Like [`Matcher::find`], also reporting how much work was done
    #[must_use]
    pub fn find_with_stats<'a>(
        &self,
        target: &str,
        fragments: &'a [TextFragment],
    ) -> (MatchResult<'a>, MatchStats) {
        let mut stats = MatchStats::default();
        let target = normalize(target);
        if target.is_empty() {
            return (MatchResult::NotFound, stats);
        }

        // Exact pass: the renderer already split at the citation boundary
        for (i, fragment) in fragments.iter().enumerate() {
            stats.comparisons += 1;
            if normalize(&fragment.content) == target {
                stats.widest_window = stats.widest_window.max(1);
                return (
                    MatchResult::Found {
                        start: i,
                        fragments: &fragments[i..=i],
                    },
                    stats,
                );
            }
        }

        let limit = target.chars().count().saturating_mul(self.length_factor);

        for start in 0..fragments.len() {
            let end = start.saturating_add(self.window).min(fragments.len());
            let mut combined = String::new();
            let mut combined_chars = 0;

            for j in start..end {
                let content = &fragments[j].content;
                combined.push_str(content);
                combined_chars += content.chars().count();

                let width = j - start + 1;
                stats.comparisons += 1;
                stats.widest_window = stats.widest_window.max(width);
                stats.longest_accumulation = stats.longest_accumulation.max(combined_chars);

                if normalize(&combined) == target {
                    return (
                        MatchResult::Found {
                            start,
                            fragments: &fragments[start..=j],
                        },
                        stats,
                    );
                }

                if combined_chars > limit {
                    break;
                }
            }
        }

        (MatchResult::NotFound, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::types::Rect;

    fn fragments(texts: &[&str]) -> Vec<TextFragment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| TextFragment::new(*t, Rect::new(i as f32 * 10.0, 0.0, 10.0, 12.0)))
            .collect()
    }

    #[test]
    fn normalize_folds_case_and_trims() {
        assert_eq!(normalize("  EBITDA of USD\t"), "ebitda of usd");
        assert_eq!(normalize("a  b"), "a  b");
    }

    #[test]
    fn exact_match_returns_single_fragment() {
        let page = fragments(&["Revenue", "  Gain on sale  ", "EBITDA"]);
        let result = Matcher::default().find("gain on SALE", &page);

        assert_eq!(
            result,
            MatchResult::Found {
                start: 1,
                fragments: &page[1..2]
            }
        );
    }

    #[test]
    fn exact_pass_wins_over_combination() {
        // "EBIT" + "DA" would also combine, but the single fragment is preferred
        let page = fragments(&["EBIT", "DA", "x", "EBITDA"]);
        let result = Matcher::default().find("ebitda", &page);

        assert_eq!(
            result,
            MatchResult::Found {
                start: 3,
                fragments: &page[3..4]
            }
        );
    }

    #[test]
    fn combines_adjacent_fragments() {
        let page = fragments(&["Group", "EBITDA", " of USD", " 2.3bn", "in Q2"]);
        let result = Matcher::default().find("EBITDA of USD 2.3bn", &page);

        assert_eq!(
            result,
            MatchResult::Found {
                start: 1,
                fragments: &page[1..4]
            }
        );
    }

    #[test]
    fn concatenation_is_literal() {
        // no separator is inserted between fragments
        let page = fragments(&["EBITDA", "of USD"]);
        assert_eq!(
            Matcher::default().find("EBITDA of USD", &page),
            MatchResult::NotFound
        );
    }

    #[test]
    fn blank_target_never_matches() {
        let page = fragments(&["", "  ", "text"]);
        assert_eq!(Matcher::default().find("   ", &page), MatchResult::NotFound);
    }

    #[test]
    fn empty_page_is_not_found() {
        assert_eq!(Matcher::default().find("x", &[]), MatchResult::NotFound);
    }

    #[test]
    fn runs_longer_than_window_are_not_matched() {
        let page = fragments(&["a"; 12]);
        let target = "a".repeat(11);

        assert!(!Matcher::default().find(&target, &page).is_found());
        assert!(Matcher::new(11, 2).find(&target, &page).is_found());
    }

    #[test]
    fn accumulation_stops_past_length_limit() {
        let page = fragments(&["ab", "cdefghijklmnop", "q"]);
        let (result, stats) = Matcher::default().find_with_stats("abq", &page);

        assert_eq!(result, MatchResult::NotFound);
        // "ab" + "cdef..." exceeds 2 * 3 chars, so "q" is never appended to that run
        assert!(stats.longest_accumulation <= 16);
        assert!(stats.widest_window <= 2);
    }

    #[test]
    fn unbounded_window_and_factor_do_not_overflow() {
        let page = fragments(&["a", "a", "a"]);
        let matcher = Matcher::new(usize::MAX, usize::MAX);

        assert!(matcher.find("aa", &page).is_found());
        assert!(!matcher.find("b", &page).is_found());
    }

    #[test]
    fn non_breaking_space_is_not_folded() {
        let page = fragments(&["USD\u{a0}2.3bn"]);
        assert!(!Matcher::default().find("USD 2.3bn", &page).is_found());
    }

    #[test]
    fn length_is_counted_in_chars() {
        let page = fragments(&["Résumé", " été"]);
        assert!(Matcher::default().find("résumé été", &page).is_found());
    }
}
