//! Turn a matched fragment run into one page-relative rectangle

use super::types::{Rect, TextFragment};

/// Bounding box of all fragment boxes, relative to `page_origin`'s top-left.
///
/// Returns `None` for an empty run.
#[must_use]
pub fn resolve(fragments: &[TextFragment], page_origin: Rect) -> Option<Rect> {
    let (first, rest) = fragments.split_first()?;

    // Normalizes negative extents on the first box too
    let seed = first.bounds.union(&first.bounds);
    let bounds = rest
        .iter()
        .fold(seed, |acc, fragment| acc.union(&fragment.bounds));

    Some(bounds.relative_to(page_origin.x, page_origin.y))
}
