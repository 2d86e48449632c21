//! Read access to the rendering backend's text layer

use std::collections::HashMap;
use std::sync::Arc;

use super::types::PageFragmentSet;

/// Narrow read interface onto rendered pages.
///
/// `None` means the page has not rendered yet; an empty set means it rendered
/// but its text layer is still populating. Both are transient.
pub trait FragmentSource {
    fn page_fragments(&self, page: usize) -> Option<Arc<PageFragmentSet>>;
}

impl<T: FragmentSource + ?Sized> FragmentSource for &T {
    fn page_fragments(&self, page: usize) -> Option<Arc<PageFragmentSet>> {
        (**self).page_fragments(page)
    }
}

/// Pages keyed by page number, as handed over by a backend that has already
/// rendered them
impl FragmentSource for HashMap<usize, Arc<PageFragmentSet>> {
    fn page_fragments(&self, page: usize) -> Option<Arc<PageFragmentSet>> {
        self.get(&page).cloned()
    }
}
