//! Fixture documents: a described stand-in for an asynchronously rendering
//! backend.
//!
//! A fixture lists pages with their text fragments in page-local coordinates
//! at scale 1.0. Each page becomes available `render_delay_ms` after rendering
//! starts, and is reported in viewport space at the current scale. Changing
//! the scale discards every rendered page and starts rendering again, the way
//! a viewer re-renders on zoom.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use serde::Deserialize;

use crate::highlight::{FragmentSource, PageFragmentSet, Rect, TextFragment, ViewState};

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("page {0} is listed more than once")]
    DuplicatePage(usize),

    #[error("page {page} is outside the document (1..={page_count})")]
    PageOutOfRange { page: usize, page_count: usize },
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    page_count: Option<usize>,
    #[serde(default)]
    pages: Vec<FixturePage>,
}

/// One page as described in the fixture file
#[derive(Clone, Debug, Deserialize)]
pub struct FixturePage {
    pub page: usize,
    /// Page container rectangle at scale 1.0
    pub origin: Rect,
    #[serde(default)]
    pub render_delay_ms: u64,
    #[serde(default)]
    pub fragments: Vec<TextFragment>,
}

impl FixturePage {
    fn render_delay(&self) -> Duration {
        Duration::from_millis(self.render_delay_ms)
    }

    /// Fragments in viewport space at `scale`
    fn render(&self, scale: f32) -> PageFragmentSet {
        let origin = self.origin;
        let fragments = self
            .fragments
            .iter()
            .map(|f| {
                let local = f.bounds.scaled(scale);
                TextFragment::new(
                    f.content.clone(),
                    Rect::new(origin.x + local.x, origin.y + local.y, local.width, local.height),
                )
            })
            .collect();

        PageFragmentSet::new(
            self.page,
            Rect::new(
                origin.x,
                origin.y,
                origin.width * scale,
                origin.height * scale,
            ),
            scale,
            fragments,
        )
    }
}

/// Simulated document with per-page render latency
pub struct FixtureDocument {
    page_count: usize,
    pages: BTreeMap<usize, FixturePage>,
    scale: f32,
    render_started: Instant,
    rendered: HashMap<usize, Arc<PageFragmentSet>>,
}

impl FixtureDocument {
    /// Load a fixture from a YAML (or JSON) file
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, FixtureError> {
        let file: FixtureFile = serde_yaml::from_str(content)?;
        Self::from_pages(file.pages, file.page_count)
    }

    /// Build a document from pages; `page_count` defaults to the highest page listed
    pub fn from_pages(
        pages: Vec<FixturePage>,
        page_count: Option<usize>,
    ) -> Result<Self, FixtureError> {
        let highest = pages.iter().map(|p| p.page).max().unwrap_or(0);
        let page_count = page_count.unwrap_or(highest);

        let mut by_number = BTreeMap::new();
        for page in pages {
            if page.page == 0 || page.page > page_count {
                return Err(FixtureError::PageOutOfRange {
                    page: page.page,
                    page_count,
                });
            }
            let number = page.page;
            if by_number.insert(number, page).is_some() {
                return Err(FixtureError::DuplicatePage(number));
            }
        }

        Ok(Self {
            page_count,
            pages: by_number,
            scale: ViewState::DEFAULT_SCALE,
            render_started: Instant::now(),
            rendered: HashMap::new(),
        })
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Start (or restart) rendering every page at the current scale
    pub fn start_rendering(&mut self, now: Instant) {
        self.render_started = now;
        self.rendered.clear();
    }

    /// Re-render the document at `scale`, starting at `now`
    pub fn set_scale(&mut self, scale: f32, now: Instant) {
        let scale = ViewState::clamp_scale(scale);
        if (self.scale - scale).abs() > f32::EPSILON {
            debug!("Fixture re-rendering at scale {scale:.2}");
            self.scale = scale;
            self.start_rendering(now);
        }
    }

    /// Finish rendering every page whose delay has elapsed.
    ///
    /// Returns the pages that became available, in page order.
    pub fn advance(&mut self, now: Instant) -> Vec<usize> {
        let mut finished = vec![];
        for (number, page) in &self.pages {
            if self.rendered.contains_key(number) {
                continue;
            }
            if self.render_started + page.render_delay() <= now {
                self.rendered
                    .insert(*number, Arc::new(page.render(self.scale)));
                finished.push(*number);
            }
        }
        finished
    }

    /// When the next pending page finishes rendering
    #[must_use]
    pub fn next_render_at(&self) -> Option<Instant> {
        self.pages
            .values()
            .filter(|p| !self.rendered.contains_key(&p.page))
            .map(|p| self.render_started + p.render_delay())
            .min()
    }
}

impl FragmentSource for FixtureDocument {
    fn page_fragments(&self, page: usize) -> Option<Arc<PageFragmentSet>> {
        self.rendered.get(&page).cloned()
    }
}
