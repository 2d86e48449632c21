//! Highlight requests and the single active-request slot

use std::fmt;

use serde::Serialize;

use super::scheduler::Command;

/// Unique identifier for highlight requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// "Find and mark this text on this page"
///
/// Requests are never mutated; a new one supersedes the old.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightRequest {
    pub id: RequestId,
    /// Page number (1-indexed)
    pub page: usize,
    pub text: String,
}

impl fmt::Display for HighlightRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "highlight-{}-{}", self.page, self.id.0)
    }
}

/// Errors raised when a highlight request is created
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HighlightError {
    #[error("page {page} is outside the document (1..={page_count})")]
    InvalidPage { page: usize, page_count: usize },

    #[error("highlight text is empty")]
    EmptyText,
}

/// Holds the single active highlight request, owned by the application shell
#[derive(Debug, Default)]
pub struct HighlightState {
    active: Option<HighlightRequest>,
    /// Known page count, if the document has loaded
    page_count: Option<usize>,
    next_request_id: u64,
}

impl HighlightState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state that rejects pages past `page_count`
    #[must_use]
    pub fn with_page_count(page_count: usize) -> Self {
        Self {
            page_count: Some(page_count),
            ..Self::default()
        }
    }

    pub fn set_page_count(&mut self, page_count: usize) {
        self.page_count = Some(page_count);
    }

    #[must_use]
    pub fn active(&self) -> Option<&HighlightRequest> {
        self.active.as_ref()
    }

    /// Replace the active request and return the command that announces it
    pub fn highlight_text(
        &mut self,
        page: usize,
        text: impl Into<String>,
    ) -> Result<Command, HighlightError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(HighlightError::EmptyText);
        }

        let out_of_range = match self.page_count {
            Some(count) => page == 0 || page > count,
            None => page == 0,
        };
        if out_of_range {
            return Err(HighlightError::InvalidPage {
                page,
                page_count: self.page_count.unwrap_or(0),
            });
        }

        let request = HighlightRequest {
            id: self.next_id(),
            page,
            text,
        };
        self.active = Some(request.clone());
        Ok(Command::Request(request))
    }

    /// Drop the active request
    pub fn clear(&mut self) -> Command {
        self.active = None;
        Command::Clear
    }

    fn next_id(&mut self) -> RequestId {
        self.next_request_id += 1;
        RequestId::new(self.next_request_id)
    }
}
