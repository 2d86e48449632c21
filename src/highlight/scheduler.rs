//! Locate-and-mark scheduling
//!
//! Pages render asynchronously, so the text layer for the requested page may
//! not exist yet when a highlight is requested. The scheduler retries on a
//! fixed delay until the text is found or the retry budget runs out.
//!
//! Time is injected: the host calls [`Scheduler::apply`] for every upstream
//! event and [`Scheduler::poll`] once [`Scheduler::next_deadline`] has
//! passed. There is one logical thread of control; a new request cancels the
//! pending retry before anything else happens, so attempts for two requests
//! never interleave.

use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use log::{debug, info, warn};

use super::geometry;
use super::matcher::{MatchResult, Matcher};
use super::overlay::{OverlayManager, OverlaySurface};
use super::request::{HighlightRequest, RequestId};
use super::source::FragmentSource;
use super::types::{OverlayRegion, Rect, ViewState};

/// Retry timing for one locate cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before the first attempt of a new request
    pub initial_delay: Duration,
    /// Wait between failed attempts
    pub retry_delay: Duration,
    /// Attempts after the first one before giving up
    pub max_retries: u32,
    /// Wait after a zoom or scroll before re-resolving
    pub view_change_delay: Duration,
}

impl RetryPolicy {
    /// Longest wait the scheduler will arm, whatever the configured delays
    pub const MAX_DELAY: Duration = Duration::from_secs(60 * 60);

    /// Copy of this policy with every delay capped at [`RetryPolicy::MAX_DELAY`]
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            initial_delay: self.initial_delay.min(Self::MAX_DELAY),
            retry_delay: self.retry_delay.min(Self::MAX_DELAY),
            view_change_delay: self.view_change_delay.min(Self::MAX_DELAY),
            ..self
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            retry_delay: Duration::from_millis(200),
            max_retries: 5,
            view_change_delay: Duration::from_millis(100),
        }
    }
}

/// Where the active request is in its locate cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No active request
    Idle,
    /// Waiting for or running attempt number `attempt` (0-based)
    Attempting { attempt: u32 },
    /// Overlay shown
    Matched,
    /// Retry budget spent without a match
    Exhausted,
}

/// Upstream events that drive the scheduler
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// A new active request, superseding any previous one
    Request(HighlightRequest),
    /// The active request was cleared
    Clear,
    /// Zoom or visible page changed
    ViewChanged(ViewState),
    /// The backend finished rendering a page
    PageRendered(usize),
}

/// Why a single attempt did not produce an overlay
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    #[error("page fragments not available yet")]
    FragmentsUnavailable,

    #[error("text not found on page")]
    NoMatch,
}

/// Outcome of a locate cycle, reported on the event channel
#[derive(Clone, Debug, PartialEq)]
pub enum HighlightEvent {
    Matched {
        request: RequestId,
        page: usize,
        rect: Rect,
        attempts: u32,
    },
    Exhausted {
        request: RequestId,
        page: usize,
        attempts: u32,
        reason: AttemptFailure,
    },
}

#[derive(Clone, Copy, Debug)]
struct PendingAttempt {
    due: Instant,
    attempt: u32,
}

/// Drives matcher, geometry and overlay for the single active request
pub struct Scheduler<S: OverlaySurface> {
    policy: RetryPolicy,
    matcher: Matcher,
    overlay: OverlayManager<S>,
    active: Option<HighlightRequest>,
    phase: Phase,
    pending: Option<PendingAttempt>,
    view: ViewState,
    events_tx: Sender<HighlightEvent>,
    events_rx: Receiver<HighlightEvent>,
}

impl<S: OverlaySurface> Scheduler<S> {
    #[must_use]
    pub fn new(policy: RetryPolicy, overlay: OverlayManager<S>) -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        Self {
            policy: policy.clamped(),
            matcher: Matcher::default(),
            overlay,
            active: None,
            phase: Phase::Idle,
            pending: None,
            view: ViewState::default(),
            events_tx,
            events_rx,
        }
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    #[must_use]
    pub fn with_view(mut self, view: ViewState) -> Self {
        self.view = view;
        self
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn active(&self) -> Option<&HighlightRequest> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn view(&self) -> ViewState {
        self.view
    }

    #[must_use]
    pub fn overlay(&self) -> &OverlayManager<S> {
        &self.overlay
    }

    /// Receiver for cycle outcomes
    #[must_use]
    pub fn events(&self) -> &Receiver<HighlightEvent> {
        &self.events_rx
    }

    /// When the host should next call [`Scheduler::poll`]
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.due)
    }

    /// Apply an upstream event
    pub fn apply<F: FragmentSource + ?Sized>(&mut self, cmd: Command, now: Instant, source: &F) {
        match cmd {
            Command::Request(request) => {
                debug!("New highlight request {request}: {:?}", request.text);
                self.active = Some(request);
                self.start_cycle(now, self.policy.initial_delay);
            }

            Command::Clear => {
                if let Some(request) = self.active.take() {
                    debug!("Cleared highlight request {request}");
                }
                self.pending = None;
                self.overlay.clear();
                self.phase = Phase::Idle;
            }

            Command::ViewChanged(view) => {
                if self.view == view {
                    return;
                }
                self.view = view;
                if self.active.is_some() {
                    debug!(
                        "View changed (scale {:.2}, page {}), re-resolving highlight",
                        view.scale, view.visible_page
                    );
                    self.start_cycle(now, self.policy.view_change_delay);
                }
            }

            Command::PageRendered(page) => {
                let is_active_page = self.active.as_ref().is_some_and(|r| r.page == page);
                if !is_active_page {
                    return;
                }

                match self.phase {
                    Phase::Attempting { .. } => {
                        // Pull the pending attempt forward instead of waiting for its timer
                        if let Some(pending) = self.pending.take() {
                            self.run_attempt(pending.attempt, now, source);
                        }
                    }
                    Phase::Matched | Phase::Exhausted => {
                        self.start_cycle(now, Duration::ZERO);
                        self.poll(now, source);
                    }
                    Phase::Idle => {}
                }
            }
        }
    }

    /// Run the pending attempt if it is due. Returns true if an attempt ran.
    pub fn poll<F: FragmentSource + ?Sized>(&mut self, now: Instant, source: &F) -> bool {
        match self.pending {
            Some(pending) if pending.due <= now => {
                self.pending = None;
                self.run_attempt(pending.attempt, now, source);
                true
            }
            _ => false,
        }
    }

    fn start_cycle(&mut self, now: Instant, delay: Duration) {
        self.overlay.clear();
        self.phase = Phase::Attempting { attempt: 0 };
        self.pending = Some(PendingAttempt {
            due: deadline(now, delay),
            attempt: 0,
        });
    }

    fn run_attempt<F: FragmentSource + ?Sized>(&mut self, attempt: u32, now: Instant, source: &F) {
        let Some(request) = self.active.as_ref() else {
            self.pending = None;
            return;
        };
        let (id, page) = (request.id, request.page);
        let attempts = attempt + 1;

        debug!("Locating {request}: attempt {attempts}");
        let outcome = locate(&self.matcher, request, source);

        match outcome {
            Ok(rect) => {
                self.overlay.show(OverlayRegion {
                    request: id,
                    page,
                    rect,
                });
                self.phase = Phase::Matched;
                info!("Highlight {id} placed on page {page} after {attempts} attempt(s)");
                self.report(HighlightEvent::Matched {
                    request: id,
                    page,
                    rect,
                    attempts,
                });
            }

            Err(failure) if attempt < self.policy.max_retries => {
                debug!("Attempt {attempts} for {id} failed: {failure}, retrying");
                self.phase = Phase::Attempting {
                    attempt: attempt + 1,
                };
                self.pending = Some(PendingAttempt {
                    due: deadline(now, self.policy.retry_delay),
                    attempt: attempt + 1,
                });
            }

            Err(failure) => {
                self.overlay.clear();
                self.phase = Phase::Exhausted;
                warn!("Highlight {id} not placed on page {page} after {attempts} attempts: {failure}");
                self.report(HighlightEvent::Exhausted {
                    request: id,
                    page,
                    attempts,
                    reason: failure,
                });
            }
        }
    }

    fn report(&self, event: HighlightEvent) {
        // We hold the receiver ourselves, so the channel never disconnects
        let _ = self.events_tx.send(event);
    }
}

fn deadline(now: Instant, delay: Duration) -> Instant {
    let delay = delay.min(RetryPolicy::MAX_DELAY);
    now.checked_add(delay).unwrap_or(now)
}

/// One matcher → geometry pass over the current fragments of the request's page
fn locate<F: FragmentSource + ?Sized>(
    matcher: &Matcher,
    request: &HighlightRequest,
    source: &F,
) -> Result<Rect, AttemptFailure> {
    let set = source
        .page_fragments(request.page)
        .filter(|set| !set.is_empty())
        .ok_or(AttemptFailure::FragmentsUnavailable)?;

    match matcher.find(&request.text, &set.fragments) {
        MatchResult::Found { fragments, .. } => {
            geometry::resolve(fragments, set.origin).ok_or(AttemptFailure::NoMatch)
        }
        MatchResult::NotFound => Err(AttemptFailure::NoMatch),
    }
}
