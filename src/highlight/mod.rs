//! Citation highlight locator and overlay engine

mod geometry;
mod matcher;
mod overlay;
mod request;
mod scheduler;
mod source;
mod types;

pub use geometry::resolve;
pub use matcher::{MatchResult, MatchStats, Matcher, normalize};
pub use overlay::{OverlayManager, OverlayStyle, OverlaySurface, Rgba};
pub use request::{HighlightError, HighlightRequest, HighlightState, RequestId};
pub use scheduler::{AttemptFailure, Command, HighlightEvent, Phase, RetryPolicy, Scheduler};
pub use source::FragmentSource;
pub use types::*;
