// Export modules for use in tests
pub mod fixture;
pub mod highlight;
pub mod panic_handler;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the engine entry points
pub use highlight::{Command, HighlightEvent, HighlightState, OverlayManager, Scheduler};
