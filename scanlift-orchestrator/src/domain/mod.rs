//! Domain types for session orchestration

pub mod clock;
pub mod outcome;

pub use clock::Clock;
pub use outcome::{OutcomeStatus, ScanOutcome};
