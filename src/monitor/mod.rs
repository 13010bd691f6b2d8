//! Balance monitoring pipeline.
//!
//! - `evaluator`: balance vs. limits classification
//! - `formatter`: violation → chat alert payload
//! - `poll_loop`: the cancellable fetch/evaluate/notify loop
//! - `shutdown`: interrupt handling for the loop's cancellation token

mod evaluator;
mod formatter;
mod poll_loop;
mod shutdown;

pub use evaluator::{ThresholdEvaluator, Violation, ViolationKind};
pub use formatter::{AlertFormatter, AlertPayload, ALERT_HEADER};
pub use poll_loop::{CycleOutcome, LoopState, PollLoop};
pub use shutdown::shutdown_on_signal;
