//! Alert delivery to the operator chat channel.

mod log;
mod slack;
mod traits;

pub use log::LogSink;
pub use slack::SlackNotifier;
pub use traits::AlertSink;
#[cfg(test)]
pub use traits::MockAlertSink;
