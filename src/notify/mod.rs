//! Operator notifications.

/// Slack notifier
pub mod slack;

pub use slack::SlackNotifier;
