//! Operator notifications.
//!
//! The host application decides how a notification is shown (toast, status
//! bar, log line). The service only hands a [`Notification`] to whatever
//! [`Notifier`] it was built with.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

/// Message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Text to display.
    pub message: String,
    /// When the notification was raised.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Greeting for a newly scheduled PI.
    pub fn welcome(pi_name: &str) -> Self {
        Self {
            message: format!("Welcome {pi_name}!"),
            timestamp: Utc::now(),
        }
    }
}

/// Sink for operator notifications.
pub trait Notifier: Send + Sync {
    /// Deliver one notification. Must not block.
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        info!(target: "alshub::notify", "{}", notification.message);
    }
}

/// Forwards notifications over a channel, e.g. to a GUI event loop.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create the notifier and the receiving end for the consumer.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is watching; dropping is fine.
        let _ = self.tx.send(notification);
    }
}
