//! Message types for actor-based communication.
//!
//! This module defines the commands exchanged between callers (GUI thread,
//! CLI) and the [`PiService`](crate::service::PiService) actor.
//!
//! # Message Flow
//!
//! ```text
//! Caller                             Actor Task
//! ------                             ----------
//! 1. Create command with oneshot
//! 2. Send via mpsc channel    ------>
//!                                    3. Receive command
//!                                    4. Process (may query the schedule)
//!                                    5. Send response
//! 6. Await oneshot receiver   <------
//! ```
//!
//! The schedule query happens inside the actor task, so a slow or hanging
//! service never blocks the caller's event loop.
//!
//! Each command variant has a helper that creates the command together with
//! the receiver for its response:
//!
//! ```rust
//! use alshub::messages::HubCommand;
//!
//! let (cmd, rx) = HubCommand::set_auto_pi(true);
//! // cmd_tx.send(cmd).await?;
//! // let outcome = rx.await?;
//! ```

use tokio::sync::oneshot;

use crate::error::HubResult;
use crate::reconcile::ReconcileOutcome;
use crate::service::ServiceStatus;
use crate::session::PanelSession;

/// Commands accepted by the PI service actor.
#[derive(Debug)]
pub enum HubCommand {
    /// Poll the schedule and reconcile immediately.
    ReconcileNow {
        /// Outcome of the reconciliation.
        response: oneshot::Sender<ReconcileOutcome>,
    },

    /// Apply the panel: in automatic mode reconcile now and start the timer,
    /// otherwise stop the timer.
    Apply {
        /// Outcome (`Skipped` in manual mode).
        response: oneshot::Sender<ReconcileOutcome>,
    },

    /// Toggle automatic PI mode.
    ///
    /// Entering automatic mode reconciles once immediately and starts the
    /// timer; leaving it stops the timer.
    SetAutoPi {
        /// New mode.
        enabled: bool,
        /// Reconciliation outcome when one was triggered.
        response: oneshot::Sender<HubResult<Option<ReconcileOutcome>>>,
    },

    /// Change the endstation (reconciles immediately in automatic mode).
    SetEndstation {
        /// New endstation identifier.
        endstation: String,
        /// Reconciliation outcome when one was triggered.
        response: oneshot::Sender<HubResult<Option<ReconcileOutcome>>>,
    },

    /// Direct edit of the PI email (manual mode only).
    SetPiEmail {
        /// New PI email.
        email: String,
        /// Whether the value changed.
        response: oneshot::Sender<HubResult<bool>>,
    },

    /// Direct edit of the user email.
    SetUserEmail {
        /// New user email.
        email: String,
        /// Whether the value changed.
        response: oneshot::Sender<HubResult<bool>>,
    },

    /// Start the periodic timer (no-op if running).
    StartPolling {
        /// Acknowledgement.
        response: oneshot::Sender<()>,
    },

    /// Stop the periodic timer (no-op if stopped).
    StopPolling {
        /// Acknowledgement.
        response: oneshot::Sender<()>,
    },

    /// Report the service status.
    GetStatus {
        /// Current status.
        response: oneshot::Sender<ServiceStatus>,
    },

    /// Produce a persistable copy of the settings panel.
    ExportSession {
        /// Whether the user email is included.
        include_user_email: bool,
        /// The session.
        response: oneshot::Sender<PanelSession>,
    },

    /// Stop the timer and end the actor task.
    Shutdown {
        /// Acknowledgement, sent before the task exits.
        response: oneshot::Sender<()>,
    },
}

impl HubCommand {
    /// Create a `ReconcileNow` command.
    pub fn reconcile_now() -> (Self, oneshot::Receiver<ReconcileOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self::ReconcileNow { response: tx }, rx)
    }

    /// Create an `Apply` command.
    pub fn apply() -> (Self, oneshot::Receiver<ReconcileOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self::Apply { response: tx }, rx)
    }

    /// Create a `SetAutoPi` command.
    pub fn set_auto_pi(
        enabled: bool,
    ) -> (Self, oneshot::Receiver<HubResult<Option<ReconcileOutcome>>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::SetAutoPi {
                enabled,
                response: tx,
            },
            rx,
        )
    }

    /// Create a `SetEndstation` command.
    pub fn set_endstation(
        endstation: String,
    ) -> (Self, oneshot::Receiver<HubResult<Option<ReconcileOutcome>>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::SetEndstation {
                endstation,
                response: tx,
            },
            rx,
        )
    }

    /// Create a `SetPiEmail` command.
    pub fn set_pi_email(email: String) -> (Self, oneshot::Receiver<HubResult<bool>>) {
        let (tx, rx) = oneshot::channel();
        (Self::SetPiEmail { email, response: tx }, rx)
    }

    /// Create a `SetUserEmail` command.
    pub fn set_user_email(email: String) -> (Self, oneshot::Receiver<HubResult<bool>>) {
        let (tx, rx) = oneshot::channel();
        (Self::SetUserEmail { email, response: tx }, rx)
    }

    /// Create a `StartPolling` command.
    pub fn start_polling() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::StartPolling { response: tx }, rx)
    }

    /// Create a `StopPolling` command.
    pub fn stop_polling() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::StopPolling { response: tx }, rx)
    }

    /// Create a `GetStatus` command.
    pub fn get_status() -> (Self, oneshot::Receiver<ServiceStatus>) {
        let (tx, rx) = oneshot::channel();
        (Self::GetStatus { response: tx }, rx)
    }

    /// Create an `ExportSession` command.
    pub fn export_session(include_user_email: bool) -> (Self, oneshot::Receiver<PanelSession>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::ExportSession {
                include_user_email,
                response: tx,
            },
            rx,
        )
    }

    /// Create a `Shutdown` command.
    pub fn shutdown() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Shutdown { response: tx }, rx)
    }
}
