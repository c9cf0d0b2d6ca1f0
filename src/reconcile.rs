//! PI reconciliation.
//!
//! Pure state transition that keeps `ReconciliationState::pi_email` in step
//! with the schedule. The service feeds it the outcome of a poll; nothing here
//! touches the network or the clock, so every rule is testable in isolation.
//!
//! ## Rules
//!
//! - Nothing happens while automatic PI mode is off ([`ReconcileOutcome::Skipped`]).
//! - The polled email (or `""` when no PI is scheduled) replaces the stored
//!   one only if it differs ([`ReconcileOutcome::Unchanged`] otherwise).
//! - A change to a non-empty email carries the PI's name so the caller can
//!   greet them; clearing the field is silent.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::schedule::{PiRecord, ScheduleError};

/// State shared between the settings panel and the acquisition metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationState {
    /// Email of the PI currently associated with acquired data.
    pub pi_email: String,
    /// Whether `pi_email` follows the schedule (`AUTO`) or the user (`MANUAL`).
    pub auto_pi_enabled: bool,
    /// Email of the operator at the instrument.
    pub user_email: String,
}

impl Default for ReconciliationState {
    fn default() -> Self {
        Self {
            pi_email: String::new(),
            auto_pi_enabled: true,
            user_email: String::new(),
        }
    }
}

/// Result of one reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Automatic mode is off; the schedule was not consulted.
    Skipped,
    /// The poll failed and the stored value was left alone.
    Retained,
    /// The schedule agrees with the stored value.
    Unchanged,
    /// The stored value was replaced.
    Changed {
        /// Email before the update.
        previous: String,
        /// Email after the update (may be empty).
        current: String,
        /// Name to greet, present only when `current` is non-empty.
        welcome: Option<String>,
    },
}

impl ReconcileOutcome {
    /// Whether `pi_email` was modified.
    pub fn is_change(&self) -> bool {
        matches!(self, ReconcileOutcome::Changed { .. })
    }
}

/// What a failed poll means for the stored PI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollFailurePolicy {
    /// Treat the failure like an empty schedule and clear the PI.
    #[default]
    Clear,
    /// Keep whatever PI was last known.
    Retain,
}

/// Apply a poll result to `state`.
///
/// `polled` is `None` when nothing is scheduled.
pub fn reconcile(state: &mut ReconciliationState, polled: Option<&PiRecord>) -> ReconcileOutcome {
    if !state.auto_pi_enabled {
        return ReconcileOutcome::Skipped;
    }

    let new_email = polled.map(|pi| pi.email.as_str()).unwrap_or("");
    if new_email == state.pi_email {
        return ReconcileOutcome::Unchanged;
    }

    let welcome = match polled {
        Some(pi) if !new_email.is_empty() => Some(pi.name.clone()),
        _ => None,
    };
    let previous = std::mem::replace(&mut state.pi_email, new_email.to_string());

    ReconcileOutcome::Changed {
        previous,
        current: state.pi_email.clone(),
        welcome,
    }
}

/// Apply a raw poll (success or failure) to `state` under `policy`.
pub fn reconcile_poll(
    state: &mut ReconciliationState,
    endstation: &str,
    polled: Result<Option<PiRecord>, ScheduleError>,
    policy: PollFailurePolicy,
) -> ReconcileOutcome {
    if !state.auto_pi_enabled {
        return ReconcileOutcome::Skipped;
    }

    match polled {
        Ok(pi) => {
            let outcome = reconcile(state, pi.as_ref());
            if pi.is_none() && outcome.is_change() {
                info!(endstation, "No PI scheduled; cleared PI email");
            }
            outcome
        }
        Err(e) => match policy {
            PollFailurePolicy::Clear => {
                warn!(endstation, error = %e, "Schedule query failed; clearing PI");
                reconcile(state, None)
            }
            PollFailurePolicy::Retain => {
                warn!(endstation, error = %e, "Schedule query failed; keeping previous PI");
                ReconcileOutcome::Retained
            }
        },
    }
}
