//! Acquisition metadata derived from the reconciliation state.
//!
//! The run engine tags every run with the PI, whether the PI was entered by
//! hand, and the operator. The key names are fixed by the downstream data
//! catalog, hence the serde renames.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::reconcile::ReconciliationState;

/// Key for the PI email in run metadata.
pub const KEY_PI: &str = "PI";
/// Key for the manual-override flag in run metadata.
pub const KEY_PI_OVERRIDDEN: &str = "PI overridden";
/// Key for the operator email in run metadata.
pub const KEY_USER: &str = "User";

/// Read model published to run-engine subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    /// PI email (empty when unknown).
    #[serde(rename = "PI")]
    pub pi: String,
    /// `true` when the PI was set by hand instead of from the schedule.
    #[serde(rename = "PI overridden")]
    pub pi_overridden: bool,
    /// Operator email (empty when unknown).
    #[serde(rename = "User")]
    pub user: String,
}

/// Build the snapshot for `state`.
pub fn export_snapshot(state: &ReconciliationState) -> MetadataSnapshot {
    MetadataSnapshot {
        pi: state.pi_email.clone(),
        pi_overridden: !state.auto_pi_enabled,
        user: state.user_email.clone(),
    }
}

impl From<&ReconciliationState> for MetadataSnapshot {
    fn from(state: &ReconciliationState) -> Self {
        export_snapshot(state)
    }
}

impl MetadataSnapshot {
    /// Snapshot as a JSON object with the catalog key names.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            KEY_PI: self.pi,
            KEY_PI_OVERRIDDEN: self.pi_overridden,
            KEY_USER: self.user,
        })
    }

    /// Write the three keys into run-engine metadata, replacing stale values.
    pub fn merge_into(&self, metadata: &mut HashMap<String, String>) {
        metadata.insert(KEY_PI.to_string(), self.pi.clone());
        metadata.insert(
            KEY_PI_OVERRIDDEN.to_string(),
            self.pi_overridden.to_string(),
        );
        metadata.insert(KEY_USER.to_string(), self.user.clone());
    }
}
