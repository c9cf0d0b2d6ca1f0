//! Session management for the settings panel.
//!
//! A "session" is the persisted state of the ALSHub settings panel, so the
//! endstation, PI mode and manual PI survive restarts.
//!
//! ## Session State
//!
//! - **`endstation`**: The instrument whose schedule is queried.
//! - **`pi_email`**: Last known PI (from the schedule or entered by hand).
//! - **`auto_pi`**: Whether the PI follows the schedule.
//! - **`user_email`**: The operator. Omitted when the panel is configured to
//!   prompt for it at every startup, so one user's address never leaks into
//!   the next user's data.
//!
//! ## Functionality
//!
//! - **`save_session`**: Serializes a `PanelSession` into a JSON file,
//!   creating parent directories as needed.
//! - **`load_session`**: Deserializes a `PanelSession` from a JSON file.
//! - **`SettingsPanel::to_session` / `SettingsPanel::restore`**: Convert between
//!   the live panel and the persisted form (see [`crate::settings`]).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::HubResult;

/// Persisted settings panel, keyed by the panel's display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSession {
    /// Endstation identifier.
    #[serde(rename = "Endstation")]
    pub endstation: String,
    /// PI email at save time.
    #[serde(rename = "PI email address", default)]
    pub pi_email: String,
    /// Automatic PI mode at save time.
    #[serde(rename = "Set PI automatically", default = "default_auto_pi")]
    pub auto_pi: bool,
    /// Operator email, absent when excluded from persistence.
    #[serde(
        rename = "User email address",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub user_email: Option<String>,
}

fn default_auto_pi() -> bool {
    true
}

/// Saves the session to a file.
pub fn save_session(session: &PanelSession, path: &Path) -> HubResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(session)?;
    fs::write(path, json)?;
    debug!(path = %path.display(), "Saved settings session");
    Ok(())
}

/// Loads a session from a file.
pub fn load_session(path: &Path) -> HubResult<PanelSession> {
    let json = fs::read_to_string(path)?;
    let session = serde_json::from_str(&json)?;
    Ok(session)
}
