//! ALSHub settings panel model.
//!
//! The four fields shown in the host's settings tree, each an observable
//! [`Parameter`]. A GUI binds widgets to the parameters (subscribe for
//! updates, check `is_read_only` to grey out the PI field); the PI service
//! owns the panel and is the only writer of the PI email in automatic mode.
//!
//! | Field                  | Type   | Editable when           |
//! |------------------------|--------|-------------------------|
//! | `Endstation`           | string | always                  |
//! | `PI email address`     | string | automatic mode is off   |
//! | `Set PI automatically` | bool   | always                  |
//! | `User email address`   | string | always                  |

use serde_json::{json, Value};

use crate::error::{HubError, HubResult};
use crate::parameter::Parameter;
use crate::reconcile::ReconciliationState;
use crate::session::PanelSession;
use crate::validation;

/// Display name of the endstation field.
pub const ENDSTATION: &str = "Endstation";
/// Display name of the PI email field.
pub const PI_EMAIL: &str = "PI email address";
/// Display name of the automatic-PI toggle.
pub const AUTO_PI: &str = "Set PI automatically";
/// Display name of the user email field.
pub const USER_EMAIL: &str = "User email address";

/// The settings panel.
pub struct SettingsPanel {
    endstation: Parameter<String>,
    pi_email: Parameter<String>,
    auto_pi: Parameter<bool>,
    user_email: Parameter<String>,
}

impl SettingsPanel {
    /// Panel with defaults: automatic PI on, PI and user email empty.
    pub fn new(endstation: impl Into<String>) -> Self {
        let endstation = Parameter::new(ENDSTATION, endstation.into())
            .with_description("The endstation numeral name (i.e. \"7.0.1.1\").")
            .with_validator(|v: &String| validation::is_valid_endstation(v));

        let pi_email = Parameter::new(PI_EMAIL, String::new())
            .with_description(
                "The email address associated with the PI's ALS Hub email account. \
                 This will be associated with all new acquired data.",
            )
            .with_validator(|v: &String| validation::is_valid_optional_email(v))
            .read_only();

        let auto_pi = Parameter::new(AUTO_PI, true).with_description(
            "When enabled, the PI will be determined automatically using ALS Hub's ESAF database.",
        );

        let user_email = Parameter::new(USER_EMAIL, String::new())
            .with_description("Your email address, associated with your ALSHub account.")
            .with_validator(|v: &String| validation::is_valid_optional_email(v));

        Self {
            endstation,
            pi_email,
            auto_pi,
            user_email,
        }
    }

    /// Current endstation identifier.
    pub fn endstation(&self) -> String {
        self.endstation.get()
    }

    /// Whether the PI follows the schedule.
    pub fn is_auto_pi(&self) -> bool {
        self.auto_pi.get()
    }

    /// Reconciliation view of the panel.
    pub fn state(&self) -> ReconciliationState {
        ReconciliationState {
            pi_email: self.pi_email.get(),
            auto_pi_enabled: self.auto_pi.get(),
            user_email: self.user_email.get(),
        }
    }

    /// Endstation field, for GUI binding.
    pub fn endstation_param(&self) -> &Parameter<String> {
        &self.endstation
    }

    /// PI email field, for GUI binding.
    pub fn pi_email_param(&self) -> &Parameter<String> {
        &self.pi_email
    }

    /// Automatic-PI toggle, for GUI binding.
    pub fn auto_pi_param(&self) -> &Parameter<bool> {
        &self.auto_pi
    }

    /// User email field, for GUI binding.
    pub fn user_email_param(&self) -> &Parameter<String> {
        &self.user_email
    }

    /// User edit of the endstation.
    pub async fn set_endstation(&mut self, endstation: String) -> HubResult<bool> {
        self.endstation.set(endstation).await
    }

    /// User edit of the PI email; rejected in automatic mode.
    pub async fn set_pi_email(&mut self, email: String) -> HubResult<bool> {
        self.pi_email.set(email).await
    }

    /// User edit of the user email.
    pub async fn set_user_email(&mut self, email: String) -> HubResult<bool> {
        self.user_email.set(email).await
    }

    /// Switch between automatic and manual PI. The PI field is read-only
    /// exactly when automatic mode is on.
    pub async fn set_auto_pi(&mut self, enabled: bool) -> HubResult<bool> {
        let changed = self.auto_pi.set(enabled).await?;
        self.pi_email.set_read_only(enabled);
        Ok(changed)
    }

    /// Store a PI email obtained from the schedule.
    pub(crate) async fn publish_pi_email(&mut self, email: String) -> bool {
        self.pi_email.publish(email).await
    }

    /// All fields as a JSON object keyed by display name.
    pub fn values_json(&self) -> Value {
        json!({
            ENDSTATION: self.endstation.value_json(),
            PI_EMAIL: self.pi_email.value_json(),
            AUTO_PI: self.auto_pi.value_json(),
            USER_EMAIL: self.user_email.value_json(),
        })
    }

    /// Generic setter used by settings trees that only know field names.
    pub async fn set_json(&mut self, name: &str, value: Value) -> HubResult<bool> {
        match name {
            ENDSTATION => self.endstation.set_json(value).await,
            PI_EMAIL => self.pi_email.set_json(value).await,
            AUTO_PI => {
                let enabled: bool = serde_json::from_value(value)?;
                self.set_auto_pi(enabled).await
            }
            USER_EMAIL => self.user_email.set_json(value).await,
            other => Err(HubError::UnknownSetting(other.to_string())),
        }
    }

    /// Persistable copy of the panel.
    pub fn to_session(&self, include_user_email: bool) -> PanelSession {
        PanelSession {
            endstation: self.endstation.get(),
            pi_email: self.pi_email.get(),
            auto_pi: self.auto_pi.get(),
            user_email: include_user_email.then(|| self.user_email.get()),
        }
    }

    /// Restore a saved panel.
    ///
    /// The saved PI email is restored as-is; in automatic mode the next
    /// reconciliation replaces it if the schedule moved on.
    pub async fn restore(
        &mut self,
        session: &PanelSession,
        restore_user_email: bool,
    ) -> HubResult<()> {
        self.set_endstation(session.endstation.clone()).await?;
        self.set_auto_pi(session.auto_pi).await?;

        validation::is_valid_optional_email(&session.pi_email).map_err(|reason| {
            HubError::Validation {
                field: PI_EMAIL.to_string(),
                reason,
            }
        })?;
        self.pi_email.publish(session.pi_email.clone()).await;

        if restore_user_email {
            if let Some(user_email) = &session.user_email {
                self.set_user_email(user_email.clone()).await?;
            }
        }

        Ok(())
    }
}
