//! Parameter<T> - Declarative settings field management
//!
//! Each field of the ALSHub settings panel is a `Parameter<T>` that keeps:
//! - GUI widgets in sync (via watch channels)
//! - Validation in one place (via constraints)
//! - Side effects such as persistence hooks (via change listeners)
//!
//! A parameter can be read-only for *user* edits while its owner (the PI
//! service) still updates it through [`Parameter::publish`]. That is how the
//! "PI email address" field behaves while automatic PI mode is on.
//!
//! # Example
//!
//! ```rust,ignore
//! use alshub::parameter::Parameter;
//!
//! let mut endstation = Parameter::new("Endstation", "7.0.1.1".to_string())
//!     .with_description("The endstation numeral name (i.e. \"7.0.1.1\").")
//!     .with_validator(|v: &String| alshub::validation::is_valid_endstation(v));
//!
//! endstation.set("8.3.2".to_string()).await?;
//!
//! let mut rx = endstation.subscribe();
//! tokio::spawn(async move {
//!     while rx.changed().await.is_ok() {
//!         println!("Endstation changed to: {}", *rx.borrow());
//!     }
//! });
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::error::{HubError, HubResult};

// =============================================================================
// Constraints
// =============================================================================

/// Validator signature shared with [`crate::validation`].
pub type Validator<T> = Arc<dyn Fn(&T) -> Result<(), &'static str> + Send + Sync>;

/// Parameter constraints for validation
#[derive(Clone)]
pub enum Constraints<T> {
    /// No constraints
    None,

    /// Custom validation function
    Custom(Validator<T>),
}

impl<T: PartialEq + Debug> Constraints<T> {
    /// Validate value against constraints
    pub fn validate(&self, name: &str, value: &T) -> HubResult<()> {
        match self {
            Constraints::None => Ok(()),

            Constraints::Custom(validator) => {
                validator(value).map_err(|reason| HubError::Validation {
                    field: name.to_string(),
                    reason,
                })
            }
        }
    }
}

impl<T: Debug> std::fmt::Debug for Constraints<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraints::None => write!(f, "None"),
            Constraints::Custom(_) => write!(f, "Custom(<function>)"),
        }
    }
}

impl<T> Default for Constraints<T> {
    fn default() -> Self {
        Constraints::None
    }
}

// =============================================================================
// Parameter<T>
// =============================================================================

type ChangeListener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Typed, observable settings field.
///
/// # Type Requirements
///
/// T must implement:
/// - Clone: For distributing values to subscribers
/// - Send + Sync: For thread-safe access
/// - PartialEq: For change detection
/// - Debug: For logging and error messages
pub struct Parameter<T>
where
    T: Clone + Send + Sync + PartialEq + Debug,
{
    /// Parameter name (display name in the settings tree)
    name: String,

    /// Parameter description (for GUI tooltips)
    description: Option<String>,

    /// Current value (observable via watch channel)
    value_rx: watch::Receiver<T>,
    value_tx: watch::Sender<T>,

    /// Validation constraints
    constraints: Constraints<T>,

    /// Change listeners (called after value changes)
    change_listeners: Arc<RwLock<Vec<ChangeListener<T>>>>,

    /// Read-only flag (prevents set() from modifying value)
    read_only: bool,
}

impl<T> Parameter<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    /// Create new parameter with initial value
    pub fn new(name: impl Into<String>, initial: T) -> Self {
        let (value_tx, value_rx) = watch::channel(initial);

        Self {
            name: name.into(),
            description: None,
            value_rx,
            value_tx,
            constraints: Constraints::None,
            change_listeners: Arc::new(RwLock::new(Vec::new())),
            read_only: false,
        }
    }

    /// Set parameter description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set custom validation function
    pub fn with_validator(
        mut self,
        validator: impl Fn(&T) -> Result<(), &'static str> + Send + Sync + 'static,
    ) -> Self {
        self.constraints = Constraints::Custom(Arc::new(validator));
        self
    }

    /// Make parameter read-only
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Toggle the read-only flag at runtime.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Add change listener (called after value changes)
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// pi_email.add_change_listener(|val| {
    ///     tracing::info!(pi = %val, "PI email changed");
    /// }).await;
    /// ```
    pub async fn add_change_listener(&self, listener: impl Fn(&T) + Send + Sync + 'static) {
        let mut listeners = self.change_listeners.write().await;
        listeners.push(Arc::new(listener));
    }

    /// Get current value
    pub fn get(&self) -> T {
        self.value_rx.borrow().clone()
    }

    /// Set value from a user edit (checks read-only, validates, notifies)
    ///
    /// Returns `Ok(false)` when the value equals the current one; nothing is
    /// sent to subscribers in that case.
    pub async fn set(&mut self, value: T) -> HubResult<bool> {
        if self.read_only {
            return Err(HubError::ParameterReadOnly(self.name.clone()));
        }

        self.constraints.validate(&self.name, &value)?;

        Ok(self.store(value).await)
    }

    /// Set value on behalf of the owning service
    ///
    /// Bypasses the read-only flag and validation: the value comes from an
    /// authoritative source (the scheduling service), not from the user.
    pub async fn publish(&mut self, value: T) -> bool {
        self.store(value).await
    }

    async fn store(&mut self, value: T) -> bool {
        let changed = self.value_tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value.clone();
                true
            }
        });

        if changed {
            let listeners = self.change_listeners.read().await;
            for listener in listeners.iter() {
                listener(&value);
            }
        }

        changed
    }

    /// Subscribe to value changes (for GUI widgets)
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.value_rx.clone()
    }

    /// Display name of the parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tooltip text, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether user edits are currently rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Validation constraints.
    pub fn constraints(&self) -> &Constraints<T> {
        &self.constraints
    }
}

impl<T> Parameter<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + 'static,
{
    /// Current value as JSON (for generic settings trees).
    pub fn value_json(&self) -> serde_json::Value {
        serde_json::to_value(self.get()).unwrap_or(serde_json::Value::Null)
    }

    /// Set value from JSON, with the same checks as [`Parameter::set`].
    pub async fn set_json(&mut self, value: serde_json::Value) -> HubResult<bool> {
        let typed_value: T = serde_json::from_value(value)?;
        self.set(typed_value).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_parameter_basic() {
        let mut param = Parameter::new("Endstation", "7.0.1.1".to_string());
        assert_eq!(param.get(), "7.0.1.1");

        assert!(param.set("8.3.2".to_string()).await.unwrap());
        assert_eq!(param.get(), "8.3.2");
    }

    #[tokio::test]
    async fn test_parameter_same_value_is_not_a_change() {
        let mut param = Parameter::new("Set PI automatically", true);
        let rx = param.subscribe();

        assert!(!param.set(true).await.unwrap());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_parameter_validator() {
        let mut param = Parameter::new("Endstation", "7.0.1.1".to_string())
            .with_validator(|v: &String| crate::validation::is_valid_endstation(v));

        assert!(param.set("8.3.2".to_string()).await.is_ok());
        let err = param.set("eight".to_string()).await.unwrap_err();
        assert!(matches!(err, HubError::Validation { ref field, .. } if field == "Endstation"));
        assert_eq!(param.get(), "8.3.2");
    }

    #[tokio::test]
    async fn test_parameter_read_only_blocks_user_but_not_owner() {
        let mut param = Parameter::new("PI email address", String::new()).read_only();

        assert!(matches!(
            param.set("ar@lab.org".to_string()).await,
            Err(HubError::ParameterReadOnly(_))
        ));
        assert_eq!(param.get(), "");

        assert!(param.publish("ar@lab.org".to_string()).await);
        assert_eq!(param.get(), "ar@lab.org");

        param.set_read_only(false);
        assert!(param.set("other@lab.org".to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn test_parameter_subscription() {
        let mut param = Parameter::new("User email address", String::new());
        let mut rx = param.subscribe();

        assert_eq!(*rx.borrow(), "");

        param.set("me@lab.org".to_string()).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), "me@lab.org");
    }

    #[tokio::test]
    async fn test_parameter_change_listener_only_fires_on_change() {
        let listener_called = Arc::new(AtomicU64::new(0));
        let lc_clone = listener_called.clone();

        let mut param = Parameter::new("PI email address", String::new());
        param
            .add_change_listener(move |_val| {
                lc_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        param.publish("a@lab.org".to_string()).await;
        param.publish("a@lab.org".to_string()).await;
        param.publish(String::new()).await;

        assert_eq!(listener_called.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_parameter_json_access() {
        let mut param = Parameter::new("Set PI automatically", true)
            .with_description("When enabled, the PI is determined automatically.");

        assert_eq!(param.value_json(), serde_json::json!(true));
        param.set_json(serde_json::json!(false)).await.unwrap();
        assert!(!param.get());
        assert!(param.set_json(serde_json::json!("yes")).await.is_err());
        assert!(param.description().is_some());
    }
}
