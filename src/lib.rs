//! # ALSHub Core Library
//!
//! This crate keeps the principal investigator (PI) associated with newly
//! acquired beamline data in step with the ALSHub/ESAF beam-time schedule.
//! It models the "ALSHub" settings panel of an acquisition host, polls the
//! scheduling service for the endstation in use, and exports the PI and
//! operator as run metadata.
//!
//! ## Crate Structure
//!
//! - **`config`**: Layered configuration (defaults, `config/alshub.toml`,
//!   `ALSHUB_*` environment variables) built on `figment`. See `config::HubConfig`.
//! - **`error`**: The `HubError` enum for centralized error handling.
//! - **`logging`**: `tracing-subscriber` initialization (pretty, compact, JSON).
//! - **`messages`**: Commands exchanged with the reconciliation actor.
//! - **`metadata`**: The `{PI, "PI overridden", User}` snapshot handed to the
//!   run engine.
//! - **`notify`**: Operator notifications (the "Welcome {name}!" greeting).
//! - **`parameter`**: `Parameter<T>`, an observable settings field with
//!   validation and a runtime read-only flag.
//! - **`reconcile`**: The pure reconciliation rules.
//! - **`schedule`**: The `ScheduleSource` trait, the HTTP `EsafClient` and a
//!   scripted mock.
//! - **`service`**: The `PiService` actor that owns the panel and the polling
//!   timer, and its cloneable `PiServiceHandle`.
//! - **`session`**: Saving and restoring the settings panel.
//! - **`settings`**: The four-field settings panel.
//! - **`validation`**: Validation helpers for endstations, emails and URLs.

pub mod config;
pub mod error;
pub mod logging;
pub mod messages;
pub mod metadata;
pub mod notify;
pub mod parameter;
pub mod reconcile;
pub mod schedule;
pub mod service;
pub mod session;
pub mod settings;
pub mod validation;

pub use error::{HubError, HubResult};
pub use service::{PiService, PiServiceHandle};
