//! Actor-based PI reconciliation service.
//!
//! The [`PiService`] is the single owner of the settings panel and its
//! [`ReconciliationState`]. It runs in a dedicated Tokio task, processes
//! [`HubCommand`] messages received over an mpsc channel and answers through
//! oneshot channels. Callers hold a cheap, cloneable [`PiServiceHandle`].
//!
//! ## Actor Responsibilities
//!
//! - **State Ownership**: Sole writer of the panel; the PI email changes only
//!   through reconciliation (automatic mode) or a direct edit (manual mode)
//! - **Timer Ownership**: Owns the polling interval; started and stopped by
//!   explicit commands, never a process-wide timer
//! - **Network Isolation**: Schedule queries are awaited inside the actor
//!   task, never on the caller's thread
//! - **Publication**: Pushes [`MetadataSnapshot`]s to run-engine subscribers
//!   over a watch channel whenever the exported values change
//!
//! ## State Machine
//!
//! ```text
//!            set_auto_pi(false)
//!   AUTO  ─────────────────────────>  MANUAL
//!   (PI read-only, polling)           (PI editable, no polling)
//!         <─────────────────────────
//!            set_auto_pi(true): reconcile once, start timer
//! ```

use chrono::{DateTime, Local, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::HubConfig;
use crate::error::{HubError, HubResult};
use crate::messages::HubCommand;
use crate::metadata::{export_snapshot, MetadataSnapshot};
use crate::notify::{Notification, Notifier};
use crate::reconcile::{reconcile_poll, PollFailurePolicy, ReconcileOutcome, ReconciliationState};
use crate::schedule::ScheduleSource;
use crate::session::PanelSession;
use crate::settings::SettingsPanel;

/// Point-in-time view of the service.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    /// Endstation being tracked.
    pub endstation: String,
    /// Reconciliation state.
    pub state: ReconciliationState,
    /// Whether the periodic timer is running.
    pub polling: bool,
    /// Timer period.
    pub poll_interval: Duration,
    /// Number of schedule queries made.
    pub polls: u64,
    /// When the schedule was last queried.
    pub last_poll: Option<DateTime<Local>>,
    /// Error from the most recent query, if it failed.
    pub last_error: Option<String>,
}

/// The reconciliation actor. Build it, optionally restore the panel, then
/// [`spawn`](Self::spawn) it.
pub struct PiService {
    panel: SettingsPanel,
    source: Arc<dyn ScheduleSource>,
    notifier: Arc<dyn Notifier>,
    policy: PollFailurePolicy,
    poll_interval: Duration,
    ticker: Option<Interval>,
    publish_snapshots: bool,
    snapshot_tx: watch::Sender<MetadataSnapshot>,
    command_capacity: usize,
    polls: u64,
    last_poll: Option<DateTime<Local>>,
    last_error: Option<String>,
}

impl PiService {
    /// Create the service from configuration.
    ///
    /// The configuration is validated first; an unusable poll interval or
    /// endstation is reported here rather than inside the running task.
    pub fn new(
        config: &HubConfig,
        source: Arc<dyn ScheduleSource>,
        notifier: Arc<dyn Notifier>,
    ) -> HubResult<Self> {
        config.validate().map_err(HubError::Configuration)?;

        let panel = SettingsPanel::new(config.schedule.endstation.clone());
        let (snapshot_tx, _) = watch::channel(export_snapshot(&panel.state()));

        Ok(Self {
            panel,
            source,
            notifier,
            policy: config.service.poll_failure_policy,
            poll_interval: config.service.poll_interval,
            ticker: None,
            publish_snapshots: config.service.subscribe_run_engine,
            snapshot_tx,
            command_capacity: config.service.command_capacity,
            polls: 0,
            last_poll: None,
            last_error: None,
        })
    }

    /// Mutable access to the panel before the actor starts (session restore,
    /// startup prompts).
    pub fn panel_mut(&mut self) -> &mut SettingsPanel {
        &mut self.panel
    }

    /// Start the actor task and return its handle.
    ///
    /// Polling is not started; send [`HubCommand::Apply`] (or call
    /// [`PiServiceHandle::apply`]) once the panel is ready.
    pub fn spawn(self) -> PiServiceHandle {
        let (command_tx, command_rx) = mpsc::channel(self.command_capacity);
        self.snapshot_tx
            .send_replace(export_snapshot(&self.panel.state()));
        let snapshot_rx = self.snapshot_tx.subscribe();

        tokio::spawn(self.run(command_rx));

        PiServiceHandle {
            command_tx,
            snapshot_rx,
        }
    }

    /// Actor event loop. Runs until `Shutdown` or until every handle is dropped.
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<HubCommand>) {
        info!(endstation = %self.panel.endstation(), "PI service started");

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(HubCommand::Shutdown { response }) => {
                            self.stop_polling();
                            let _ = response.send(());
                            break;
                        }
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!("All service handles dropped");
                            break;
                        }
                    }
                }

                _ = next_tick(&mut self.ticker) => {
                    let outcome = self.reconcile_now().await;
                    debug!(?outcome, "Scheduled reconciliation");
                }
            }
        }

        info!("PI service stopped");
    }

    async fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::ReconcileNow { response } => {
                let outcome = self.reconcile_now().await;
                let _ = response.send(outcome);
            }

            HubCommand::Apply { response } => {
                let outcome = self.apply().await;
                let _ = response.send(outcome);
            }

            HubCommand::SetAutoPi { enabled, response } => {
                let result = self.set_auto_pi(enabled).await;
                let _ = response.send(result);
            }

            HubCommand::SetEndstation {
                endstation,
                response,
            } => {
                let result = self.set_endstation(endstation).await;
                let _ = response.send(result);
            }

            HubCommand::SetPiEmail { email, response } => {
                let result = self.panel.set_pi_email(email).await;
                if matches!(result, Ok(true)) {
                    info!(pi = %self.panel.state().pi_email, "PI set manually");
                    self.publish_snapshot();
                }
                let _ = response.send(result);
            }

            HubCommand::SetUserEmail { email, response } => {
                let result = self.panel.set_user_email(email).await;
                if matches!(result, Ok(true)) {
                    self.publish_snapshot();
                }
                let _ = response.send(result);
            }

            HubCommand::StartPolling { response } => {
                self.start_polling();
                let _ = response.send(());
            }

            HubCommand::StopPolling { response } => {
                self.stop_polling();
                let _ = response.send(());
            }

            HubCommand::GetStatus { response } => {
                let _ = response.send(self.status());
            }

            HubCommand::ExportSession {
                include_user_email,
                response,
            } => {
                let _ = response.send(self.panel.to_session(include_user_email));
            }

            HubCommand::Shutdown { response } => {
                // Handled in the event loop; reaching here means a nested call.
                let _ = response.send(());
            }
        }
    }

    /// Query the schedule and reconcile the PI email.
    async fn reconcile_now(&mut self) -> ReconcileOutcome {
        let mut state = self.panel.state();
        if !state.auto_pi_enabled {
            return ReconcileOutcome::Skipped;
        }

        let endstation = self.panel.endstation();
        let polled = self
            .source
            .current_pi(&endstation, Utc::now())
            .await;

        self.polls += 1;
        self.last_poll = Some(Local::now());
        self.last_error = polled.as_ref().err().map(|e| e.to_string());

        let outcome = reconcile_poll(&mut state, &endstation, polled, self.policy);

        if let ReconcileOutcome::Changed {
            current, welcome, ..
        } = &outcome
        {
            self.panel.publish_pi_email(current.clone()).await;
            if let Some(name) = welcome {
                info!(endstation = %endstation, pi = %current, "Scheduled PI changed");
                self.notifier.notify(Notification::welcome(name));
            }
            self.publish_snapshot();
        }

        outcome
    }

    async fn apply(&mut self) -> ReconcileOutcome {
        if self.panel.is_auto_pi() {
            let outcome = self.reconcile_now().await;
            self.start_polling();
            outcome
        } else {
            self.stop_polling();
            ReconcileOutcome::Skipped
        }
    }

    async fn set_auto_pi(&mut self, enabled: bool) -> HubResult<Option<ReconcileOutcome>> {
        let was_enabled = self.panel.is_auto_pi();
        self.panel.set_auto_pi(enabled).await?;

        match (was_enabled, enabled) {
            (false, true) => {
                info!("Automatic PI enabled");
                self.publish_snapshot();
                let outcome = self.reconcile_now().await;
                self.start_polling();
                Ok(Some(outcome))
            }
            (true, false) => {
                info!("Automatic PI disabled; PI can be edited");
                self.stop_polling();
                self.publish_snapshot();
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn set_endstation(&mut self, endstation: String) -> HubResult<Option<ReconcileOutcome>> {
        if !self.panel.set_endstation(endstation).await? {
            return Ok(None);
        }

        info!(endstation = %self.panel.endstation(), "Endstation changed");
        if self.panel.is_auto_pi() {
            Ok(Some(self.reconcile_now().await))
        } else {
            Ok(None)
        }
    }

    fn start_polling(&mut self) {
        if self.ticker.is_some() {
            return;
        }

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        info!(interval = ?self.poll_interval, "PI polling started");
    }

    fn stop_polling(&mut self) {
        if self.ticker.take().is_some() {
            info!("PI polling stopped");
        }
    }

    fn publish_snapshot(&self) {
        if !self.publish_snapshots {
            return;
        }

        let snapshot = export_snapshot(&self.panel.state());
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn status(&self) -> ServiceStatus {
        ServiceStatus {
            endstation: self.panel.endstation(),
            state: self.panel.state(),
            polling: self.ticker.is_some(),
            poll_interval: self.poll_interval,
            polls: self.polls,
            last_poll: self.last_poll,
            last_error: self.last_error.clone(),
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Cloneable handle to a running [`PiService`].
#[derive(Clone)]
pub struct PiServiceHandle {
    command_tx: mpsc::Sender<HubCommand>,
    snapshot_rx: watch::Receiver<MetadataSnapshot>,
}

impl PiServiceHandle {
    async fn request<T>(&self, command: HubCommand, rx: oneshot::Receiver<T>) -> HubResult<T> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| HubError::ServiceClosed)?;
        rx.await.map_err(|_| HubError::ServiceClosed)
    }

    /// Poll the schedule and reconcile now.
    pub async fn reconcile_now(&self) -> HubResult<ReconcileOutcome> {
        let (cmd, rx) = HubCommand::reconcile_now();
        self.request(cmd, rx).await
    }

    /// Apply the panel (reconcile and start polling in automatic mode, stop
    /// polling in manual mode).
    pub async fn apply(&self) -> HubResult<ReconcileOutcome> {
        let (cmd, rx) = HubCommand::apply();
        self.request(cmd, rx).await
    }

    /// Toggle automatic PI mode.
    pub async fn set_auto_pi(&self, enabled: bool) -> HubResult<Option<ReconcileOutcome>> {
        let (cmd, rx) = HubCommand::set_auto_pi(enabled);
        self.request(cmd, rx).await?
    }

    /// Change the endstation.
    pub async fn set_endstation(
        &self,
        endstation: impl Into<String>,
    ) -> HubResult<Option<ReconcileOutcome>> {
        let (cmd, rx) = HubCommand::set_endstation(endstation.into());
        self.request(cmd, rx).await?
    }

    /// Edit the PI email (manual mode only).
    pub async fn set_pi_email(&self, email: impl Into<String>) -> HubResult<bool> {
        let (cmd, rx) = HubCommand::set_pi_email(email.into());
        self.request(cmd, rx).await?
    }

    /// Edit the user email.
    pub async fn set_user_email(&self, email: impl Into<String>) -> HubResult<bool> {
        let (cmd, rx) = HubCommand::set_user_email(email.into());
        self.request(cmd, rx).await?
    }

    /// Start the periodic timer.
    pub async fn start_polling(&self) -> HubResult<()> {
        let (cmd, rx) = HubCommand::start_polling();
        self.request(cmd, rx).await
    }

    /// Stop the periodic timer.
    pub async fn stop_polling(&self) -> HubResult<()> {
        let (cmd, rx) = HubCommand::stop_polling();
        self.request(cmd, rx).await
    }

    /// Current service status.
    pub async fn status(&self) -> HubResult<ServiceStatus> {
        let (cmd, rx) = HubCommand::get_status();
        self.request(cmd, rx).await
    }

    /// Reconciliation state.
    pub async fn state(&self) -> HubResult<ReconciliationState> {
        Ok(self.status().await?.state)
    }

    /// Current `{PI, "PI overridden", User}` read model.
    pub async fn snapshot(&self) -> HubResult<MetadataSnapshot> {
        Ok(export_snapshot(&self.state().await?))
    }

    /// Persistable copy of the settings panel.
    pub async fn export_session(&self, include_user_email: bool) -> HubResult<PanelSession> {
        let (cmd, rx) = HubCommand::export_session(include_user_email);
        self.request(cmd, rx).await
    }

    /// Subscribe to metadata snapshots (run-engine integration).
    pub fn subscribe(&self) -> watch::Receiver<MetadataSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Whether the actor task is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.command_tx.is_closed()
    }

    /// Stop the service and wait for the task to exit. Safe to call twice.
    pub async fn shutdown(&self) -> HubResult<()> {
        let (cmd, rx) = HubCommand::shutdown();
        if self.command_tx.send(cmd).await.is_err() {
            return Ok(());
        }
        let _ = rx.await;
        self.command_tx.closed().await;
        Ok(())
    }
}
