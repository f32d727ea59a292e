use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::future::join_all;
use thiserror::Error;
use tokio::{sync::Mutex, time};
use tracing::{info, warn};

use crate::{
    backend::{
        models::{Actuator, Device},
        HomeBackend,
    },
    error::{ControlError, RemoteError},
    notice::{NoticeBoard, NoticeKind},
};

pub const NO_CHANGE: &str = "Data hasn't changed";
pub const LOADING: &str = "Loading...";
pub const SUCCESS: &str = "Success!";
pub const MISSING_SENSOR: &str = "Required sensor is missing!";

/// UX pacing for command feedback.
#[derive(Debug, Clone, Copy)]
pub struct ControlTiming {
    /// Time the "Loading..." notice stays up before the command is sent.
    pub dispatch_delay: Duration,
    /// Lifetime of the success / failure notice.
    pub notice_ttl: Duration,
}

impl Default for ControlTiming {
    fn default() -> Self {
        Self {
            dispatch_delay: Duration::from_millis(2000),
            notice_ttl: Duration::from_millis(2000),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-actuator state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPhase {
    /// No confirmed position known yet.
    Unsynced,
    Synced,
    Dirty,
    Dispatching,
}

/// Confirmed and pending position of one actuator, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorValue {
    /// Last position the backend acknowledged.
    pub confirmed: i32,
    /// Position currently selected on the control.
    pub pending: i32,
    dispatching: bool,
}

impl ActuatorValue {
    fn synced(value: i32) -> Self {
        Self {
            confirmed: value,
            pending: value,
            dispatching: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.pending != self.confirmed
    }

    pub fn phase(&self) -> ControlPhase {
        if self.dispatching {
            ControlPhase::Dispatching
        } else if self.is_dirty() {
            ControlPhase::Dirty
        } else {
            ControlPhase::Synced
        }
    }
}

/// Why a command was not applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchFailure {
    /// The backend needs a companion sensor the device does not have.
    #[error("Required sensor is missing!")]
    MissingDependency,

    #[error("{}", rejection_message(*status, reason.as_deref()))]
    Rejected { status: u16, reason: Option<String> },

    #[error("{0}")]
    Unreachable(RemoteError),
}

fn rejection_message(status: u16, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => reason.to_owned(),
        None => format!("HTTP error status: {status}"),
    }
}

impl From<RemoteError> for DispatchFailure {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Status { status: 400, .. } => DispatchFailure::MissingDependency,
            RemoteError::Status { status, reason } => DispatchFailure::Rejected { status, reason },
            other => DispatchFailure::Unreachable(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Nothing to send; the control matches the confirmed position.
    NoChange,
    /// The device is inactive; nothing was sent.
    Inactive,
    /// The backend acknowledged the new position.
    Confirmed(i32),
    /// The command failed; the confirmed position is unchanged and the
    /// control has been reset to it.
    Failed(DispatchFailure),
}

/// Result of (re)fetching confirmed positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub synced: Vec<String>,
    pub failed: Vec<(String, RemoteError)>,
}

/// Snapshot of one control for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlView {
    pub actuator_id: String,
    pub value: Option<ActuatorValue>,
    pub phase: ControlPhase,
    /// Whether the control accepts edits and dispatches.
    pub interactive: bool,
}

// ---------------------------------------------------------------------------
// Controls of one device
// ---------------------------------------------------------------------------

/// Position controls for the blind rollers of one device.
///
/// Owns the confirmed / pending map. The map is only touched between awaits,
/// and at most one command per actuator is in flight.
#[derive(Clone)]
pub struct ActuatorControls {
    inner: Arc<Inner>,
}

struct Inner {
    backend: HomeBackend,
    notices: NoticeBoard,
    timing: ControlTiming,
    device_id: String,
    state: Mutex<ControlState>,
}

#[derive(Default)]
struct ControlState {
    active: bool,
    /// Controlled actuator ids, in display order.
    roster: Vec<String>,
    values: HashMap<String, ActuatorValue>,
}

impl ActuatorControls {
    pub fn new(backend: HomeBackend, notices: NoticeBoard, timing: ControlTiming, device: &Device) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                notices,
                timing,
                device_id: device.device_id.clone(),
                state: Mutex::new(ControlState {
                    active: device.is_active(),
                    ..ControlState::default()
                }),
            }),
        }
    }

    /// Replace the set of controlled actuators. Only blind rollers are kept.
    ///
    /// When the set of ids changed, every position is fetched again and the
    /// report is returned; otherwise nothing is fetched.
    pub async fn set_roster(&self, actuators: &[Actuator]) -> Option<SyncReport> {
        let ids: Vec<String> = actuators
            .iter()
            .filter(|a| a.is_blind_roller())
            .map(|a| a.actuator_id.clone())
            .collect();

        {
            let mut state = self.inner.state.lock().await;
            if state.roster == ids {
                return None;
            }
            state.values.retain(|id, _| ids.contains(id));
            state.roster = ids;
        }

        Some(self.resync().await)
    }

    /// Fetch the confirmed position of every controlled actuator.
    ///
    /// Fetches run concurrently and each one is applied as soon as it lands,
    /// so a failing actuator does not hold back the others. Actuators with a
    /// command in flight are left alone.
    pub async fn resync(&self) -> SyncReport {
        let ids = self.inner.state.lock().await.roster.clone();

        let results = join_all(ids.into_iter().map(|id| async move {
            let fetched = self.inner.backend.current_percentage_value(&id).await;
            if let Ok(value) = fetched {
                let mut state = self.inner.state.lock().await;
                if !state.roster.contains(&id) {
                    return (id, Ok(false));
                }
                let entry = state.values.get(&id).copied();
                if entry.map_or(true, |v| !v.dispatching) {
                    state.values.insert(id.clone(), ActuatorValue::synced(value));
                }
            }
            let applied = fetched.map(|_| true);
            (id, applied)
        }))
        .await;

        let mut report = SyncReport::default();
        for (id, result) in results {
            match result {
                Ok(true) => report.synced.push(id),
                Ok(false) => {}
                Err(e) => {
                    warn!(device_id = %self.inner.device_id, actuator_id = %id, error = %e, "Failed to fetch actuator position");
                    report.failed.push((id, e));
                }
            }
        }

        info!(
            device_id = %self.inner.device_id,
            synced = report.synced.len(),
            failed = report.failed.len(),
            "Actuator positions synced"
        );
        report
    }

    /// Record a user edit. Returns whether the control is now dirty.
    pub async fn set_pending(&self, actuator_id: &str, value: i32) -> Result<bool, ControlError> {
        if !(0..=100).contains(&value) {
            return Err(ControlError::OutOfRange(value));
        }

        let mut state = self.inner.state.lock().await;
        let active = state.active;
        let entry = editable(&mut state, actuator_id)?;
        if !active {
            return Err(ControlError::DeviceInactive);
        }
        entry.pending = value;
        Ok(entry.is_dirty())
    }

    /// Send the pending position of `actuator_id` to the backend.
    ///
    /// Shows "Loading..." for the dispatch delay, then issues the command and
    /// flashes the result. On failure the control is reset to the confirmed
    /// position.
    ///
    /// The delay and the command run on their own task, so the control is
    /// settled even when the caller stops waiting.
    pub async fn dispatch(&self, actuator_id: &str) -> Result<DispatchOutcome, ControlError> {
        let ttl = self.inner.timing.notice_ttl;
        let notices = &self.inner.notices;

        let target = {
            let mut state = self.inner.state.lock().await;
            let active = state.active;
            let entry = editable(&mut state, actuator_id)?;

            if !active {
                notices.flash(NoticeKind::Failure, ControlError::DeviceInactive.to_string(), ttl);
                return Ok(DispatchOutcome::Inactive);
            }
            if !entry.is_dirty() {
                notices.flash(NoticeKind::Info, NO_CHANGE, ttl);
                return Ok(DispatchOutcome::NoChange);
            }

            entry.dispatching = true;
            entry.pending
        };

        notices.show(NoticeKind::Loading, LOADING);

        let controls = self.clone();
        let id = actuator_id.to_owned();
        let command = tokio::spawn(async move { controls.send_command(&id, target).await });

        match command.await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                // The command task panicked or was torn down with the runtime.
                let mut state = self.inner.state.lock().await;
                if let Some(entry) = state.values.get_mut(actuator_id) {
                    entry.pending = entry.confirmed;
                    entry.dispatching = false;
                }
                notices.clear();
                warn!(actuator_id = %actuator_id, error = %e, "Actuator command interrupted");
                Err(ControlError::Interrupted(actuator_id.to_owned()))
            }
        }
    }

    /// Wait out the dispatch delay, issue the command and settle the control.
    async fn send_command(&self, actuator_id: &str, target: i32) -> DispatchOutcome {
        let ttl = self.inner.timing.notice_ttl;
        let notices = &self.inner.notices;

        time::sleep(self.inner.timing.dispatch_delay).await;

        let result = self
            .inner
            .backend
            .operate_blind_roller(actuator_id, target)
            .await;

        let mut state = self.inner.state.lock().await;
        let entry = state.values.get_mut(actuator_id);

        match result {
            Ok(()) => {
                if let Some(entry) = entry {
                    *entry = ActuatorValue::synced(target);
                }
                notices.flash(NoticeKind::Success, SUCCESS, ttl);
                info!(actuator_id = %actuator_id, position = target, "Actuator operated");
                DispatchOutcome::Confirmed(target)
            }
            Err(e) => {
                if let Some(entry) = entry {
                    entry.pending = entry.confirmed;
                    entry.dispatching = false;
                }
                let failure = DispatchFailure::from(e);
                notices.flash(NoticeKind::Failure, failure.to_string(), ttl);
                warn!(actuator_id = %actuator_id, position = target, error = %failure, "Actuator command failed");
                DispatchOutcome::Failed(failure)
            }
        }
    }

    /// Deactivate the device. Controls keep their values but stop accepting
    /// edits and dispatches.
    pub async fn deactivate(&self) -> Result<(), RemoteError> {
        self.inner
            .backend
            .deactivate_device(&self.inner.device_id)
            .await?;
        self.inner.state.lock().await.active = false;
        Ok(())
    }

    pub async fn value(&self, actuator_id: &str) -> Option<ActuatorValue> {
        self.inner.state.lock().await.values.get(actuator_id).copied()
    }

    pub async fn views(&self) -> Vec<ControlView> {
        let state = self.inner.state.lock().await;
        state
            .roster
            .iter()
            .map(|id| {
                let value = state.values.get(id).copied();
                let phase = value.map_or(ControlPhase::Unsynced, |v| v.phase());
                ControlView {
                    actuator_id: id.clone(),
                    value,
                    phase,
                    interactive: state.active
                        && !matches!(phase, ControlPhase::Unsynced | ControlPhase::Dispatching),
                }
            })
            .collect()
    }
}

/// Entry of an actuator that can take an edit right now.
fn editable<'a>(state: &'a mut ControlState, actuator_id: &str) -> Result<&'a mut ActuatorValue, ControlError> {
    if !state.roster.iter().any(|id| id == actuator_id) {
        return Err(ControlError::UnknownActuator(actuator_id.to_owned()));
    }
    let entry = state
        .values
        .get_mut(actuator_id)
        .ok_or_else(|| ControlError::Unsynced(actuator_id.to_owned()))?;
    if entry.dispatching {
        return Err(ControlError::Busy(actuator_id.to_owned()));
    }
    Ok(entry)
}
