//! Door check-in workflow.
//!
//! A workflow owns a camera lease while it is scanning or waiting for the
//! operator. The lease releases the device when dropped, so every exit path
//! (close, confirm, device error, dropping the workflow) frees the camera.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::store::{bounded, RegistrationStore, StoreError};
use super::ticket_codec::{DecodeError, TicketCodec};
use crate::models::registration::Registration;
use crate::models::ticket::TicketPayload;

/// Camera device failures.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceError {
    #[error("Camera is not available")]
    Unavailable,

    #[error("Camera permission was denied")]
    PermissionDenied,

    #[error("Camera is already in use by another check-in session")]
    Busy,
}

impl DeviceError {
    pub fn code(&self) -> &'static str {
        match self {
            DeviceError::Unavailable => "device_unavailable",
            DeviceError::PermissionDenied => "device_permission_denied",
            DeviceError::Busy => "device_busy",
        }
    }
}

/// A frame source that can be started, paused and stopped.
pub trait Camera: Send + Sync {
    fn device_id(&self) -> &str;
    fn start(&self) -> Result<(), DeviceError>;
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
}

/// Scoped ownership of a started camera. Dropping it stops the device.
pub struct CameraLease {
    camera: Arc<dyn Camera>,
    paused: bool,
    _permit: Option<OwnedSemaphorePermit>,
}

impl CameraLease {
    /// Starts the camera and wraps it in a lease.
    pub fn acquire(camera: Arc<dyn Camera>) -> Result<Self, DeviceError> {
        Self::start(camera, None)
    }

    fn start(
        camera: Arc<dyn Camera>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Result<Self, DeviceError> {
        camera.start()?;
        tracing::debug!(device_id = camera.device_id(), "Camera started");
        Ok(Self {
            camera,
            paused: false,
            _permit: permit,
        })
    }

    pub fn device_id(&self) -> &str {
        self.camera.device_id()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.camera.pause();
            self.paused = true;
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.camera.resume();
            self.paused = false;
        }
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.camera.stop();
        tracing::debug!(device_id = self.camera.device_id(), "Camera released");
    }
}

/// Wraps a camera so at most one lease on it exists at a time.
pub struct ExclusiveCamera {
    camera: Arc<dyn Camera>,
    permit: Arc<Semaphore>,
}

impl ExclusiveCamera {
    pub fn new(camera: Arc<dyn Camera>) -> Self {
        Self {
            camera,
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn device_id(&self) -> &str {
        self.camera.device_id()
    }

    pub fn in_use(&self) -> bool {
        self.permit.available_permits() == 0
    }

    /// Fails with [`DeviceError::Busy`] while another lease is alive.
    pub fn acquire(&self) -> Result<CameraLease, DeviceError> {
        let permit = self
            .permit
            .clone()
            .try_acquire_owned()
            .map_err(|_| DeviceError::Busy)?;
        CameraLease::start(self.camera.clone(), Some(permit))
    }
}

/// Workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum CheckInState {
    Idle,
    Scanning,
    AwaitingConfirmation(TicketPayload),
    CheckedIn(Registration),
    Error(DeviceError),
}

impl CheckInState {
    pub fn name(&self) -> &'static str {
        match self {
            CheckInState::Idle => "idle",
            CheckInState::Scanning => "scanning",
            CheckInState::AwaitingConfirmation(_) => "awaiting_confirmation",
            CheckInState::CheckedIn(_) => "checked_in",
            CheckInState::Error(_) => "error",
        }
    }
}

/// Result of feeding scanned text into the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A ticket was read; capture is paused until the operator decides.
    AwaitingConfirmation(TicketPayload),
    /// The text was not a ticket. Scanning continues.
    Rejected(DecodeError),
    /// The workflow is not scanning.
    Ignored,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckInError {
    #[error("No ticket is waiting for confirmation")]
    NothingPending,

    #[error("Registration {0} does not exist")]
    UnknownRegistration(i64),

    #[error("The registration store did not respond in time")]
    StoreTimeout,

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl From<StoreError> for CheckInError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(_) => CheckInError::StoreTimeout,
            other => CheckInError::Store(other),
        }
    }
}

/// One operator's scanning session on one camera.
pub struct CheckInWorkflow {
    camera: Arc<ExclusiveCamera>,
    store: Arc<dyn RegistrationStore>,
    store_timeout: Duration,
    state: CheckInState,
    lease: Option<CameraLease>,
}

impl CheckInWorkflow {
    pub fn new(
        camera: Arc<ExclusiveCamera>,
        store: Arc<dyn RegistrationStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            camera,
            store,
            store_timeout,
            state: CheckInState::Idle,
            lease: None,
        }
    }

    pub fn state(&self) -> &CheckInState {
        &self.state
    }

    pub fn device_id(&self) -> &str {
        self.camera.device_id()
    }

    pub fn holds_camera(&self) -> bool {
        self.lease.is_some()
    }

    /// Acquires the camera and begins scanning. Valid from any state that
    /// does not already hold the camera.
    pub fn start(&mut self) -> Result<(), DeviceError> {
        if self.lease.is_some() {
            return Ok(());
        }
        match self.camera.acquire() {
            Ok(lease) => {
                self.lease = Some(lease);
                self.state = CheckInState::Scanning;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(device_id = self.device_id(), error = %err, "Camera acquisition failed");
                self.state = CheckInState::Error(err.clone());
                Err(err)
            }
        }
    }

    /// Decodes scanned text while scanning.
    pub fn on_scan(&mut self, text: &str) -> ScanOutcome {
        if self.state != CheckInState::Scanning {
            return ScanOutcome::Ignored;
        }

        match TicketCodec::decode(text) {
            Ok(payload) => {
                if let Some(lease) = self.lease.as_mut() {
                    lease.pause();
                }
                self.state = CheckInState::AwaitingConfirmation(payload.clone());
                ScanOutcome::AwaitingConfirmation(payload)
            }
            Err(reason) => {
                metrics::counter!("checkin_scans_rejected_total").increment(1);
                tracing::debug!(device_id = self.device_id(), reason = %reason, "Scan rejected");
                ScanOutcome::Rejected(reason)
            }
        }
    }

    /// Marks the pending attendee as checked in and closes the workflow.
    ///
    /// Checking in an attendee who already is checked in succeeds. Confirming
    /// again after a successful confirm re-applies the same check-in. On any
    /// failure the state is left unchanged.
    pub async fn confirm(&mut self) -> Result<Registration, CheckInError> {
        let id = match &self.state {
            CheckInState::AwaitingConfirmation(payload) => payload.id,
            CheckInState::CheckedIn(registration) => registration.id,
            _ => return Err(CheckInError::NothingPending),
        };

        let registration = bounded(self.store_timeout, self.store.set_checked_in(id, true))
            .await?
            .ok_or(CheckInError::UnknownRegistration(id))?;

        metrics::counter!("checkins_confirmed_total").increment(1);
        tracing::info!(
            registration_id = registration.id,
            device_id = self.device_id(),
            "Attendee checked in"
        );

        self.lease = None;
        self.state = CheckInState::CheckedIn(registration.clone());
        Ok(registration)
    }

    /// Discards the pending ticket and resumes scanning.
    pub fn cancel(&mut self) -> Result<(), CheckInError> {
        if !matches!(self.state, CheckInState::AwaitingConfirmation(_)) {
            return Err(CheckInError::NothingPending);
        }
        if let Some(lease) = self.lease.as_mut() {
            lease.resume();
        }
        self.state = CheckInState::Scanning;
        Ok(())
    }

    /// Reports a device failure during capture. The camera is released.
    pub fn fail(&mut self, err: DeviceError) {
        self.lease = None;
        self.state = CheckInState::Error(err);
    }

    /// Releases the camera and returns to idle.
    pub fn close(&mut self) {
        self.lease = None;
        self.state = CheckInState::Idle;
    }
}
