//! Live check-in sessions hosted for door devices.
//!
//! A door device (a phone or tablet running the dashboard) decodes QR frames
//! locally and relays the decoded text here. Each device id maps to one
//! exclusive camera, so two operators cannot scan on the same device at once.

use domain::services::{
    Camera, CheckInState, CheckInWorkflow, DeviceError, ExclusiveCamera, RegistrationStore,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::MutexGuard;
use uuid::Uuid;

/// Camera whose frames are captured and decoded on the remote device.
#[derive(Debug)]
pub struct RelayCamera {
    device_id: String,
    active: AtomicBool,
    paused: AtomicBool,
}

impl RelayCamera {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            active: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

impl Camera for RelayCamera {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn start(&self) -> Result<(), DeviceError> {
        self.paused.store(false, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }
}

/// One operator's workflow on one device.
pub struct ScannerSession {
    pub id: Uuid,
    pub owner: Uuid,
    device_id: String,
    workflow: tokio::sync::Mutex<CheckInWorkflow>,
    last_active: Mutex<Instant>,
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerSnapshot {
    pub id: Uuid,
    pub device_id: String,
    pub holds_camera: bool,
    pub status: CheckInState,
}

impl ScannerSession {
    fn new(owner: Uuid, workflow: CheckInWorkflow) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            device_id: workflow.device_id().to_string(),
            workflow: tokio::sync::Mutex::new(workflow),
            last_active: Mutex::new(Instant::now()),
        }
    }

    /// Exclusive access to the workflow. Counts as activity.
    pub async fn workflow(&self) -> MutexGuard<'_, CheckInWorkflow> {
        self.touch();
        self.workflow.lock().await
    }

    pub fn snapshot_of(&self, workflow: &CheckInWorkflow) -> ScannerSnapshot {
        ScannerSnapshot {
            id: self.id,
            device_id: workflow.device_id().to_string(),
            holds_camera: workflow.holds_camera(),
            status: workflow.state().clone(),
        }
    }

    pub async fn snapshot(&self) -> ScannerSnapshot {
        let workflow = self.workflow().await;
        self.snapshot_of(&workflow)
    }

    fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }
}

pub struct ScannerRegistry {
    store: Arc<dyn RegistrationStore>,
    store_timeout: Duration,
    idle_timeout: Duration,
    cameras: Mutex<HashMap<String, Arc<ExclusiveCamera>>>,
    sessions: Mutex<HashMap<Uuid, Arc<ScannerSession>>>,
}

impl ScannerRegistry {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        store_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            store,
            store_timeout,
            idle_timeout,
            cameras: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Builds a workflow on the device's camera and starts it.
    ///
    /// The camera map stays locked until the lease is held, so pruning never
    /// drops a device between lookup and acquisition.
    fn start_on(&self, device_id: &str) -> Result<CheckInWorkflow, DeviceError> {
        let mut cameras = self.cameras.lock().unwrap_or_else(|e| e.into_inner());
        let camera = cameras
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(ExclusiveCamera::new(Arc::new(RelayCamera::new(device_id)))))
            .clone();

        let mut workflow = CheckInWorkflow::new(camera, self.store.clone(), self.store_timeout);
        workflow.start()?;
        Ok(workflow)
    }

    /// Forgets devices that are idle and not bound to any open session.
    fn prune_cameras(&self) {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let mut cameras = self.cameras.lock().unwrap_or_else(|e| e.into_inner());
        cameras.retain(|device_id, camera| {
            camera.in_use() || sessions.values().any(|s| &s.device_id == device_id)
        });
    }

    /// Starts a scanning session on a device.
    ///
    /// Fails with `Busy` while another live session holds the device.
    pub async fn open(
        &self,
        owner: Uuid,
        device_id: &str,
    ) -> Result<Arc<ScannerSession>, DeviceError> {
        self.reap_idle().await;

        let workflow = self.start_on(device_id)?;
        let session = Arc::new(ScannerSession::new(owner, workflow));
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.id, session.clone());

        tracing::info!(
            session_id = %session.id,
            staff_id = %owner,
            device_id = device_id,
            "Check-in session opened"
        );
        Ok(session)
    }

    /// Sessions are only visible to the staff member who opened them.
    pub fn get(&self, id: Uuid, owner: Uuid) -> Option<Arc<ScannerSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .filter(|s| s.owner == owner)
            .cloned()
    }

    /// Releases the camera and forgets the session.
    pub async fn close(&self, id: Uuid, owner: Uuid) -> bool {
        let removed = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            let owned = sessions.get(&id).is_some_and(|s| s.owner == owner);
            if owned {
                sessions.remove(&id)
            } else {
                None
            }
        };

        match removed {
            Some(session) => {
                session.workflow().await.close();
                self.prune_cameras();
                tracing::info!(session_id = %id, "Check-in session closed");
                true
            }
            None => false,
        }
    }

    /// Closes sessions untouched for longer than the idle timeout.
    pub async fn reap_idle(&self) -> usize {
        let idle: Vec<Arc<ScannerSession>> = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            let expired: Vec<Uuid> = sessions
                .values()
                .filter(|s| s.idle_for() >= self.idle_timeout)
                .map(|s| s.id)
                .collect();
            expired
                .iter()
                .filter_map(|id| sessions.remove(id))
                .collect()
        };

        for session in &idle {
            session.workflow.lock().await.close();
            tracing::info!(session_id = %session.id, "Idle check-in session closed");
        }
        self.prune_cameras();
        idle.len()
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::registration::NewRegistration;
    use domain::services::{InMemoryStore, ScanOutcome};

    fn registry(idle: Duration) -> (Arc<InMemoryStore>, ScannerRegistry) {
        let store = Arc::new(InMemoryStore::new());
        let registry = ScannerRegistry::new(store.clone(), Duration::from_secs(1), idle);
        (store, registry)
    }

    #[test]
    fn test_relay_camera_tracks_state() {
        let camera = RelayCamera::new("door-1");
        camera.start().unwrap();
        assert!(camera.is_active());
        camera.pause();
        assert!(camera.is_paused());
        camera.stop();
        assert!(!camera.is_active());
        assert!(!camera.is_paused());
    }

    #[tokio::test]
    async fn test_open_starts_scanning() {
        let (_, registry) = registry(Duration::from_secs(300));
        let owner = Uuid::new_v4();

        let session = registry.open(owner, "door-1").await.unwrap();
        let snapshot = session.snapshot().await;

        assert_eq!(snapshot.device_id, "door-1");
        assert!(snapshot.holds_camera);
        assert_eq!(snapshot.status, CheckInState::Scanning);
    }

    #[tokio::test]
    async fn test_second_session_on_device_is_busy() {
        let (_, registry) = registry(Duration::from_secs(300));
        let first = registry.open(Uuid::new_v4(), "door-1").await.unwrap();

        assert_eq!(
            registry.open(Uuid::new_v4(), "door-1").await.err(),
            Some(DeviceError::Busy)
        );
        assert!(registry.open(Uuid::new_v4(), "door-2").await.is_ok());

        assert!(registry.close(first.id, first.owner).await);
        assert!(registry.open(Uuid::new_v4(), "door-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_sessions_are_private_to_owner() {
        let (_, registry) = registry(Duration::from_secs(300));
        let owner = Uuid::new_v4();
        let session = registry.open(owner, "door-1").await.unwrap();

        assert!(registry.get(session.id, owner).is_some());
        assert!(registry.get(session.id, Uuid::new_v4()).is_none());
        assert!(!registry.close(session.id, Uuid::new_v4()).await);
        assert_eq!(registry.session_count(), 1);
    }

    #[tokio::test]
    async fn test_confirm_through_session() {
        let (store, registry) = registry(Duration::from_secs(300));
        let registration = match store
            .insert(
                NewRegistration {
                    full_name: "Ana".to_string(),
                    phone: "555-0100".to_string(),
                    address: "Calle 1".to_string(),
                    organization: None,
                    sponsor: None,
                },
                10,
            )
            .await
            .unwrap()
        {
            domain::services::InsertOutcome::Inserted(r) => r,
            other => panic!("unexpected {:?}", other),
        };

        let session = registry.open(Uuid::new_v4(), "door-1").await.unwrap();
        let mut workflow = session.workflow().await;
        let text = format!(r#"{{"id":{},"nombre":"Ana"}}"#, registration.id);
        assert!(matches!(
            workflow.on_scan(&text),
            ScanOutcome::AwaitingConfirmation(_)
        ));
        let checked_in = workflow.confirm().await.unwrap();
        assert!(checked_in.checked_in);
        assert!(!workflow.holds_camera());
    }

    #[tokio::test]
    async fn test_idle_sessions_release_camera() {
        let (_, registry) = registry(Duration::ZERO);
        registry.open(Uuid::new_v4(), "door-1").await.unwrap();

        assert_eq!(registry.reap_idle().await, 1);
        assert_eq!(registry.session_count(), 0);
        // Reaping on open frees the device for the next operator.
        assert!(registry.open(Uuid::new_v4(), "door-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_devices_are_forgotten() {
        let (_, registry) = registry(Duration::from_secs(300));

        for i in 0..200 {
            let owner = Uuid::new_v4();
            let session = registry.open(owner, &format!("dev-{}", i)).await.unwrap();
            assert!(registry.close(session.id, owner).await);
        }

        assert_eq!(registry.session_count(), 0);
        assert_eq!(registry.camera_count(), 0);
    }

    #[tokio::test]
    async fn test_reaped_devices_are_forgotten() {
        let (_, registry) = registry(Duration::ZERO);
        for i in 0..10 {
            registry
                .open(Uuid::new_v4(), &format!("dev-{}", i))
                .await
                .unwrap();
        }

        registry.reap_idle().await;

        assert_eq!(registry.camera_count(), 0);
    }

    #[tokio::test]
    async fn test_device_of_live_session_is_kept() {
        let (_, registry) = registry(Duration::from_secs(300));
        let owner = Uuid::new_v4();
        let live = registry.open(owner, "door-1").await.unwrap();
        let other = registry.open(owner, "door-2").await.unwrap();

        // A live session that released its lease still pins its device
        live.workflow().await.fail(DeviceError::Unavailable);
        assert!(registry.close(other.id, owner).await);

        assert_eq!(registry.camera_count(), 1);
        // The released lease lets another session start there
        assert!(registry.open(Uuid::new_v4(), "door-1").await.is_ok());
    }
}
