use crate::capture::CaptureHandle;
use crate::launcher::Launcher;
use crate::snapshot::SnapshotStore;
use faceaccess_core::Settings;
use std::sync::Arc;
use std::time::Duration;

/// Shared handler state; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub snapshots: Arc<SnapshotStore>,
    pub capture: CaptureHandle,
    pub launcher: Arc<Launcher>,
}

impl AppState {
    pub fn new(settings: Settings, capture: CaptureHandle, launcher: Launcher) -> Self {
        let snapshots = SnapshotStore::new(
            Duration::from_secs(settings.snapshot_ttl_secs),
            settings.snapshot_capacity,
        );
        Self {
            settings: Arc::new(settings),
            snapshots: Arc::new(snapshots),
            capture,
            launcher: Arc::new(launcher),
        }
    }
}
