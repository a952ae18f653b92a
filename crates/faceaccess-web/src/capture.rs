use faceaccess_hw::CameraError;
use image::RgbImage;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("capture thread exited")]
    ChannelClosed,
}

/// Blocking source of single still frames.
pub trait SnapshotSource: Send + 'static {
    fn snapshot(&mut self) -> Result<RgbImage, CameraError>;
}

/// Opens each camera in turn, grabs one frame and releases the device.
pub struct CameraSnapshots {
    pub indices: Vec<u32>,
    pub warmup_frames: usize,
}

impl SnapshotSource for CameraSnapshots {
    fn snapshot(&mut self) -> Result<RgbImage, CameraError> {
        faceaccess_hw::capture_snapshot(&self.indices, self.warmup_frames).map(|frame| frame.image)
    }
}

/// Messages sent from HTTP handlers to the capture thread.
enum CaptureRequest {
    Snapshot {
        reply: oneshot::Sender<Result<RgbImage, CaptureError>>,
    },
}

/// Clone-safe handle to the capture thread.
#[derive(Clone)]
pub struct CaptureHandle {
    tx: mpsc::Sender<CaptureRequest>,
}

impl CaptureHandle {
    /// Request one still frame from the camera.
    pub async fn snapshot(&self) -> Result<RgbImage, CaptureError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CaptureRequest::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| CaptureError::ChannelClosed)?;
        reply_rx.await.map_err(|_| CaptureError::ChannelClosed)?
    }
}

/// Spawn the capture loop on a dedicated OS thread.
///
/// Requests are served one at a time, so two handlers never race for the
/// camera.
pub fn spawn_capture_worker<S: SnapshotSource>(mut source: S) -> std::io::Result<CaptureHandle> {
    let (tx, mut rx) = mpsc::channel::<CaptureRequest>(4);

    std::thread::Builder::new()
        .name("faceaccess-capture".into())
        .spawn(move || {
            tracing::info!("capture thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    CaptureRequest::Snapshot { reply } => {
                        let result = source.snapshot().map_err(CaptureError::from);
                        if let Err(e) = &result {
                            tracing::warn!(error = %e, "snapshot capture failed");
                        }
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("capture thread exiting");
        })?;

    Ok(CaptureHandle { tx })
}


#[cfg(test)]
mod tests {
    use super::testing::StillSource;
    use super::*;

    #[tokio::test]
    async fn test_snapshot_round_trip_through_worker() {
        let handle = spawn_capture_worker(StillSource { fail: false }).unwrap();
        let frame = handle.snapshot().await.unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
        // worker keeps serving
        assert!(handle.clone().snapshot().await.is_ok());
    }

    #[tokio::test]
    async fn test_camera_failure_is_reported() {
        let handle = spawn_capture_worker(StillSource { fail: true }).unwrap();
        let err = handle.snapshot().await.unwrap_err();
        assert!(matches!(err, CaptureError::Camera(CameraError::NoWorkingCamera(_))));
    }
}
