use anyhow::{Context, Result};
use faceaccess_core::Settings;
use tracing_subscriber::EnvFilter;

mod capture;
mod launcher;
mod pages;
mod routes;
mod snapshot;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("faceaccess-web starting");

    let settings = Settings::load().context("loading settings")?;
    tracing::info!(
        known_faces = %settings.known_faces_dir.display(),
        cameras = ?settings.camera_indices(),
        "settings loaded"
    );

    let capture = capture::spawn_capture_worker(capture::CameraSnapshots {
        indices: settings.camera_indices(),
        warmup_frames: settings.warmup_frames,
    })
    .context("spawning capture thread")?;
    let launcher = launcher::Launcher::from_settings(&settings);
    let bind_addr = settings.bind_addr.clone();
    let app = routes::router(state::AppState::new(settings, capture, launcher));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "faceaccess-web ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("faceaccess-web shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
