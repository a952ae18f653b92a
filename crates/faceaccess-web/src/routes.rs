use crate::launcher::LaunchError;
use crate::pages::{self, Notice};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use faceaccess_core::{register_identity, registered_names, RegistryError};
use serde::Deserialize;
use serde_json::json;

const MSG_EMPTY_USERNAME: &str = "Please enter a username.";
const MSG_SNAPSHOT_MISSING: &str = "Snapshot not found. Please retake.";
const MSG_INVALID_USERNAME: &str = "Invalid username: use letters, digits, '-' or '_'.";
const MSG_PROGRAM_MISSING: &str = "Face recognition program not found.";
const MSG_RECOGNITION_STARTED: &str = "Facial recognition started in a separate window.";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/register", get(register_capture).post(register_submit))
        .route("/login", get(login))
        .route("/status", get(status))
        .with_state(state)
}

fn landing(status: StatusCode, notice: Notice) -> Response {
    (status, Html(pages::landing(Some(&notice)))).into_response()
}

/// Confirmation page for a held snapshot, or the landing page once it is gone.
fn confirm_or_landing(state: &AppState, snapshot_id: &str, status: StatusCode, notice: Notice) -> Response {
    let Some(image) = state.snapshots.get(snapshot_id) else {
        return landing(status, notice);
    };
    match pages::jpeg_base64(&image) {
        Ok(b64) => (status, Html(pages::confirm(snapshot_id, &b64, Some(&notice)))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "encoding snapshot preview failed");
            landing(status, notice)
        }
    }
}

/// Landing page
pub async fn index() -> Html<String> {
    Html(pages::landing(None))
}

/// Capture a snapshot and ask for a username
pub async fn register_capture(State(state): State<AppState>) -> Response {
    let image = match state.capture.snapshot().await {
        Ok(image) => image,
        Err(e) => {
            tracing::error!(error = %e, "registration capture failed");
            return landing(StatusCode::SERVICE_UNAVAILABLE, Notice::error(format!("Capture failed: {e}")));
        }
    };

    match pages::jpeg_base64(&image) {
        Ok(b64) => {
            let id = state.snapshots.insert(image);
            tracing::info!(snapshot_id = %id, "snapshot awaiting confirmation");
            Html(pages::confirm(&id, &b64, None)).into_response()
        }
        Err(e) => landing(StatusCode::INTERNAL_SERVER_ERROR, Notice::error(format!("Capture failed: {e}"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub snapshot_id: String,
}

/// Save a held snapshot under the submitted username
pub async fn register_submit(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    let username = form.username.trim().to_string();
    if username.is_empty() {
        return confirm_or_landing(&state, &form.snapshot_id, StatusCode::BAD_REQUEST, Notice::error(MSG_EMPTY_USERNAME));
    }

    let Some(image) = state.snapshots.get(&form.snapshot_id) else {
        tracing::warn!(snapshot_id = %form.snapshot_id, "unknown or expired snapshot");
        return landing(StatusCode::NOT_FOUND, Notice::error(MSG_SNAPSHOT_MISSING));
    };

    let dir = state.settings.known_faces_dir.clone();
    let saved = tokio::task::spawn_blocking(move || register_identity(&dir, &username, &image)).await;

    match saved {
        Ok(Ok(name)) => {
            state.snapshots.take(&form.snapshot_id);
            landing(StatusCode::OK, Notice::success(format!("User '{name}' registered.")))
        }
        Ok(Err(RegistryError::InvalidName)) => {
            confirm_or_landing(&state, &form.snapshot_id, StatusCode::BAD_REQUEST, Notice::error(MSG_INVALID_USERNAME))
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "saving registration failed");
            confirm_or_landing(
                &state,
                &form.snapshot_id,
                StatusCode::INTERNAL_SERVER_ERROR,
                Notice::error(format!("Save failed: {e}")),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "registration task failed");
            landing(StatusCode::INTERNAL_SERVER_ERROR, Notice::error(format!("Save failed: {e}")))
        }
    }
}

/// Launch live recognition in its own window
pub async fn login(State(state): State<AppState>) -> Response {
    match state.launcher.launch() {
        Ok(_) => landing(StatusCode::OK, Notice::success(MSG_RECOGNITION_STARTED)),
        Err(LaunchError::NotFound(program)) => {
            tracing::error!(%program, "recognizer program missing");
            landing(StatusCode::INTERNAL_SERVER_ERROR, Notice::error(MSG_PROGRAM_MISSING))
        }
        Err(e) => {
            tracing::error!(error = %e, "starting recognizer failed");
            landing(
                StatusCode::INTERNAL_SERVER_ERROR,
                Notice::error(format!("Unable to start recognition: {e}")),
            )
        }
    }
}

/// Service status as JSON
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let identities = match registered_names(&state.settings.known_faces_dir) {
        Ok(names) => json!(names.len()),
        Err(e) => {
            tracing::warn!(error = %e, "listing known faces failed");
            serde_json::Value::Null
        }
    };
    (
        StatusCode::OK,
        Json(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "known_faces_dir": state.settings.known_faces_dir.display().to_string(),
            "identities": identities,
            "pending_snapshots": state.snapshots.len(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::spawn_capture_worker;
    use crate::capture::testing::StillSource;
    use crate::launcher::Launcher;
    use axum::body::Body;
    use axum::http::Request;
    use faceaccess_core::Settings;
    use http_body_util::BodyExt;
    use std::path::{Path, PathBuf};
    use tower::ServiceExt;

    fn test_state(known: &Path, camera_fails: bool, program: Option<&str>) -> AppState {
        let settings = Settings {
            known_faces_dir: known.to_path_buf(),
            ..Settings::default()
        };
        let capture = spawn_capture_worker(StillSource { fail: camera_fails }).unwrap();
        let launcher = Launcher::new(program.map(PathBuf::from), Vec::new());
        AppState::new(settings, capture, launcher)
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_form(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/register")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn hidden_snapshot_id(html: &str) -> String {
        let marker = "name=\"snapshot_id\" value=\"";
        let start = html.find(marker).unwrap() + marker.len();
        let end = start + html[start..].find('"').unwrap();
        html[start..end].to_string()
    }

    #[tokio::test]
    async fn test_index() {
        let tmp = tempfile::tempdir().unwrap();
        let app = router(test_state(tmp.path(), false, None));
        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Register a new user"));
    }

    #[tokio::test]
    async fn test_capture_then_register() {
        let tmp = tempfile::tempdir().unwrap();
        let known = tmp.path().join("known");
        let state = test_state(&known, false, None);

        let response = router(state.clone()).oneshot(get("/register")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("data:image/jpeg;base64,"));
        let id = hidden_snapshot_id(&html);
        assert_eq!(state.snapshots.len(), 1);

        let response = router(state.clone())
            .oneshot(post_form(&format!("username=Alice&snapshot_id={id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("User 'alice' registered."));
        assert!(known.join("alice.jpg").is_file());
        assert!(state.snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_capture_failure_is_503() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), true, None);
        let response = router(state.clone()).oneshot(get("/register")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_text(response).await.contains("Capture failed:"));
        assert!(state.snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_empty_username_changes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let known = tmp.path().join("known");
        let state = test_state(&known, false, None);
        let id = state.snapshots.insert(image::RgbImage::new(4, 4));

        let response = router(state.clone())
            .oneshot(post_form(&format!("username=++&snapshot_id={id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = body_text(response).await;
        assert!(html.contains(MSG_EMPTY_USERNAME));
        assert_eq!(hidden_snapshot_id(&html), id);
        assert!(!known.exists());
        assert_eq!(state.snapshots.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_snapshot_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let known = tmp.path().join("known");
        let app = router(test_state(&known, false, None));
        let response = app
            .oneshot(post_form("username=bob&snapshot_id=19990101000000000000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains(MSG_SNAPSHOT_MISSING));
        assert!(!known.exists());
    }

    #[tokio::test]
    async fn test_invalid_username_is_400() {
        let tmp = tempfile::tempdir().unwrap();
        let known = tmp.path().join("known");
        let state = test_state(&known, false, None);
        let id = state.snapshots.insert(image::RgbImage::new(4, 4));

        let response = router(state.clone())
            .oneshot(post_form(&format!("username=%21%21%21&snapshot_id={id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains(MSG_INVALID_USERNAME));
        assert!(!known.exists());
        assert_eq!(state.snapshots.len(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_is_500() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let state = test_state(&blocker, false, None);
        let id = state.snapshots.insert(image::RgbImage::new(4, 4));

        let response = router(state.clone())
            .oneshot(post_form(&format!("username=carol&snapshot_id={id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("Save failed:"));
        assert_eq!(state.snapshots.len(), 1);
    }

    #[tokio::test]
    async fn test_login_missing_program() {
        let tmp = tempfile::tempdir().unwrap();
        let app = router(test_state(tmp.path(), false, Some("/no/such/faceaccess")));
        let response = app.oneshot(get("/login")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains(MSG_PROGRAM_MISSING));
    }

    #[tokio::test]
    async fn test_login_starts_program() {
        let tmp = tempfile::tempdir().unwrap();
        let app = router(test_state(tmp.path(), false, Some("true")));
        let response = app.oneshot(get("/login")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(MSG_RECOGNITION_STARTED));
    }

    #[tokio::test]
    async fn test_status_counts_identities() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("amy.jpg"), b"x").unwrap();
        std::fs::write(tmp.path().join("ben.png"), b"x").unwrap();
        let app = router(test_state(tmp.path(), false, None));
        let response = app.oneshot(get("/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["identities"], 2);
        assert_eq!(body["pending_snapshots"], 0);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
