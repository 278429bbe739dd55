use std::path::PathBuf;
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tempfile::TempDir;

use crate::error::FreeCadError;

const SESSION_DIR_PREFIX: &str = "freecad_mcp_";

/// Process-scoped directory of decoded screenshots for file-path delivery.
///
/// The directory is created on the first save and removed by [`teardown`]; files
/// are never deleted mid-session so earlier paths stay valid for the agent.
///
/// [`teardown`]: ScreenshotSession::teardown
#[derive(Debug, Default)]
pub struct ScreenshotSession {
    state: Mutex<SessionState>,
}

#[derive(Debug, Default)]
struct SessionState {
    dir: Option<TempDir>,
    count: u32,
    torn_down: bool,
}

impl ScreenshotSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `image_b64` and writes it as the next `screenshot_NNNN.webp`.
    pub fn save(&self, image_b64: &str) -> Result<PathBuf, FreeCadError> {
        let bytes = STANDARD
            .decode(image_b64.trim())
            .map_err(|err| FreeCadError::Base64Decode(err.to_string()))?;

        let mut state = self
            .state
            .lock()
            .map_err(|_| FreeCadError::InternalPoisoned)?;

        if state.dir.is_none() {
            let dir = tempfile::Builder::new()
                .prefix(SESSION_DIR_PREFIX)
                .tempdir()
                .map_err(|err| FreeCadError::Io {
                    path: std::env::temp_dir().display().to_string(),
                    reason: err.to_string(),
                })?;
            tracing::info!(dir = %dir.path().display(), "created screenshot session dir");
            state.dir = Some(dir);
            state.torn_down = false;
        }

        let next = state.count + 1;
        let Some(dir) = state.dir.as_ref() else {
            return Err(FreeCadError::InternalPoisoned);
        };
        let path = dir.path().join(format!("screenshot_{next:04}.webp"));

        std::fs::write(&path, bytes).map_err(|err| FreeCadError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        state.count = next;

        Ok(path)
    }

    pub fn dir(&self) -> Option<PathBuf> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.dir.as_ref().map(|dir| dir.path().to_path_buf()))
    }

    /// Removes the session directory. Best-effort and idempotent; a directory that
    /// is already gone is not an error.
    pub fn teardown(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if state.torn_down {
            return;
        }
        state.torn_down = true;

        let Some(dir) = state.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => tracing::info!(dir = %path.display(), "cleaned up screenshot session dir"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(dir = %path.display(), error = %err, "screenshot cleanup failed")
            }
        }
    }
}
