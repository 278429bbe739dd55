use std::env;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;
use tokio::process::Command;

pub const DEFAULT_ANALYSIS_CLI: &str = "gemini";
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(30);

const SCRATCH_PREFIX: &str = "freecad_mcp_";
const SCRATCH_SUFFIX: &str = ".webp";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis tool is not installed")]
    NotInstalled,

    #[error("invalid screenshot payload: {0}")]
    Base64Decode(String),

    #[error("scratch image failed: {0}")]
    Io(String),

    #[error("failed to start `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("analysis timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("analysis exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("analysis produced no output")]
    EmptyOutput,
}

/// A question about one captured image, optionally with a description of an
/// earlier capture to compare against.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnalysisRequest {
    pub question: String,
    pub before: Option<String>,
}

impl AnalysisRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            before: None,
        }
    }

    pub fn with_before(mut self, before: impl Into<String>) -> Self {
        let before = before.into();
        self.before = (!before.trim().is_empty()).then_some(before);
        self
    }

    /// Prompt text referencing the image with the CLI's `@path` syntax.
    pub fn render(&self, image_path: &Path) -> String {
        let path = image_path.display();
        match self.before.as_deref() {
            Some(before) => format!(
                "BEFORE state description: {before}\n\nNow for the AFTER state: {} @{path}",
                self.question
            ),
            None => format!("{} @{path}", self.question),
        }
    }
}

/// Turns a screenshot into descriptive text.
#[async_trait]
pub trait VisualAnalyzer: Send + Sync {
    fn is_available(&self) -> bool;

    async fn analyze(
        &self,
        image_b64: &str,
        request: &AnalysisRequest,
    ) -> Result<String, AnalysisError>;
}

/// External analysis CLI (`gemini` by default) run as a one-shot subprocess.
#[derive(Clone, Debug)]
pub struct AnalysisCli {
    program: String,
    resolved: Option<PathBuf>,
    timeout: Duration,
}

impl AnalysisCli {
    /// Resolves `program` against `PATH` (or as a path when it contains a
    /// separator). A missing executable yields an analyzer that is unavailable.
    pub fn detect(program: impl Into<String>, timeout: Duration) -> Self {
        let program = program.into();
        let resolved = resolve_program(&program);
        match resolved.as_ref() {
            Some(path) => tracing::info!(cli = %path.display(), "visual analysis enabled"),
            None => tracing::info!(cli = %program, "visual analysis CLI not found"),
        }

        Self {
            program,
            resolved,
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl VisualAnalyzer for AnalysisCli {
    fn is_available(&self) -> bool {
        self.resolved.is_some()
    }

    async fn analyze(
        &self,
        image_b64: &str,
        request: &AnalysisRequest,
    ) -> Result<String, AnalysisError> {
        let program = self.resolved.as_ref().ok_or(AnalysisError::NotInstalled)?;

        let bytes = STANDARD
            .decode(image_b64.trim())
            .map_err(|err| AnalysisError::Base64Decode(err.to_string()))?;

        // Removed on drop, including on every early return below.
        let mut scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(SCRATCH_SUFFIX)
            .tempfile()
            .map_err(|err| AnalysisError::Io(err.to_string()))?;
        scratch
            .write_all(&bytes)
            .and_then(|()| scratch.flush())
            .map_err(|err| AnalysisError::Io(err.to_string()))?;

        let image_path = scratch.path().to_path_buf();
        let include_dir = image_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(env::temp_dir);
        let prompt = request.render(&image_path);

        let child = Command::new(program)
            .arg("--include-directories")
            .arg(&include_dir)
            .arg("-p")
            .arg(&prompt)
            .arg("-o")
            .arg("text")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| AnalysisError::Spawn {
                program: program.display().to_string(),
                reason: err.to_string(),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| AnalysisError::Timeout {
                timeout: self.timeout,
            })?
            .map_err(|err| AnalysisError::Io(err.to_string()))?;

        if !output.status.success() {
            return Err(AnalysisError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(AnalysisError::EmptyOutput);
        }
        Ok(text)
    }
}

fn resolve_program(program: &str) -> Option<PathBuf> {
    let program = program.trim();
    if program.is_empty() {
        return None;
    }

    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }

    find_in_path(program)
}

fn find_in_path(exe_name: &str) -> Option<PathBuf> {
    let path_env = env::var_os("PATH")?;
    for dir in env::split_paths(&path_env) {
        let candidate = dir.join(exe_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let candidate = dir.join(format!("{exe_name}.exe"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}
