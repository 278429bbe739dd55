use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::analysis::{AnalysisCli, VisualAnalyzer};
use crate::client::FreeCadClient;
use crate::config::BridgeConfig;
use crate::detect::{CapabilityDetector, CompatibilityTable};
use crate::error::FreeCadError;
use crate::screenshots::ScreenshotSession;
use crate::tools::response::{ResponsePart, SCREENSHOT_MIME_TYPE};
use crate::workflow::VisualWorkflow;

/// Everything one bridge process shares across tool calls: the lazily opened
/// FreeCAD connection, client detection, the screenshot directory and the
/// snapshot store.
#[derive(Debug)]
pub struct BridgeSession {
    config: BridgeConfig,
    connection: Mutex<Option<FreeCadClient>>,
    detector: CapabilityDetector,
    screenshots: ScreenshotSession,
    workflow: VisualWorkflow,
    shut_down: AtomicBool,
}

impl BridgeSession {
    /// Session using the configured analysis CLI as resolved on `PATH`.
    pub fn new(config: BridgeConfig) -> Self {
        let analyzer = AnalysisCli::detect(config.analysis_cli.clone(), config.analysis_timeout);
        Self::with_analyzer(config, Arc::new(analyzer))
    }

    pub fn with_analyzer(config: BridgeConfig, analyzer: Arc<dyn VisualAnalyzer>) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
            detector: CapabilityDetector::default(),
            screenshots: ScreenshotSession::new(),
            workflow: VisualWorkflow::new(analyzer),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn with_compatibility_table(mut self, table: CompatibilityTable) -> Self {
        self.detector = CapabilityDetector::new(table);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn detector(&self) -> &CapabilityDetector {
        &self.detector
    }

    pub fn screenshots(&self) -> &ScreenshotSession {
        &self.screenshots
    }

    pub fn workflow(&self) -> &VisualWorkflow {
        &self.workflow
    }

    /// Returns the cached client, connecting (and pinging) first if there is none.
    /// Concurrent callers wait on the slot, so at most one connection is opened.
    pub async fn remote(&self) -> Result<FreeCadClient, FreeCadError> {
        let mut slot = self.connection.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = self.config.client_builder().connect().await?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drops the cached client after a transport-level failure so the next call
    /// reconnects from scratch.
    pub async fn reset_connection_on(&self, err: &FreeCadError) {
        if !err.is_connection_error() {
            return;
        }

        if self.connection.lock().await.take().is_some() {
            tracing::warn!(error = %err, "dropping FreeCAD connection");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Startup connection attempt; failure only logs, tools connect on demand.
    pub async fn warm_up(&self) {
        match self.remote().await {
            Ok(client) => {
                tracing::info!(endpoint = client.endpoint(), "connected to FreeCAD on startup")
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not connect to FreeCAD on startup");
                tracing::warn!(
                    "make sure the FreeCAD addon is running before using FreeCAD tools"
                );
            }
        }
    }

    /// Image part or file-path note, depending on what the calling client prefers.
    pub fn deliver_screenshot(&self, image_b64: &str, client_name: Option<&str>) -> ResponsePart {
        if self.detector.prefers_file_delivery(client_name) {
            match self.screenshots.save(image_b64) {
                Ok(path) => return ResponsePart::Text(format!("Screenshot: {}", path.display())),
                Err(err) => {
                    tracing::warn!(error = %err, "could not save screenshot, sending inline")
                }
            }
        }

        ResponsePart::Image {
            data: image_b64.to_string(),
            mime_type: SCREENSHOT_MIME_TYPE.to_string(),
        }
    }

    /// Releases the connection, snapshots and screenshot directory. Later calls
    /// are no-ops.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.connection.lock().await.take().is_some() {
            tracing::info!("disconnecting from FreeCAD on shutdown");
        }
        self.workflow.clear();
        self.screenshots.teardown();
        tracing::info!("FreeCAD MCP bridge shut down");
    }
}
