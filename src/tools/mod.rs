//! Agent-facing operations. Each one validates its inputs, talks to FreeCAD
//! through the session's shared client, and folds the outcome into a
//! [`ToolResponse`] whose first part is a human-readable status line.
//!
//! Tool calls never fail at the protocol level: remote errors, connection
//! problems and unavailable screenshots all come back as ordinary responses.

/// Typed tool inputs with their defaults.
pub mod params;
/// Transport-neutral tool results.
pub mod response;

use serde_json::Value;

use crate::client::FreeCadClient;
use crate::error::FreeCadError;
use crate::model::common::{ObjectSpec, Screenshot, ScreenshotRequest};
use crate::session::BridgeSession;

use self::params::{
    AnalyzeViewParams, CreateDocumentParams, CreateObjectParams, DeleteObjectParams,
    EditObjectParams, ExecuteCodeParams, GetObjectParams, GetObjectsParams, GetViewParams,
    InsertPartParams, SnapshotViewParams,
};
use self::response::ToolResponse;

pub const UNAVAILABLE_NOTE: &str = "Note: Visual preview is unavailable in the current view type (such as TechDraw or Spreadsheet). Switch to a 3D view to see visual feedback.";
pub const GET_VIEW_UNAVAILABLE: &str =
    "Cannot get screenshot in the current view type (such as TechDraw or Spreadsheet)";
pub const GET_VIEW_TEXT_ONLY: &str = "Screenshot not available in text-only mode.";
pub const SNAPSHOT_TEXT_ONLY: &str = "snapshot_view not available in text-only mode.";
pub const SNAPSHOT_NO_SCREENSHOT: &str = "snapshot_view: no screenshot available in current view.";
pub const ANALYZE_TEXT_ONLY: &str = "analyze_view not available in text-only mode.";
pub const ANALYZE_NO_SCREENSHOT: &str = "analyze_view: no screenshot available in current view.";
pub const NO_PRE_ANALYSIS_NOTE: &str =
    "(Visual analysis not available; snapshot stored without pre-analysis.)";
pub const ANALYZER_MISSING_NOTE: &str = "Visual analysis CLI not found, so no analysis is available. Install it (Gemini CLI by default) for enhanced visual verification.";
pub const ANALYSIS_FAILED_NOTE: &str =
    "Visual analysis did not return a result; rely on the screenshot above.";
pub const NO_PARTS_NOTICE: &str =
    "No parts found in the parts library. You must add parts_library addon.";

impl BridgeSession {
    pub async fn create_document(&self, params: CreateDocumentParams) -> ToolResponse {
        const FAILED: &str = "Failed to create document";

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        match remote.create_document(&params.name).await {
            Ok(name) => ToolResponse::ok(format!("Document '{name}' created successfully")),
            Err(err) => self.failure(FAILED, err).await,
        }
    }

    pub async fn create_object(
        &self,
        params: CreateObjectParams,
        client_name: Option<&str>,
    ) -> ToolResponse {
        const FAILED: &str = "Failed to create object";

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        let mut spec = ObjectSpec::new(params.obj_name, params.obj_type);
        spec.properties = params.obj_properties.unwrap_or_default();
        spec.analysis = params.analysis_name;

        let result = remote.create_object(&params.doc_name, &spec).await;
        self.finish_mutation(
            &remote,
            result,
            |name| format!("Object '{name}' created successfully"),
            FAILED,
            params.capture_screenshot,
            client_name,
        )
        .await
    }

    pub async fn edit_object(
        &self,
        params: EditObjectParams,
        client_name: Option<&str>,
    ) -> ToolResponse {
        const FAILED: &str = "Failed to edit object";

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        let result = remote
            .edit_object(&params.doc_name, &params.obj_name, &params.obj_properties)
            .await;
        self.finish_mutation(
            &remote,
            result,
            |name| format!("Object '{name}' edited successfully"),
            FAILED,
            params.capture_screenshot,
            client_name,
        )
        .await
    }

    pub async fn delete_object(
        &self,
        params: DeleteObjectParams,
        client_name: Option<&str>,
    ) -> ToolResponse {
        const FAILED: &str = "Failed to delete object";

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        let result = remote
            .delete_object(&params.doc_name, &params.obj_name)
            .await;
        self.finish_mutation(
            &remote,
            result,
            |name| format!("Object '{name}' deleted successfully"),
            FAILED,
            params.capture_screenshot,
            client_name,
        )
        .await
    }

    pub async fn execute_code(
        &self,
        params: ExecuteCodeParams,
        client_name: Option<&str>,
    ) -> ToolResponse {
        const FAILED: &str = "Failed to execute code";

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        let result = remote.execute_code(&params.code).await;
        self.finish_mutation(
            &remote,
            result,
            |message| format!("Code executed successfully: {message}"),
            FAILED,
            params.capture_screenshot,
            client_name,
        )
        .await
    }

    pub async fn insert_part_from_library(
        &self,
        params: InsertPartParams,
        client_name: Option<&str>,
    ) -> ToolResponse {
        const FAILED: &str = "Failed to insert part from library";

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        let result = remote.insert_part_from_library(&params.relative_path).await;
        self.finish_mutation(
            &remote,
            result,
            |message| format!("Part inserted from library: {message}"),
            FAILED,
            params.capture_screenshot,
            client_name,
        )
        .await
    }

    pub async fn get_view(&self, params: GetViewParams, client_name: Option<&str>) -> ToolResponse {
        if self.config().only_text_feedback {
            return ToolResponse::ok(GET_VIEW_TEXT_ONLY);
        }

        let remote = match self.connect_for("Failed to get view").await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        match remote.get_active_screenshot(&params.screenshot_request()).await {
            Screenshot::Captured(image) => {
                let mut response =
                    ToolResponse::ok(format!("Screenshot of the '{}' view", params.view_name));
                response.push(self.deliver_screenshot(&image, client_name));
                response
            }
            Screenshot::Unavailable(_) => ToolResponse::ok(GET_VIEW_UNAVAILABLE),
        }
    }

    /// Captures `view_name` and stores it, with a pre-analysis when the analyzer
    /// is installed, for a later `analyze_view` comparison.
    pub async fn snapshot_view(
        &self,
        params: SnapshotViewParams,
        client_name: Option<&str>,
    ) -> ToolResponse {
        const FAILED: &str = "Failed to snapshot view";

        if self.config().only_text_feedback {
            return ToolResponse::ok(SNAPSHOT_TEXT_ONLY);
        }

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        let Some(image) = remote
            .get_active_screenshot(&params.screenshot_request())
            .await
            .into_image()
        else {
            return ToolResponse::ok(SNAPSHOT_NO_SCREENSHOT);
        };

        let record = match self.workflow().snapshot(params.view_name, &image).await {
            Ok(record) => record,
            Err(err) => return self.failure(FAILED, err).await,
        };

        let mut status = format!("Snapshot stored for '{}' view.", params.view_name);
        if record.pre_analysis.is_empty() {
            status.push('\n');
            status.push_str(NO_PRE_ANALYSIS_NOTE);
        } else {
            status.push_str("\nPre-analysis: ");
            status.push_str(&record.pre_analysis);
        }

        let mut response = ToolResponse::ok(status);
        response.push(self.deliver_screenshot(&image, client_name));
        response
    }

    /// Captures `view_name` and asks the analyzer about it. The screenshot is
    /// always returned, analysis or not.
    pub async fn analyze_view(
        &self,
        params: AnalyzeViewParams,
        client_name: Option<&str>,
    ) -> ToolResponse {
        const FAILED: &str = "Failed to analyze view";

        if self.config().only_text_feedback {
            return ToolResponse::ok(ANALYZE_TEXT_ONLY);
        }

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        let Some(image) = remote
            .get_active_screenshot(&params.screenshot_request())
            .await
            .into_image()
        else {
            return ToolResponse::ok(ANALYZE_NO_SCREENSHOT);
        };

        let outcome = match self
            .workflow()
            .analyze(
                params.view_name,
                &image,
                &params.question,
                params.compare_to_snapshot,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => return self.failure(FAILED, err).await,
        };

        let mut response = ToolResponse::ok(format!("Analyzed the '{}' view", params.view_name));
        response.push(self.deliver_screenshot(&image, client_name));
        match outcome.analysis {
            Some(analysis) => response.push_text(format!("**Visual analysis:**\n\n{analysis}")),
            None if !outcome.analyzer_available => response.push_text(ANALYZER_MISSING_NOTE),
            None => response.push_text(ANALYSIS_FAILED_NOTE),
        }
        response
    }

    pub async fn get_objects(
        &self,
        params: GetObjectsParams,
        client_name: Option<&str>,
    ) -> ToolResponse {
        const FAILED: &str = "Failed to get objects";

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        let objects = match remote.get_objects(&params.doc_name, !params.detailed).await {
            Ok(objects) => objects,
            Err(err) => return self.failure(FAILED, err).await,
        };

        let count = objects.as_array().map_or(0, Vec::len);
        let mut response =
            ToolResponse::ok(format!("Found {count} objects in '{}'", params.doc_name));
        response.push_text(objects.to_string());
        self.attach_screenshot(&remote, &mut response, params.capture_screenshot, client_name)
            .await;
        response
    }

    pub async fn get_object(
        &self,
        params: GetObjectParams,
        client_name: Option<&str>,
    ) -> ToolResponse {
        const FAILED: &str = "Failed to get object";

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        let object = match remote.get_object(&params.doc_name, &params.obj_name).await {
            Ok(object) => object,
            Err(err) => return self.failure(FAILED, err).await,
        };

        let name = object
            .get("Name")
            .and_then(Value::as_str)
            .unwrap_or(&params.obj_name)
            .to_string();
        let mut response = ToolResponse::ok(format!("Object '{name}' in '{}'", params.doc_name));
        response.push_text(object.to_string());
        self.attach_screenshot(&remote, &mut response, params.capture_screenshot, client_name)
            .await;
        response
    }

    pub async fn get_parts_list(&self) -> ToolResponse {
        const FAILED: &str = "Failed to get parts list";

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        match remote.get_parts_list().await {
            Ok(parts) if parts.is_empty() => ToolResponse::ok(NO_PARTS_NOTICE),
            Ok(parts) => {
                let mut response =
                    ToolResponse::ok(format!("Found {} parts in the parts library", parts.len()));
                response.push_text(Value::from(parts).to_string());
                response
            }
            Err(err) => self.failure(FAILED, err).await,
        }
    }

    pub async fn list_documents(&self) -> ToolResponse {
        const FAILED: &str = "Failed to list documents";

        let remote = match self.connect_for(FAILED).await {
            Ok(remote) => remote,
            Err(response) => return response,
        };

        match remote.list_documents().await {
            Ok(documents) => {
                let mut response =
                    ToolResponse::ok(format!("Found {} open documents", documents.len()));
                response.push_text(Value::from(documents).to_string());
                response
            }
            Err(err) => self.failure(FAILED, err).await,
        }
    }

    async fn connect_for(&self, context: &str) -> Result<FreeCadClient, ToolResponse> {
        match self.remote().await {
            Ok(remote) => Ok(remote),
            Err(err) => Err(self.failure(context, err).await),
        }
    }

    async fn failure(&self, context: &str, err: FreeCadError) -> ToolResponse {
        tracing::error!(error = %err, "{context}");
        self.reset_connection_on(&err).await;
        ToolResponse::failure(format!("{context}: {err}"))
    }

    /// Status line for a remote mutation, plus the post-operation screenshot. The
    /// screenshot is attached after remote-reported failures too, but not after
    /// connection failures.
    async fn finish_mutation(
        &self,
        remote: &FreeCadClient,
        result: Result<String, FreeCadError>,
        success: impl FnOnce(String) -> String,
        failed: &str,
        capture_screenshot: bool,
        client_name: Option<&str>,
    ) -> ToolResponse {
        let mut response = match result {
            Ok(value) => ToolResponse::ok(success(value)),
            Err(err) if err.is_connection_error() => return self.failure(failed, err).await,
            Err(err) => {
                tracing::warn!(error = %err, "{failed}");
                ToolResponse::failure(format!("{failed}: {err}"))
            }
        };

        self.attach_screenshot(remote, &mut response, capture_screenshot, client_name)
            .await;
        response
    }

    async fn attach_screenshot(
        &self,
        remote: &FreeCadClient,
        response: &mut ToolResponse,
        requested: bool,
        client_name: Option<&str>,
    ) {
        if !requested || self.config().only_text_feedback {
            return;
        }

        match remote
            .get_active_screenshot(&ScreenshotRequest::default())
            .await
        {
            Screenshot::Captured(image) => response.push(self.deliver_screenshot(&image, client_name)),
            Screenshot::Unavailable(_) => response.push_text(UNAVAILABLE_NOTE),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::{ANALYZE_TEXT_ONLY, GET_VIEW_TEXT_ONLY, SNAPSHOT_TEXT_ONLY};
    use crate::analysis::AnalysisCli;
    use crate::config::BridgeConfig;
    use crate::session::BridgeSession;
    use crate::tools::params::{
        AnalyzeViewParams, CreateObjectParams, GetViewParams, SnapshotViewParams,
    };

    fn session_with(config: BridgeConfig) -> BridgeSession {
        BridgeSession::with_analyzer(
            config,
            Arc::new(AnalysisCli::detect("no-such-analysis-cli-51ab", Duration::from_secs(1))),
        )
    }

    fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe port");
        listener.local_addr().expect("local addr").port()
    }

    #[tokio::test]
    async fn text_only_mode_answers_visual_tools_without_connecting() {
        let session = session_with(BridgeConfig {
            port: unused_port(),
            only_text_feedback: true,
            ..BridgeConfig::default()
        });

        let view: GetViewParams =
            serde_json::from_value(json!({"view_name": "Front"})).expect("params");
        let response = session.get_view(view, None).await;
        assert_eq!(response.texts(), vec![GET_VIEW_TEXT_ONLY]);
        assert!(!response.failed);

        let response = session
            .snapshot_view(SnapshotViewParams::default(), None)
            .await;
        assert_eq!(response.status(), SNAPSHOT_TEXT_ONLY);

        let response = session
            .analyze_view(AnalyzeViewParams::default(), None)
            .await;
        assert_eq!(response.status(), ANALYZE_TEXT_ONLY);
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_failure_line_only() {
        let session = session_with(BridgeConfig {
            host: "127.0.0.1".to_string(),
            port: unused_port(),
            timeout: Duration::from_secs(2),
            ..BridgeConfig::default()
        });

        let params: CreateObjectParams = serde_json::from_value(json!({
            "doc_name": "Doc",
            "obj_type": "Part::Box",
            "obj_name": "Box",
        }))
        .expect("params");
        let response = session.create_object(params, Some("claude-desktop")).await;

        assert!(response.failed);
        assert_eq!(response.parts.len(), 1);
        assert!(response
            .status()
            .starts_with("Failed to create object: Failed to connect to FreeCAD"));
        assert!(!session.is_connected().await);
    }
}
