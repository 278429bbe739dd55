use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::envelope;
use crate::error::FreeCadError;
use crate::model::common::{
    ActiveView, ObjectSpec, Screenshot, ScreenshotRequest, UnavailableReason, ACTIVE_VIEW_MARKER,
};
use crate::transport::Transport;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9875;
pub const DEFAULT_RPC_PATH: &str = "/RPC2";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

const RPC_PING: &str = "ping";
const RPC_CREATE_DOCUMENT: &str = "create_document";
const RPC_CREATE_OBJECT: &str = "create_object";
const RPC_EDIT_OBJECT: &str = "edit_object";
const RPC_DELETE_OBJECT: &str = "delete_object";
const RPC_EXECUTE_CODE: &str = "execute_code";
const RPC_GET_ACTIVE_SCREENSHOT: &str = "get_active_screenshot";
const RPC_GET_OBJECTS: &str = "get_objects";
const RPC_GET_OBJECT: &str = "get_object";
const RPC_GET_PARTS_LIST: &str = "get_parts_list";
const RPC_LIST_DOCUMENTS: &str = "list_documents";
const RPC_INSERT_PART_FROM_LIBRARY: &str = "insert_part_from_library";

const UNKNOWN_REMOTE_ERROR: &str = "Unknown error";

/// Runs inside FreeCAD and prints one `ACTIVE_VIEW|...` line describing the GUI view.
const VIEW_PROBE_SCRIPT: &str = r#"
import FreeCADGui
_gui_doc = FreeCADGui.ActiveDocument
_view = _gui_doc.ActiveView if _gui_doc else None
if _view is None:
    print("ACTIVE_VIEW|<none>")
else:
    print("ACTIVE_VIEW|%s|%s" % (type(_view).__name__, hasattr(_view, "saveImage")))
"#;

/// Handle to one FreeCAD XML-RPC endpoint. Clones share the same transport worker.
#[derive(Clone, Debug)]
pub struct FreeCadClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    transport: Transport,
    endpoint: String,
    timeout: Duration,
}

#[derive(Clone, Debug)]
struct ClientConfig {
    host: String,
    port: u16,
    rpc_path: String,
    timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                rpc_path: DEFAULT_RPC_PATH.to_string(),
                timeout: DEFAULT_TIMEOUT,
            },
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn rpc_path(mut self, rpc_path: impl Into<String>) -> Self {
        self.config.rpc_path = rpc_path.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        endpoint_url(&self.config.host, self.config.port, &self.config.rpc_path)
    }

    /// Opens the transport and pings the addon. No client is returned unless the
    /// ping answers `true`.
    pub async fn connect(self) -> Result<FreeCadClient, FreeCadError> {
        let endpoint = self.endpoint();
        let timeout = self.config.timeout;
        let transport = Transport::connect(&endpoint, timeout)?;

        let client = FreeCadClient {
            inner: Arc::new(ClientInner {
                transport,
                endpoint: endpoint.clone(),
                timeout,
            }),
        };

        match client.ping().await {
            Ok(true) => {
                tracing::info!(endpoint = %endpoint, "connected to FreeCAD");
                Ok(client)
            }
            Ok(false) => Err(FreeCadError::PingFailed { endpoint }),
            Err(err) => {
                tracing::debug!(endpoint = %endpoint, error = %err, "FreeCAD ping failed");
                Err(FreeCadError::PingFailed { endpoint })
            }
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FreeCadClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub async fn connect() -> Result<Self, FreeCadError> {
        ClientBuilder::new().connect().await
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub async fn ping(&self) -> Result<bool, FreeCadError> {
        let response = self.call(RPC_PING, Vec::new()).await?;
        response
            .as_bool()
            .ok_or_else(|| unexpected(RPC_PING, "expected a boolean"))
    }

    /// Returns the name the remote side gave the new document.
    pub async fn create_document(&self, name: &str) -> Result<String, FreeCadError> {
        let response = self
            .call(RPC_CREATE_DOCUMENT, vec![Value::from(name)])
            .await?;
        success_string(RPC_CREATE_DOCUMENT, response, "document_name")
    }

    pub async fn create_object(
        &self,
        doc_name: &str,
        spec: &ObjectSpec,
    ) -> Result<String, FreeCadError> {
        let response = self
            .call(
                RPC_CREATE_OBJECT,
                vec![Value::from(doc_name), spec.to_rpc_value()],
            )
            .await?;
        success_string(RPC_CREATE_OBJECT, response, "object_name")
    }

    pub async fn edit_object(
        &self,
        doc_name: &str,
        obj_name: &str,
        properties: &Map<String, Value>,
    ) -> Result<String, FreeCadError> {
        let mut data = Map::new();
        data.insert("Properties".to_string(), Value::Object(properties.clone()));

        let response = self
            .call(
                RPC_EDIT_OBJECT,
                vec![
                    Value::from(doc_name),
                    Value::from(obj_name),
                    Value::Object(data),
                ],
            )
            .await?;
        success_string(RPC_EDIT_OBJECT, response, "object_name")
    }

    pub async fn delete_object(
        &self,
        doc_name: &str,
        obj_name: &str,
    ) -> Result<String, FreeCadError> {
        let response = self
            .call(
                RPC_DELETE_OBJECT,
                vec![Value::from(doc_name), Value::from(obj_name)],
            )
            .await?;
        success_string(RPC_DELETE_OBJECT, response, "object_name")
    }

    /// Runs Python inside FreeCAD and returns the addon's message, which embeds
    /// captured stdout.
    pub async fn execute_code(&self, code: &str) -> Result<String, FreeCadError> {
        let response = self
            .call(RPC_EXECUTE_CODE, vec![Value::from(code)])
            .await?;
        success_string(RPC_EXECUTE_CODE, response, "message")
    }

    /// Asks the GUI what its active view is, without capturing anything.
    pub async fn probe_active_view(&self) -> Result<Option<ActiveView>, FreeCadError> {
        let output = self.execute_code(VIEW_PROBE_SCRIPT).await?;
        Ok(ActiveView::parse_probe_output(&output))
    }

    /// Captures the active view. Views that cannot export images short-circuit
    /// before the capture call; every failure becomes [`Screenshot::Unavailable`].
    pub async fn get_active_screenshot(&self, request: &ScreenshotRequest) -> Screenshot {
        let view = match self.probe_active_view().await {
            Ok(Some(view)) => view,
            Ok(None) => {
                return unavailable(UnavailableReason::ProbeFailed(format!(
                    "probe output carried no `{ACTIVE_VIEW_MARKER}` line"
                )));
            }
            Err(err) => return unavailable(UnavailableReason::ProbeFailed(err.to_string())),
        };

        if !view.supports_screenshots() {
            return unavailable(match view {
                ActiveView::Missing => UnavailableReason::NoActiveView,
                ActiveView::View { type_name, .. } => UnavailableReason::UnsupportedView(type_name),
            });
        }

        match self
            .call(RPC_GET_ACTIVE_SCREENSHOT, request.to_rpc_params())
            .await
        {
            Ok(Value::String(image)) if !image.trim().is_empty() => Screenshot::Captured(image),
            Ok(Value::String(_)) | Ok(Value::Null) => unavailable(UnavailableReason::Empty),
            Ok(other) => unavailable(UnavailableReason::CaptureFailed(format!(
                "expected base64 string, got {other}"
            ))),
            Err(err) => unavailable(UnavailableReason::CaptureFailed(err.to_string())),
        }
    }

    /// Serialized objects of `doc_name`, summary or full per object.
    pub async fn get_objects(
        &self,
        doc_name: &str,
        summary_only: bool,
    ) -> Result<Value, FreeCadError> {
        let response = self
            .call(
                RPC_GET_OBJECTS,
                vec![Value::from(doc_name), Value::Bool(summary_only)],
            )
            .await?;
        success_field(RPC_GET_OBJECTS, response, "objects")
    }

    pub async fn get_object(&self, doc_name: &str, obj_name: &str) -> Result<Value, FreeCadError> {
        let response = self
            .call(
                RPC_GET_OBJECT,
                vec![Value::from(doc_name), Value::from(obj_name)],
            )
            .await?;
        success_field(RPC_GET_OBJECT, response, "object")
    }

    pub async fn get_parts_list(&self) -> Result<Vec<String>, FreeCadError> {
        let response = self.call(RPC_GET_PARTS_LIST, Vec::new()).await?;
        string_list(RPC_GET_PARTS_LIST, response)
    }

    pub async fn list_documents(&self) -> Result<Vec<String>, FreeCadError> {
        let response = self.call(RPC_LIST_DOCUMENTS, Vec::new()).await?;
        string_list(RPC_LIST_DOCUMENTS, response)
    }

    pub async fn insert_part_from_library(
        &self,
        relative_path: &str,
    ) -> Result<String, FreeCadError> {
        let response = self
            .call(RPC_INSERT_PART_FROM_LIBRARY, vec![Value::from(relative_path)])
            .await?;
        success_string(RPC_INSERT_PART_FROM_LIBRARY, response, "message")
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, FreeCadError> {
        tracing::debug!(method, "xml-rpc call");
        let body = envelope::encode_call(method, &params);
        let response = self.inner.transport.roundtrip(body).await?;
        envelope::decode_response(&response)
    }
}

fn unavailable(reason: UnavailableReason) -> Screenshot {
    tracing::info!(%reason, "screenshot unavailable");
    Screenshot::Unavailable(reason)
}

fn endpoint_url(host: &str, port: u16, rpc_path: &str) -> String {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };

    let path = rpc_path.trim();
    if path.is_empty() || path.starts_with('/') {
        format!("http://{host}:{port}{path}")
    } else {
        format!("http://{host}:{port}/{path}")
    }
}

fn unexpected(method: &str, reason: impl Into<String>) -> FreeCadError {
    FreeCadError::UnexpectedResponse {
        method: method.to_string(),
        reason: reason.into(),
    }
}

/// Unwraps the addon's `{success, <field>|error}` result convention.
fn success_field(method: &str, response: Value, field: &str) -> Result<Value, FreeCadError> {
    let Value::Object(mut result) = response else {
        return Err(unexpected(method, format!("expected a struct, got {response}")));
    };

    let success = result
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| unexpected(method, "missing `success` flag"))?;

    if !success {
        let message = match result.remove("error") {
            Some(Value::String(message)) => message,
            Some(Value::Null) | None => UNKNOWN_REMOTE_ERROR.to_string(),
            Some(other) => other.to_string(),
        };
        return Err(FreeCadError::Remote { message });
    }

    result
        .remove(field)
        .ok_or_else(|| unexpected(method, format!("missing `{field}` field")))
}

fn success_string(method: &str, response: Value, field: &str) -> Result<String, FreeCadError> {
    match success_field(method, response, field)? {
        Value::String(text) => Ok(text),
        other => Ok(other.to_string()),
    }
}

fn string_list(method: &str, response: Value) -> Result<Vec<String>, FreeCadError> {
    let Value::Array(items) = response else {
        return Err(unexpected(method, format!("expected an array, got {response}")));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(text) => Ok(text),
            other => Err(unexpected(method, format!("expected string items, got {other}"))),
        })
        .collect()
}
