#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use freecad_mcp_rs::envelope::{decode_call, encode_fault, encode_response};
use freecad_mcp_rs::{
    serialize_object, AnalysisError, AnalysisRequest, BridgeConfig, BridgeSession, DocumentObject,
    NativeValue, Placement, Rotation, Serializable, ShapeFacts, Vector3, ViewObject,
    VisualAnalyzer,
};
use serde_json::{json, Map, Value};

/// Base64 of a tiny stand-in image payload.
pub const FAKE_IMAGE_B64: &str = "UklGRhYAAABXRUJQVlA4IAoAAAAQAAAAAAAAAAAA";

pub const VIEW_3D: &str = "View3DInventor";
pub const VIEW_SPREADSHEET: &str = "SpreadsheetGui::SheetView";
pub const VIEW_TECHDRAW: &str = "MDIViewPage";
pub const NO_VIEW: &str = "<none>";

#[derive(Debug)]
struct BoxShape {
    length: f64,
    width: f64,
    height: f64,
}

impl ShapeFacts for BoxShape {
    fn volume(&self) -> Result<f64, String> {
        Ok(self.length * self.width * self.height)
    }

    fn area(&self) -> Result<f64, String> {
        Ok(2.0 * (self.length * self.width + self.length * self.height + self.width * self.height))
    }

    fn vertex_count(&self) -> Result<usize, String> {
        Ok(8)
    }

    fn edge_count(&self) -> Result<usize, String> {
        Ok(12)
    }

    fn face_count(&self) -> Result<usize, String> {
        Ok(6)
    }
}

#[derive(Debug)]
struct FakeObject {
    name: String,
    type_id: String,
    properties: BTreeMap<String, NativeValue>,
    shape_color: Option<NativeValue>,
    shape: Option<BoxShape>,
}

impl FakeObject {
    fn new(name: &str, type_id: &str) -> Self {
        let mut object = Self {
            name: name.to_string(),
            type_id: type_id.to_string(),
            properties: BTreeMap::new(),
            shape_color: None,
            shape: None,
        };
        object
            .properties
            .insert("Label".to_string(), NativeValue::from(name));
        object.refresh_shape();
        object
    }

    fn apply(&mut self, properties: &Map<String, Value>) {
        for (key, value) in properties {
            if key == "ViewObject" {
                self.shape_color = value.get("ShapeColor").map(native_from_json);
                continue;
            }
            self.properties.insert(key.clone(), native_from_json(value));
        }
        self.refresh_shape();
    }

    fn dimension(&self, key: &str) -> f64 {
        match self.properties.get(key) {
            Some(NativeValue::Int(value)) => *value as f64,
            Some(NativeValue::Float(value)) => *value,
            _ => 10.0,
        }
    }

    fn refresh_shape(&mut self) {
        self.shape = (self.type_id == "Part::Box").then(|| BoxShape {
            length: self.dimension("Length"),
            width: self.dimension("Width"),
            height: self.dimension("Height"),
        });
    }
}

impl DocumentObject for FakeObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        match self.properties.get("Label") {
            Some(NativeValue::Str(label)) => label,
            _ => &self.name,
        }
    }

    fn type_id(&self) -> &str {
        &self.type_id
    }

    fn placement(&self) -> Option<Placement> {
        match self.properties.get("Placement") {
            Some(NativeValue::Placement(placement)) => Some(*placement),
            _ => Some(Placement::default()),
        }
    }

    fn shape(&self) -> Option<&dyn ShapeFacts> {
        self.shape.as_ref().map(|shape| shape as &dyn ShapeFacts)
    }

    fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.properties.keys().cloned().collect();
        if self.shape.is_some() {
            names.push("Shape".to_string());
        }
        names
    }

    fn read_property(&self, name: &str) -> Result<NativeValue, String> {
        if name == "Shape" {
            return Ok(NativeValue::other("<Solid object>"));
        }
        self.properties
            .get(name)
            .cloned()
            .ok_or_else(|| format!("'{}' object has no attribute '{name}'", self.type_id))
    }

    fn view_object(&self) -> Option<ViewObject> {
        Some(ViewObject {
            visibility: true,
            shape_color: self.shape_color.clone(),
            transparency: Some(0),
        })
    }
}

fn native_from_json(value: &Value) -> NativeValue {
    match value {
        Value::Null => NativeValue::Null,
        Value::Bool(flag) => NativeValue::Bool(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(int) => NativeValue::Int(int),
            None => NativeValue::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(text) => NativeValue::Str(text.clone()),
        Value::Array(items) => NativeValue::List(items.iter().map(native_from_json).collect()),
        Value::Object(map) => {
            if let Some(base) = map.get("Base").and_then(vector_from_json) {
                let rotation = map.get("Rotation");
                let axis = rotation
                    .and_then(|rotation| rotation.get("Axis"))
                    .and_then(vector_from_json)
                    .unwrap_or(Vector3::new(0.0, 0.0, 1.0));
                let angle = rotation
                    .and_then(|rotation| rotation.get("Angle"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                return NativeValue::Placement(Placement {
                    base,
                    rotation: Rotation { axis, angle },
                });
            }
            match vector_from_json(value) {
                Some(vector) => NativeValue::Vector(vector),
                None => NativeValue::other(value),
            }
        }
    }
}

fn vector_from_json(value: &Value) -> Option<Vector3> {
    Some(Vector3::new(
        value.get("x")?.as_f64()?,
        value.get("y")?.as_f64()?,
        value.get("z")?.as_f64()?,
    ))
}

#[derive(Debug, Default)]
struct FakeDocument {
    objects: Vec<FakeObject>,
}

#[derive(Debug)]
struct FakeState {
    calls: Vec<String>,
    documents: BTreeMap<String, FakeDocument>,
    active_view: String,
    can_save_image: bool,
    screenshot: Option<String>,
    parts: Vec<String>,
    ping: bool,
    http_failure: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            documents: BTreeMap::new(),
            active_view: VIEW_3D.to_string(),
            can_save_image: true,
            screenshot: Some(FAKE_IMAGE_B64.to_string()),
            parts: Vec::new(),
            ping: true,
            http_failure: false,
        }
    }
}

type Shared = Arc<Mutex<FakeState>>;

/// In-process stand-in for the FreeCAD addon's XML-RPC server.
pub struct FakeFreeCad {
    addr: SocketAddr,
    state: Shared,
}

impl FakeFreeCad {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));
        let app = Router::new()
            .route("/RPC2", post(rpc))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake FreeCAD");
        let addr = listener.local_addr().expect("fake FreeCAD address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake FreeCAD server");
        });

        Self { addr, state }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn config(&self) -> BridgeConfig {
        BridgeConfig {
            host: "127.0.0.1".to_string(),
            port: self.port(),
            timeout: Duration::from_secs(5),
            ..BridgeConfig::default()
        }
    }

    pub fn client_builder(&self) -> freecad_mcp_rs::ClientBuilder {
        self.config().client_builder()
    }

    pub fn session(&self, analyzer: Arc<dyn VisualAnalyzer>) -> BridgeSession {
        BridgeSession::with_analyzer(self.config(), analyzer)
    }

    pub fn text_only_session(&self, analyzer: Arc<dyn VisualAnalyzer>) -> BridgeSession {
        BridgeSession::with_analyzer(
            BridgeConfig {
                only_text_feedback: true,
                ..self.config()
            },
            analyzer,
        )
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().expect("fake state");
        f(&mut state)
    }

    pub fn set_active_view(&self, type_name: &str) {
        self.with_state(|state| state.active_view = type_name.to_string());
    }

    pub fn set_can_save_image(&self, can_save_image: bool) {
        self.with_state(|state| state.can_save_image = can_save_image);
    }

    pub fn set_screenshot(&self, screenshot: Option<&str>) {
        self.with_state(|state| state.screenshot = screenshot.map(str::to_string));
    }

    pub fn set_parts(&self, parts: &[&str]) {
        self.with_state(|state| state.parts = parts.iter().map(|part| part.to_string()).collect());
    }

    pub fn set_ping(&self, ping: bool) {
        self.with_state(|state| state.ping = ping);
    }

    pub fn set_http_failure(&self, http_failure: bool) {
        self.with_state(|state| state.http_failure = http_failure);
    }

    pub fn add_document(&self, name: &str) {
        self.with_state(|state| {
            state.documents.entry(name.to_string()).or_default();
        });
    }

    pub fn add_box(&self, doc: &str, name: &str, properties: Value) {
        self.with_state(|state| {
            let document = state.documents.entry(doc.to_string()).or_default();
            let mut object = FakeObject::new(name, "Part::Box");
            if let Value::Object(properties) = properties {
                object.apply(&properties);
            }
            document.objects.push(object);
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.with_state(|state| state.calls.clone())
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.with_state(|state| state.calls.iter().filter(|call| *call == method).count())
    }

    pub fn clear_calls(&self) {
        self.with_state(|state| state.calls.clear());
    }
}

async fn rpc(State(state): State<Shared>, body: String) -> Response {
    let (method, params) = match decode_call(&body) {
        Ok(call) => call,
        Err(err) => return xml(encode_fault(-32700, &err.to_string())),
    };

    let mut state = match state.lock() {
        Ok(state) => state,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };
    state.calls.push(method.clone());
    if state.http_failure {
        return (StatusCode::BAD_GATEWAY, "addon unavailable").into_response();
    }

    match dispatch(&mut state, &method, &params) {
        Ok(value) => xml(encode_response(&value)),
        Err(message) => xml(encode_fault(1, &message)),
    }
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

fn str_param<'a>(params: &'a [Value], index: usize) -> Result<&'a str, String> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("<class 'TypeError'>: missing string argument {index}"))
}

fn missing_document(doc: &str) -> Value {
    json!({"success": false, "error": format!("Document '{doc}' not found")})
}

fn dispatch(state: &mut FakeState, method: &str, params: &[Value]) -> Result<Value, String> {
    match method {
        "ping" => Ok(Value::Bool(state.ping)),
        "create_document" => {
            let name = str_param(params, 0)?;
            state.documents.entry(name.to_string()).or_default();
            Ok(json!({"success": true, "document_name": name}))
        }
        "create_object" => {
            let doc = str_param(params, 0)?;
            let data = params.get(1).cloned().unwrap_or(Value::Null);
            let Some(document) = state.documents.get_mut(doc) else {
                return Ok(missing_document(doc));
            };
            let name = data.get("Name").and_then(Value::as_str).unwrap_or("Unnamed");
            let type_id = data.get("Type").and_then(Value::as_str).unwrap_or("");
            if !type_id.contains("::") {
                return Ok(json!({"success": false, "error": format!("'{type_id}' is not a document object type")}));
            }
            let mut object = FakeObject::new(name, type_id);
            if let Some(Value::Object(properties)) = data.get("Properties") {
                object.apply(properties);
            }
            document.objects.push(object);
            Ok(json!({"success": true, "object_name": name}))
        }
        "edit_object" => {
            let doc = str_param(params, 0)?;
            let name = str_param(params, 1)?;
            let Some(document) = state.documents.get_mut(doc) else {
                return Ok(missing_document(doc));
            };
            let Some(object) = document.objects.iter_mut().find(|object| object.name == name)
            else {
                return Ok(json!({"success": false, "error": format!("Object '{name}' not found in document '{doc}'")}));
            };
            if let Some(Value::Object(properties)) =
                params.get(2).and_then(|data| data.get("Properties"))
            {
                object.apply(properties);
            }
            Ok(json!({"success": true, "object_name": name}))
        }
        "delete_object" => {
            let doc = str_param(params, 0)?;
            let name = str_param(params, 1)?;
            let Some(document) = state.documents.get_mut(doc) else {
                return Ok(missing_document(doc));
            };
            let before = document.objects.len();
            document.objects.retain(|object| object.name != name);
            if document.objects.len() == before {
                return Ok(json!({"success": false, "error": format!("Object '{name}' not found in document '{doc}'")}));
            }
            Ok(json!({"success": true, "object_name": name}))
        }
        "execute_code" => {
            let code = str_param(params, 0)?;
            if code.contains("ACTIVE_VIEW|") {
                let line = if state.active_view == NO_VIEW {
                    "ACTIVE_VIEW|<none>".to_string()
                } else {
                    let flag = if state.can_save_image { "True" } else { "False" };
                    format!("ACTIVE_VIEW|{}|{flag}", state.active_view)
                };
                return Ok(json!({"success": true, "message": format!("Python code execution scheduled. \nOutput: {line}\n")}));
            }
            if code.contains("raise") {
                return Ok(json!({"success": false, "error": "Traceback (most recent call last):\nRuntimeError: boom"}));
            }
            Ok(json!({"success": true, "message": "Python code execution scheduled. \nOutput: "}))
        }
        "get_active_screenshot" => Ok(state
            .screenshot
            .clone()
            .map_or(Value::Null, Value::String)),
        "get_objects" => {
            let doc = str_param(params, 0)?;
            let summary_only = params.get(1).and_then(Value::as_bool).unwrap_or(true);
            let Some(document) = state.documents.get(doc) else {
                return Ok(missing_document(doc));
            };
            let objects = document
                .objects
                .iter()
                .map(|object| object as &dyn DocumentObject)
                .collect();
            Ok(json!({"success": true, "objects": serialize_object(Serializable::Objects(objects), summary_only)}))
        }
        "get_object" => {
            let doc = str_param(params, 0)?;
            let name = str_param(params, 1)?;
            let Some(document) = state.documents.get(doc) else {
                return Ok(missing_document(doc));
            };
            match document.objects.iter().find(|object| object.name == name) {
                Some(object) => Ok(json!({"success": true, "object": serialize_object(Serializable::Object(object), false)})),
                None => Ok(json!({"success": false, "error": format!("Object '{name}' not found in document '{doc}'")})),
            }
        }
        "get_parts_list" => Ok(Value::from(state.parts.clone())),
        "list_documents" => Ok(Value::from(
            state.documents.keys().cloned().collect::<Vec<_>>(),
        )),
        "insert_part_from_library" => {
            let path = str_param(params, 0)?;
            if state.parts.iter().any(|part| part == path) {
                Ok(json!({"success": true, "message": format!("Part {path} inserted from library.")}))
            } else {
                Ok(json!({"success": false, "error": format!("Not found: {path}")}))
            }
        }
        other => Err(format!("method \"{other}\" is not supported")),
    }
}

/// Analyzer double that records every request and answers `analysis #N`.
#[derive(Debug, Default)]
pub struct RecordingAnalyzer {
    unavailable: bool,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl RecordingAnalyzer {
    pub fn missing() -> Self {
        Self {
            unavailable: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().expect("requests").clone()
    }
}

#[async_trait]
impl VisualAnalyzer for RecordingAnalyzer {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn analyze(
        &self,
        _image_b64: &str,
        request: &AnalysisRequest,
    ) -> Result<String, AnalysisError> {
        if self.unavailable {
            return Err(AnalysisError::NotInstalled);
        }
        let mut requests = self.requests.lock().expect("requests");
        requests.push(request.clone());
        Ok(format!("analysis #{}", requests.len()))
    }
}
