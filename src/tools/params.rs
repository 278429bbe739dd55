use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::common::{ScreenshotRequest, ViewName};
use crate::workflow::DEFAULT_QUESTION;

fn yes() -> bool {
    true
}

fn white() -> String {
    "white".to_string()
}

fn default_question() -> String {
    DEFAULT_QUESTION.to_string()
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub struct CreateDocumentParams {
    /// Name of the document to create.
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub struct CreateObjectParams {
    /// Document to create the object in.
    pub doc_name: String,
    /// Object type, e.g. `Part::Box`, `Part::Cylinder`, `Draft::Circle`,
    /// `PartDesign::Body`, `Fem::ConstraintFixed`.
    pub obj_type: String,
    /// Name of the new object.
    pub obj_name: String,
    /// FEM analysis to add the object to, for `Fem::*` types.
    #[serde(default)]
    pub analysis_name: Option<String>,
    /// Initial properties, e.g. `{"Height": 30, "Placement": {"Base": {"x": 10, "y": 0, "z": 0}}}`.
    #[serde(default)]
    pub obj_properties: Option<Map<String, Value>>,
    /// Attach a screenshot of the active view after the change.
    #[serde(default = "yes")]
    pub capture_screenshot: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub struct EditObjectParams {
    pub doc_name: String,
    pub obj_name: String,
    /// Properties to set on the object.
    pub obj_properties: Map<String, Value>,
    #[serde(default = "yes")]
    pub capture_screenshot: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub struct DeleteObjectParams {
    pub doc_name: String,
    pub obj_name: String,
    #[serde(default = "yes")]
    pub capture_screenshot: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub struct ExecuteCodeParams {
    /// Python code run inside FreeCAD.
    pub code: String,
    #[serde(default = "yes")]
    pub capture_screenshot: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub struct GetViewParams {
    /// Standard view to frame before capturing.
    pub view_name: ViewName,
    /// Width in pixels; the addon default is 400.
    #[serde(default)]
    pub width: Option<u32>,
    /// Height in pixels; the addon default is 300.
    #[serde(default)]
    pub height: Option<u32>,
    /// Object to fit in the view; all objects when omitted.
    #[serde(default)]
    pub focus_object: Option<String>,
    /// Background color, e.g. "white", "black" or "transparent".
    #[serde(default = "white")]
    pub background_color: String,
}

impl GetViewParams {
    pub fn screenshot_request(&self) -> ScreenshotRequest {
        ScreenshotRequest {
            view: self.view_name,
            width: self.width,
            height: self.height,
            focus_object: self.focus_object.clone(),
            background_color: self.background_color.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub struct SnapshotViewParams {
    #[serde(default)]
    pub view_name: ViewName,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Object to zoom to before capturing.
    #[serde(default)]
    pub focus_object: Option<String>,
}

impl SnapshotViewParams {
    pub fn screenshot_request(&self) -> ScreenshotRequest {
        ScreenshotRequest {
            view: self.view_name,
            width: self.width,
            height: self.height,
            focus_object: self.focus_object.clone(),
            ..ScreenshotRequest::default()
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub struct AnalyzeViewParams {
    #[serde(default)]
    pub view_name: ViewName,
    /// What to ask about the capture. Include design context so the analysis
    /// knows what to look for.
    #[serde(default = "default_question")]
    pub question: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub focus_object: Option<String>,
    /// Use the description stored by `snapshot_view` for this view as the
    /// before-state.
    #[serde(default)]
    pub compare_to_snapshot: bool,
}

impl Default for AnalyzeViewParams {
    fn default() -> Self {
        Self {
            view_name: ViewName::default(),
            question: default_question(),
            width: None,
            height: None,
            focus_object: None,
            compare_to_snapshot: false,
        }
    }
}

impl AnalyzeViewParams {
    pub fn screenshot_request(&self) -> ScreenshotRequest {
        ScreenshotRequest {
            view: self.view_name,
            width: self.width,
            height: self.height,
            focus_object: self.focus_object.clone(),
            ..ScreenshotRequest::default()
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub struct InsertPartParams {
    /// Path of the part relative to the parts library root.
    pub relative_path: String,
    #[serde(default)]
    pub capture_screenshot: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub struct GetObjectsParams {
    pub doc_name: String,
    /// Include every property instead of the Name/Label/TypeId/Placement/Shape
    /// summary. Much larger; prefer `get_object` for one object.
    #[serde(default)]
    pub detailed: bool,
    #[serde(default)]
    pub capture_screenshot: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub struct GetObjectParams {
    pub doc_name: String,
    pub obj_name: String,
    #[serde(default)]
    pub capture_screenshot: bool,
}
