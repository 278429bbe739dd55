use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Standard camera presets the remote side can frame before capturing.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
pub enum ViewName {
    #[default]
    Isometric,
    Front,
    Top,
    Right,
    Back,
    Left,
    Bottom,
    Dimetric,
    Trimetric,
}

impl ViewName {
    pub const ALL: [ViewName; 9] = [
        Self::Isometric,
        Self::Front,
        Self::Top,
        Self::Right,
        Self::Back,
        Self::Left,
        Self::Bottom,
        Self::Dimetric,
        Self::Trimetric,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Isometric => "Isometric",
            Self::Front => "Front",
            Self::Top => "Top",
            Self::Right => "Right",
            Self::Back => "Back",
            Self::Left => "Left",
            Self::Bottom => "Bottom",
            Self::Dimetric => "Dimetric",
            Self::Trimetric => "Trimetric",
        }
    }
}

impl std::fmt::Display for ViewName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewName {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|view| view.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                format!(
                    "unknown view `{value}`; expected one of: Isometric, Front, Top, Right, Back, Left, Bottom, Dimetric, Trimetric"
                )
            })
    }
}

/// Payload of the remote `create_object` call.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectSpec {
    pub name: String,
    pub object_type: String,
    pub properties: Map<String, Value>,
    pub analysis: Option<String>,
}

impl ObjectSpec {
    pub fn new(name: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object_type: object_type.into(),
            properties: Map::new(),
            analysis: None,
        }
    }

    pub(crate) fn to_rpc_value(&self) -> Value {
        let mut data = Map::new();
        data.insert("Name".to_string(), Value::from(self.name.clone()));
        data.insert("Type".to_string(), Value::from(self.object_type.clone()));
        data.insert(
            "Properties".to_string(),
            Value::Object(self.properties.clone()),
        );
        data.insert(
            "Analysis".to_string(),
            self.analysis.clone().map_or(Value::Null, Value::from),
        );
        Value::Object(data)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScreenshotRequest {
    pub view: ViewName,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub focus_object: Option<String>,
    pub background_color: String,
}

impl ScreenshotRequest {
    pub fn new(view: ViewName) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }

    pub(crate) fn to_rpc_params(&self) -> Vec<Value> {
        vec![
            Value::from(self.view.as_str()),
            self.width.map_or(Value::Null, Value::from),
            self.height.map_or(Value::Null, Value::from),
            self.focus_object.clone().map_or(Value::Null, Value::from),
            Value::from(self.background_color.clone()),
        ]
    }
}

impl Default for ScreenshotRequest {
    fn default() -> Self {
        Self {
            view: ViewName::Isometric,
            width: None,
            height: None,
            focus_object: None,
            background_color: "white".to_string(),
        }
    }
}

/// View types that cannot export images even though they expose a GUI view.
pub const UNSUPPORTED_VIEW_TYPES: [&str; 3] = [
    "SpreadsheetGui::SheetView",
    "DrawingGui::DrawingView",
    "TechDrawGui::MDIViewPage",
];

pub(crate) const ACTIVE_VIEW_MARKER: &str = "ACTIVE_VIEW|";

/// What the capability probe reported about the GUI's active view.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActiveView {
    Missing,
    View {
        type_name: String,
        can_save_image: bool,
    },
}

impl ActiveView {
    /// Reads the probe line `ACTIVE_VIEW|<type>|<True/False>` (or `ACTIVE_VIEW|<none>`)
    /// out of `execute_code` output.
    pub fn parse_probe_output(output: &str) -> Option<Self> {
        let start = output.find(ACTIVE_VIEW_MARKER)?;
        let line = output[start + ACTIVE_VIEW_MARKER.len()..].lines().next()?;
        let mut fields = line.trim().split('|');
        let type_name = fields.next()?.trim();
        if type_name == "<none>" {
            return Some(Self::Missing);
        }

        let can_save_image = fields
            .next()
            .map(|flag| flag.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Some(Self::View {
            type_name: type_name.to_string(),
            can_save_image,
        })
    }

    pub fn supports_screenshots(&self) -> bool {
        match self {
            Self::Missing => false,
            Self::View {
                type_name,
                can_save_image,
            } => *can_save_image && !is_unsupported_view_type(type_name),
        }
    }
}

fn is_unsupported_view_type(type_name: &str) -> bool {
    let short_name = type_name.rsplit("::").next().unwrap_or(type_name);
    UNSUPPORTED_VIEW_TYPES.iter().any(|unsupported| {
        *unsupported == type_name || unsupported.rsplit("::").next() == Some(short_name)
    })
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UnavailableReason {
    NoActiveView,
    UnsupportedView(String),
    ProbeFailed(String),
    CaptureFailed(String),
    Empty,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActiveView => write!(f, "no active view"),
            Self::UnsupportedView(type_name) => {
                write!(f, "view type `{type_name}` does not support screenshots")
            }
            Self::ProbeFailed(reason) => write!(f, "view probe failed: {reason}"),
            Self::CaptureFailed(reason) => write!(f, "capture failed: {reason}"),
            Self::Empty => write!(f, "remote returned no image"),
        }
    }
}

/// Outcome of a screenshot request; capture problems are values, not errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Screenshot {
    /// Base64-encoded image as returned by the remote side.
    Captured(String),
    Unavailable(UnavailableReason),
}

impl Screenshot {
    pub fn image(&self) -> Option<&str> {
        match self {
            Self::Captured(image) => Some(image),
            Self::Unavailable(_) => None,
        }
    }

    pub fn into_image(self) -> Option<String> {
        match self {
            Self::Captured(image) => Some(image),
            Self::Unavailable(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::{ActiveView, ObjectSpec, ScreenshotRequest, ViewName};

    #[test]
    fn view_name_parses_case_insensitively() {
        assert_eq!(ViewName::from_str("top"), Ok(ViewName::Top));
        assert!(ViewName::from_str("Diagonal").is_err());
    }

    #[test]
    fn object_spec_serializes_missing_analysis_as_null() {
        let mut spec = ObjectSpec::new("Box", "Part::Box");
        spec.properties.insert("Length".to_string(), json!(10));

        assert_eq!(
            spec.to_rpc_value(),
            json!({"Name": "Box", "Type": "Part::Box", "Properties": {"Length": 10}, "Analysis": null})
        );
    }

    #[test]
    fn screenshot_request_fills_positional_params() {
        let mut request = ScreenshotRequest::new(ViewName::Top);
        request.width = Some(640);

        assert_eq!(
            request.to_rpc_params(),
            vec![json!("Top"), json!(640), json!(null), json!(null), json!("white")]
        );
    }

    #[test]
    fn probe_output_reports_3d_view_as_supported() {
        let view = ActiveView::parse_probe_output(
            "Python code execution scheduled. \nOutput: ACTIVE_VIEW|Gui::View3DInventor|True\n",
        )
        .expect("probe line should parse");
        assert!(view.supports_screenshots());
    }

    #[test]
    fn probe_output_flags_spreadsheet_and_techdraw_views() {
        for line in [
            "ACTIVE_VIEW|SpreadsheetGui::SheetView|True",
            "ACTIVE_VIEW|MDIViewPage|True",
            "ACTIVE_VIEW|Gui::View3DInventor|False",
            "ACTIVE_VIEW|<none>",
        ] {
            let view = ActiveView::parse_probe_output(line).expect("probe line should parse");
            assert!(!view.supports_screenshots(), "{line} should be unsupported");
        }
    }

    #[test]
    fn probe_output_without_marker_is_none() {
        assert_eq!(ActiveView::parse_probe_output("Output: hello"), None);
    }
}
