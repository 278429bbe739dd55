use serde_json::{json, Map, Number, Value};

use crate::model::object::{CadDocument, DocumentObject, ShapeFacts, ViewObject};
use crate::model::value::{NativeValue, Vector3};

/// Properties never dumped in full mode: geometry payloads, dependency lists and
/// expression bindings. Shape facts are reported separately as scalars.
pub const SKIPPED_PROPERTIES: [&str; 6] = [
    "Shape",
    "ExpressionEngine",
    "OutList",
    "InList",
    "Mesh",
    "Points",
];

pub const MAX_STRING_LEN: usize = 200;
pub const TRUNCATION_MARKER: &str = "…";

/// What [`serialize_object`] can be pointed at.
pub enum Serializable<'a> {
    Object(&'a dyn DocumentObject),
    Objects(Vec<&'a dyn DocumentObject>),
    Document(&'a dyn CadDocument),
}

pub fn serialize_value(value: &NativeValue) -> Value {
    match value {
        NativeValue::Null => Value::Null,
        NativeValue::Int(int) => Value::from(*int),
        NativeValue::Float(float) => float_value(*float),
        NativeValue::Str(text) => Value::String(text.clone()),
        NativeValue::Bool(flag) => Value::Bool(*flag),
        NativeValue::Vector(vector) => vector_value(vector),
        NativeValue::Rotation(rotation) => json!({
            "Axis": vector_value(&rotation.axis),
            "Angle": float_value(rotation.angle),
        }),
        NativeValue::Placement(placement) => json!({
            "Base": serialize_value(&NativeValue::Vector(placement.base)),
            "Rotation": serialize_value(&NativeValue::Rotation(placement.rotation)),
        }),
        NativeValue::List(items) => Value::Array(items.iter().map(serialize_value).collect()),
        NativeValue::Color(channels) => {
            Value::Array(channels.iter().copied().map(float_value).collect())
        }
        NativeValue::Object(reference) => json!({
            "Name": reference.name,
            "Label": reference.label,
        }),
        NativeValue::Other(display) => Value::String(truncate_display(display)),
    }
}

pub fn serialize_object(target: Serializable<'_>, summary_only: bool) -> Value {
    match target {
        Serializable::Object(object) => serialize_single(object, summary_only),
        Serializable::Objects(objects) => Value::Array(
            objects
                .into_iter()
                .map(|object| serialize_single(object, summary_only))
                .collect(),
        ),
        Serializable::Document(document) => json!({
            "Name": document.name(),
            "Label": document.label(),
            "FileName": document.file_name(),
            "Objects": document
                .objects()
                .into_iter()
                .map(|object| serialize_single(object, summary_only))
                .collect::<Vec<_>>(),
        }),
    }
}

pub fn serialize_shape(shape: Option<&dyn ShapeFacts>) -> Value {
    let Some(shape) = shape else {
        return Value::Null;
    };

    match shape_metrics(shape) {
        Ok(metrics) => metrics,
        Err(reason) => json!({ "error": reason }),
    }
}

pub fn serialize_view_object(view: &ViewObject) -> Value {
    let mut result = Map::new();
    result.insert("Visibility".to_string(), Value::Bool(view.visibility));
    if let Some(color) = view.shape_color.as_ref() {
        result.insert("ShapeColor".to_string(), serialize_value(color));
    }
    if let Some(transparency) = view.transparency {
        result.insert("Transparency".to_string(), Value::from(transparency));
    }
    Value::Object(result)
}

fn serialize_single(object: &dyn DocumentObject, summary_only: bool) -> Value {
    let mut result = Map::new();
    result.insert("Name".to_string(), Value::from(object.name()));
    result.insert("Label".to_string(), Value::from(object.label()));
    result.insert("TypeId".to_string(), Value::from(object.type_id()));
    result.insert(
        "Placement".to_string(),
        object
            .placement()
            .map_or(Value::Null, |placement| {
                serialize_value(&NativeValue::Placement(placement))
            }),
    );
    result.insert("Shape".to_string(), serialize_shape(object.shape()));

    if summary_only {
        return Value::Object(result);
    }

    let mut properties = Map::new();
    for name in object.property_names() {
        if SKIPPED_PROPERTIES.contains(&name.as_str()) {
            continue;
        }
        let value = match object.read_property(&name) {
            Ok(value) => serialize_value(&value),
            Err(reason) => Value::String(format!("<error: {reason}>")),
        };
        properties.insert(name, value);
    }
    result.insert("Properties".to_string(), Value::Object(properties));

    let view = object
        .view_object()
        .map_or_else(|| Value::Object(Map::new()), |view| serialize_view_object(&view));
    result.insert("ViewObject".to_string(), view);

    Value::Object(result)
}

fn shape_metrics(shape: &dyn ShapeFacts) -> Result<Value, String> {
    Ok(json!({
        "Volume": float_value(shape.volume()?),
        "Area": float_value(shape.area()?),
        "VertexCount": shape.vertex_count()?,
        "EdgeCount": shape.edge_count()?,
        "FaceCount": shape.face_count()?,
    }))
}

fn vector_value(vector: &Vector3) -> Value {
    json!({
        "x": float_value(vector.x),
        "y": float_value(vector.y),
        "z": float_value(vector.z),
    })
}

// JSON has no NaN/inf; those keep their string form.
fn float_value(float: f64) -> Value {
    Number::from_f64(float)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(float.to_string()))
}

fn truncate_display(display: &str) -> String {
    match display.char_indices().nth(MAX_STRING_LEN) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &display[..cut]),
        None => display.to_string(),
    }
}
