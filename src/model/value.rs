#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Axis-angle rotation; `angle` is in radians as the kernel reports it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotation {
    pub axis: Vector3,
    pub angle: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub base: Vector3,
    pub rotation: Rotation,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            base: Vector3::new(0.0, 0.0, 0.0),
            rotation: Rotation {
                axis: Vector3::new(0.0, 0.0, 1.0),
                angle: 0.0,
            },
        }
    }
}

/// Weak reference to another document object.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectRef {
    pub name: String,
    pub label: String,
}

/// Closed set of property value shapes the codec knows how to serialize.
///
/// Anything the object model cannot map onto a structured variant is carried as
/// [`NativeValue::Other`] with its display form.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeValue {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Vector(Vector3),
    Rotation(Rotation),
    Placement(Placement),
    List(Vec<NativeValue>),
    Color(Vec<f64>),
    Object(ObjectRef),
    Other(String),
}

impl NativeValue {
    pub fn other(value: impl std::fmt::Display) -> Self {
        Self::Other(value.to_string())
    }

    pub fn object(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Object(ObjectRef {
            name: name.into(),
            label: label.into(),
        })
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vector3> for NativeValue {
    fn from(value: Vector3) -> Self {
        Self::Vector(value)
    }
}

impl From<Placement> for NativeValue {
    fn from(value: Placement) -> Self {
        Self::Placement(value)
    }
}
