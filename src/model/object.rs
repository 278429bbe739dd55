use crate::model::value::{NativeValue, Placement};

/// Geometry facts of a shape. Each accessor may fail independently because the
/// kernel computes them lazily.
pub trait ShapeFacts {
    fn volume(&self) -> Result<f64, String>;
    fn area(&self) -> Result<f64, String>;
    fn vertex_count(&self) -> Result<usize, String>;
    fn edge_count(&self) -> Result<usize, String>;
    fn face_count(&self) -> Result<usize, String>;
}

/// Display-provider state attached to an object in the GUI.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewObject {
    pub visibility: bool,
    pub shape_color: Option<NativeValue>,
    pub transparency: Option<i64>,
}

/// Read access to one document object of the CAD object model.
pub trait DocumentObject {
    fn name(&self) -> &str;
    fn label(&self) -> &str;
    fn type_id(&self) -> &str;
    fn placement(&self) -> Option<Placement>;
    fn shape(&self) -> Option<&dyn ShapeFacts>;
    fn property_names(&self) -> Vec<String>;
    fn read_property(&self, name: &str) -> Result<NativeValue, String>;
    fn view_object(&self) -> Option<ViewObject>;
}

pub trait CadDocument {
    fn name(&self) -> &str;
    fn label(&self) -> &str;
    fn file_name(&self) -> &str;
    fn objects(&self) -> Vec<&dyn DocumentObject>;
}
