/// Request/response models shared by the client and the tool surface.
pub mod common;
/// Object-model traits the value codec reads from.
pub mod object;
/// Native CAD value shapes.
pub mod value;
