//! # FreeCAD MCP RS
//!
//! **Async bridge between tool-calling LLM agents and a running FreeCAD.**
//! An XML-RPC client for FreeCAD's MCP addon, a bounded JSON codec for document
//! objects, and a Model Context Protocol server (`feature = "server"`) exposing
//! create/inspect/edit/verify tools with visual feedback.
//!
//! ## Quickstart (client)
//!
//! ```no_run
//! use freecad_mcp_rs::{FreeCadClient, ObjectSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), freecad_mcp_rs::FreeCadError> {
//!     let client = FreeCadClient::connect().await?;
//!     client.create_document("Demo").await?;
//!
//!     let mut spec = ObjectSpec::new("Box", "Part::Box");
//!     spec.properties.insert("Length".to_string(), 20.into());
//!     client.create_object("Demo", &spec).await?;
//!
//!     let objects = client.get_objects("Demo", true).await?;
//!     println!("{objects:#}");
//!     Ok(())
//! }
//! ```
//!
//! ## Quickstart (tool surface)
//!
//! ```no_run
//! use freecad_mcp_rs::tools::params::GetObjectsParams;
//! use freecad_mcp_rs::{BridgeConfig, BridgeSession};
//!
//! # async fn run() {
//! let session = BridgeSession::new(BridgeConfig::default());
//! let response = session
//!     .get_objects(
//!         GetObjectsParams {
//!             doc_name: "Demo".to_string(),
//!             detailed: false,
//!             capture_screenshot: false,
//!         },
//!         None,
//!     )
//!     .await;
//! println!("{}", response.status());
//! session.shutdown().await;
//! # }
//! ```
//!
//! Architecture layers:
//! - transport
//! - envelope
//! - client
//! - session and tools
//! - mcp server

/// External visual-analysis adapter.
pub mod analysis;
/// High-level async client, one method per remote capability.
pub mod client;
/// JSON-safe serialization of CAD values and document objects.
pub mod codec;
/// Bridge process configuration and host validation.
pub mod config;
/// Image delivery preference from the MCP client name.
pub mod detect;
/// XML-RPC call/response encoding.
///
/// This is primarily an advanced/internal surface.
pub mod envelope;
/// Error types returned by this crate.
pub mod error;
/// Stable data models used by the client, codec and tools.
pub mod model;
/// Screenshot files for file-path delivery.
pub mod screenshots;
/// Shared per-process bridge state.
pub mod session;
/// Agent-facing tool operations.
pub mod tools;
/// Snapshot store and before/after analysis.
pub mod workflow;

#[cfg(feature = "server")]
/// MCP server exposing the tools over stdio.
pub mod mcp;

mod transport;

pub use crate::analysis::{AnalysisCli, AnalysisError, AnalysisRequest, VisualAnalyzer};
pub use crate::client::{ClientBuilder, FreeCadClient};
pub use crate::codec::{serialize_object, serialize_value, Serializable};
pub use crate::config::BridgeConfig;
pub use crate::detect::{CapabilityDetector, CompatibilityTable, DeliveryMode};
pub use crate::error::FreeCadError;
pub use crate::model::common::{
    ActiveView, ObjectSpec, Screenshot, ScreenshotRequest, UnavailableReason, ViewName,
};
pub use crate::model::object::{CadDocument, DocumentObject, ShapeFacts, ViewObject};
pub use crate::model::value::{NativeValue, ObjectRef, Placement, Rotation, Vector3};
pub use crate::screenshots::ScreenshotSession;
pub use crate::session::BridgeSession;
pub use crate::tools::response::{ResponsePart, ToolResponse};
pub use crate::workflow::{AnalysisOutcome, SnapshotRecord, VisualWorkflow};
