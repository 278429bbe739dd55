use std::sync::Arc;

use rmcp::handler::server::router::prompt::PromptRouter;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, GetPromptRequestParams, GetPromptResult, ListPromptsResult,
    PaginatedRequestParams, PromptMessage, PromptMessageRole, ServerCapabilities, ServerInfo,
};
use rmcp::service::{Peer, RequestContext, RoleServer};
use rmcp::{
    prompt, prompt_handler, prompt_router, tool, tool_handler, tool_router, ErrorData,
    ServerHandler, ServiceExt,
};

use crate::session::BridgeSession;
use crate::tools::params::{
    AnalyzeViewParams, CreateDocumentParams, CreateObjectParams, DeleteObjectParams,
    EditObjectParams, ExecuteCodeParams, GetObjectParams, GetObjectsParams, GetViewParams,
    InsertPartParams, SnapshotViewParams,
};
use crate::tools::response::{ResponsePart, ToolResponse};

pub const ASSET_CREATION_STRATEGY: &str = "\
FreeCAD integration through the Model Context Protocol.

Asset creation strategy:

0. Before starting any task, use get_objects to confirm the current state of the document.
1. Use the parts library: check available parts with get_parts_list and insert matching parts with insert_part_from_library.
2. If no suitable part exists, create basic shapes (boxes, cylinders, spheres) with create_object and refine their properties with edit_object.
3. Give objects clear, descriptive names.
4. Set position, scale and rotation of created or inserted objects explicitly with edit_object.
5. After editing an object, verify the applied properties with get_object.
6. Use execute_code for detailed customization or operations the other tools cannot express.

Fall back to basic creation only when the part is not in the library, a basic shape is explicitly requested, or the shape needs custom scripting.

For visual verification, call snapshot_view before a change and analyze_view with compare_to_snapshot=true after it.";

#[derive(Clone)]
pub struct FreeCadMcp {
    session: Arc<BridgeSession>,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

#[tool_router]
impl FreeCadMcp {
    pub fn new(session: Arc<BridgeSession>) -> Self {
        Self {
            session,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    pub fn session(&self) -> &Arc<BridgeSession> {
        &self.session
    }

    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    #[tool(description = "Create a new document in FreeCAD.")]
    async fn create_document(
        &self,
        Parameters(params): Parameters<CreateDocumentParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(call_result(self.session.create_document(params).await))
    }

    #[tool(
        description = "Create a new object in FreeCAD. Object types start with \"Part::\", \"Draft::\", \"PartDesign::\" or \"Fem::\". Properties such as Placement ({\"Base\": {\"x\",\"y\",\"z\"}, \"Rotation\": {\"Axis\": {...}, \"Angle\"}}) and ViewObject ({\"ShapeColor\": [r, g, b, a]}) may be set at creation. FEM constraints, materials and meshes take `analysis_name`. Returns the outcome and a screenshot of the active view."
    )]
    async fn create_object(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<CreateObjectParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = client_name(&peer);
        Ok(call_result(
            self.session.create_object(params, client.as_deref()).await,
        ))
    }

    #[tool(
        description = "Edit properties of an existing object in FreeCAD. Returns the outcome and a screenshot of the active view."
    )]
    async fn edit_object(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<EditObjectParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = client_name(&peer);
        Ok(call_result(
            self.session.edit_object(params, client.as_deref()).await,
        ))
    }

    #[tool(
        description = "Delete an object from a FreeCAD document. Returns the outcome and a screenshot of the active view."
    )]
    async fn delete_object(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<DeleteObjectParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = client_name(&peer);
        Ok(call_result(
            self.session.delete_object(params, client.as_deref()).await,
        ))
    }

    #[tool(
        description = "Execute arbitrary Python code inside FreeCAD, for anything the other tools cannot do. Returns the captured output and a screenshot of the active view."
    )]
    async fn execute_code(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<ExecuteCodeParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = client_name(&peer);
        Ok(call_result(
            self.session.execute_code(params, client.as_deref()).await,
        ))
    }

    #[tool(
        description = "Get a screenshot of the active view, framed as one of the standard views: Isometric, Front, Top, Right, Back, Left, Bottom, Dimetric, Trimetric."
    )]
    async fn get_view(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<GetViewParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = client_name(&peer);
        Ok(call_result(self.session.get_view(params, client.as_deref()).await))
    }

    #[tool(
        description = "Store a snapshot of the current view for a later before/after comparison with analyze_view. Runs a pre-analysis when the visual analysis CLI is installed."
    )]
    async fn snapshot_view(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<SnapshotViewParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = client_name(&peer);
        Ok(call_result(
            self.session.snapshot_view(params, client.as_deref()).await,
        ))
    }

    #[tool(
        description = "Capture a view and analyze it visually. Always returns the screenshot; adds a textual analysis when the visual analysis CLI is installed. With compare_to_snapshot=true the description stored by snapshot_view for the same view is used as the before-state."
    )]
    async fn analyze_view(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<AnalyzeViewParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = client_name(&peer);
        Ok(call_result(
            self.session.analyze_view(params, client.as_deref()).await,
        ))
    }

    #[tool(description = "Insert a part from the parts library addon.")]
    async fn insert_part_from_library(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<InsertPartParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = client_name(&peer);
        Ok(call_result(
            self.session
                .insert_part_from_library(params, client.as_deref())
                .await,
        ))
    }

    #[tool(
        description = "Get all objects in a document. Returns a compact summary (Name, Label, TypeId, Placement, Shape) per object; pass detailed=true to include every property."
    )]
    async fn get_objects(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<GetObjectsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = client_name(&peer);
        Ok(call_result(
            self.session.get_objects(params, client.as_deref()).await,
        ))
    }

    #[tool(description = "Get one object of a document with all of its properties.")]
    async fn get_object(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<GetObjectParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = client_name(&peer);
        Ok(call_result(
            self.session.get_object(params, client.as_deref()).await,
        ))
    }

    #[tool(description = "Get the list of parts in the parts library addon.")]
    async fn get_parts_list(&self) -> Result<CallToolResult, ErrorData> {
        Ok(call_result(self.session.get_parts_list().await))
    }

    #[tool(description = "Get the list of open documents in FreeCAD.")]
    async fn list_documents(&self) -> Result<CallToolResult, ErrorData> {
        Ok(call_result(self.session.list_documents().await))
    }
}

#[prompt_router]
impl FreeCadMcp {
    #[prompt(
        name = "asset_creation_strategy",
        description = "Guidelines for creating and verifying assets in FreeCAD through these tools."
    )]
    async fn asset_creation_strategy(&self) -> Vec<PromptMessage> {
        vec![PromptMessage::new_text(
            PromptMessageRole::User,
            ASSET_CREATION_STRATEGY,
        )]
    }
}

#[tool_handler]
#[prompt_handler]
impl ServerHandler for FreeCadMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(ASSET_CREATION_STRATEGY.into()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            ..Default::default()
        }
    }
}

fn client_name(peer: &Peer<RoleServer>) -> Option<String> {
    peer.peer_info()
        .map(|info| info.client_info.name.clone())
}

fn call_result(response: ToolResponse) -> CallToolResult {
    let content = response
        .parts
        .into_iter()
        .map(|part| match part {
            ResponsePart::Text(text) => Content::text(text),
            ResponsePart::Image { data, mime_type } => Content::image(data, mime_type),
        })
        .collect();

    if response.failed {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}
