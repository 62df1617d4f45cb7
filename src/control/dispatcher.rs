use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

use crate::control::protocol::{
    JsonRpcRequest, JsonRpcResponse, ToolCallParams, ToolDescriptor, ToolResult,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, MCP_PROTOCOL_VERSION,
};
use crate::control::validation::{validate_tool_call, Tool};
use crate::server::PreviewServer;
use crate::utils::error::ChartsError;
use crate::workspace::WorkspaceProvisioner;

/// Maps MCP requests onto the provisioner and the preview server.
pub struct CommandDispatcher {
    server: Arc<PreviewServer>,
    provisioner: WorkspaceProvisioner,
}

impl CommandDispatcher {
    pub fn new(server: Arc<PreviewServer>, provisioner: WorkspaceProvisioner) -> Self {
        Self {
            server,
            provisioner,
        }
    }

    pub fn server(&self) -> &Arc<PreviewServer> {
        &self.server
    }

    /// Handles one JSON-RPC message. Notifications yield `None`.
    #[instrument(skip(self, request), fields(method = %request.method))]
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!("[MCP] Notification: {}", request.method);
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, initialize_result()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tool_descriptors() })),
            "tools/call" => {
                let params: ToolCallParams = match request
                    .params
                    .map(serde_json::from_value::<ToolCallParams>)
                    .transpose()
                {
                    Ok(Some(params)) => params,
                    Ok(None) => {
                        return Some(JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params"))
                    }
                    Err(e) => {
                        return Some(JsonRpcResponse::error(
                            id,
                            INVALID_PARAMS,
                            format!("Invalid params: {}", e),
                        ))
                    }
                };
                let result = self.call_tool(&params.name, params.arguments.as_ref()).await;
                match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
                }
            }
            other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
        };

        Some(response)
    }

    /// Runs a tool and folds any failure into an `isError` result.
    pub async fn call_tool(&self, name: &str, arguments: Option<&Value>) -> ToolResult {
        let outcome = match validate_tool_call(name, arguments) {
            Ok(tool) => self.execute(tool).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(value) => ToolResult::json(&value, false),
            Err(e) => {
                error!("[MCP] Tool {} failed: {}", name, e);
                ToolResult::json(&error_payload(&e), true)
            }
        }
    }

    /// Executes a validated tool.
    ///
    /// # Errors
    ///
    /// Provisioning and bind failures are returned to the caller unchanged.
    pub async fn execute(&self, tool: Tool) -> Result<Value, ChartsError> {
        info!("[MCP] Running {}", tool.name());

        match tool {
            Tool::ListLibraries => Ok(serde_json::to_value(self.provisioner.list_supported())?),
            Tool::InitializeWorkspace { chart_lib_id } => {
                let workspace = self.provisioner.provision(&chart_lib_id).await?;
                let addr = self.server.start(&workspace).await?;
                let url = format!("http://localhost:{}", addr.port());
                Ok(json!({
                    "success": true,
                    "workspace_path": workspace.display().to_string(),
                    "url": url,
                    "message": format!("Workspace initialized for {}. Open browser at {}", chart_lib_id, url),
                }))
            }
            Tool::GetWorkspacePath => {
                let workspace = self
                    .provisioner
                    .current_workspace()
                    .ok_or(ChartsError::WorkspaceNotInitialized)?;
                Ok(json!({ "workspace_path": workspace.display().to_string() }))
            }
            Tool::Refresh => {
                let clients = self.server.broadcast_reload();
                Ok(json!({
                    "success": true,
                    "message": "Reload signal sent to all connected clients",
                    "clients": clients,
                }))
            }
            Tool::ServerStatus => Ok(serde_json::to_value(self.server.status())?),
            Tool::StopServer => {
                self.server.stop().await;
                Ok(json!({ "success": true, "message": "Server stopped" }))
            }
        }
    }
}

fn error_payload(err: &ChartsError) -> Value {
    match err {
        ChartsError::UnsupportedLibrary { supported, .. } => json!({
            "error": err.to_string(),
            "supported": supported,
        }),
        other => json!({ "error": other.to_string() }),
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: Tool::LIST_LIBRARIES,
            description: "Returns metadata about supported charting libraries with usage instructions",
            input_schema: empty_schema(),
        },
        ToolDescriptor {
            name: Tool::INITIALIZE_WORKSPACE,
            description: "Initialize a workspace for a specific charting library. Creates files and starts HTTP server.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "chart_lib_id": {
                        "type": "string",
                        "description": "ID of the charting library (e.g., \"amcharts\")",
                    }
                },
                "required": ["chart_lib_id"],
            }),
        },
        ToolDescriptor {
            name: Tool::GET_WORKSPACE_PATH,
            description: "Returns the absolute path of the current workspace folder",
            input_schema: empty_schema(),
        },
        ToolDescriptor {
            name: Tool::REFRESH,
            description: "Triggers a reload of the chart viewer in the browser",
            input_schema: empty_schema(),
        },
        ToolDescriptor {
            name: Tool::SERVER_STATUS,
            description: "Reports whether the preview server is running, its URL, connected clients and served workspace",
            input_schema: empty_schema(),
        },
        ToolDescriptor {
            name: Tool::STOP_SERVER,
            description: "Stops the preview server and its file watcher",
            input_schema: empty_schema(),
        },
    ]
}
