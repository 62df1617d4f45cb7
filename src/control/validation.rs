use serde_json::Value;

use crate::utils::error::ChartsError;

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tool {
    /// `get_supported_charts_libs`
    ListLibraries,
    /// `initialize_wk`
    InitializeWorkspace { chart_lib_id: String },
    /// `get_wk_path`
    GetWorkspacePath,
    /// `refresh`
    Refresh,
    /// `get_server_status`
    ServerStatus,
    /// `stop_server`
    StopServer,
}

impl Tool {
    pub const LIST_LIBRARIES: &'static str = "get_supported_charts_libs";
    pub const INITIALIZE_WORKSPACE: &'static str = "initialize_wk";
    pub const GET_WORKSPACE_PATH: &'static str = "get_wk_path";
    pub const REFRESH: &'static str = "refresh";
    pub const SERVER_STATUS: &'static str = "get_server_status";
    pub const STOP_SERVER: &'static str = "stop_server";

    pub fn name(&self) -> &'static str {
        match self {
            Tool::ListLibraries => Self::LIST_LIBRARIES,
            Tool::InitializeWorkspace { .. } => Self::INITIALIZE_WORKSPACE,
            Tool::GetWorkspacePath => Self::GET_WORKSPACE_PATH,
            Tool::Refresh => Self::REFRESH,
            Tool::ServerStatus => Self::SERVER_STATUS,
            Tool::StopServer => Self::STOP_SERVER,
        }
    }
}

/// Validates a tool name and its arguments.
///
/// # Returns
///
/// * `Ok(Tool)` for a known tool with acceptable arguments.
/// * `Err(ChartsError::UnknownTool)` for an unrecognized name.
/// * `Err(ChartsError::ValidationError)` if `initialize_wk` lacks a non-empty `chart_lib_id`.
pub fn validate_tool_call(name: &str, arguments: Option<&Value>) -> Result<Tool, ChartsError> {
    match name {
        Tool::LIST_LIBRARIES => Ok(Tool::ListLibraries),
        Tool::INITIALIZE_WORKSPACE => {
            let chart_lib_id = arguments
                .and_then(|args| args.get("chart_lib_id"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ChartsError::ValidationError("chart_lib_id is required".into()))?;
            Ok(Tool::InitializeWorkspace {
                chart_lib_id: chart_lib_id.to_string(),
            })
        }
        Tool::GET_WORKSPACE_PATH => Ok(Tool::GetWorkspacePath),
        Tool::REFRESH => Ok(Tool::Refresh),
        Tool::SERVER_STATUS => Ok(Tool::ServerStatus),
        Tool::STOP_SERVER => Ok(Tool::StopServer),
        other => Err(ChartsError::UnknownTool(other.to_string())),
    }
}
