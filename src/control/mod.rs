//! Command surface exposed over the Model Context Protocol.
//!
//! Requests arrive as JSON-RPC 2.0 messages on stdio and each tool maps onto
//! one operation of the provisioner or the preview server.

pub mod dispatcher;
pub mod protocol;
pub mod transport;
pub mod validation;

pub use dispatcher::CommandDispatcher;
pub use protocol::{JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use transport::StdioTransport;
pub use validation::{validate_tool_call, Tool};
