use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

use crate::control::dispatcher::CommandDispatcher;
use crate::control::protocol::{JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, PARSE_ERROR};
use crate::utils::error::ChartsError;

/// Newline-delimited JSON-RPC over stdin/stdout.
pub struct StdioTransport;

impl StdioTransport {
    /// Serves requests from the process's stdin until it is closed.
    pub async fn run(dispatcher: &CommandDispatcher) -> Result<(), ChartsError> {
        serve(dispatcher, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
    }
}

/// Reads one request per line from `reader` and writes one response per line to `writer`.
///
/// Blank lines are skipped. A panic while handling a request is reported as an
/// internal error and the loop keeps going.
///
/// # Errors
/// Returns `ChartsError::Io` if reading or writing the transport fails.
pub async fn serve<R, W>(dispatcher: &CommandDispatcher, reader: R, mut writer: W) -> Result<(), ChartsError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => {
                let id = request.id.clone().unwrap_or(Value::Null);
                match AssertUnwindSafe(dispatcher.handle_request(request))
                    .catch_unwind()
                    .await
                {
                    Ok(response) => response,
                    Err(_) => {
                        error!("[MCP] Request handler panicked");
                        Some(JsonRpcResponse::error(id, INTERNAL_ERROR, "Internal error"))
                    }
                }
            }
            Err(e) => {
                warn!("[MCP] Unparsable message: {}", e);
                Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        };

        if let Some(response) = response {
            let mut encoded = serde_json::to_vec(&response)?;
            encoded.push(b'\n');
            writer.write_all(&encoded).await?;
            writer.flush().await?;
        }
    }

    info!("[MCP] Input closed");
    Ok(())
}
