//! MCP Server Handler Implementation
//!
//! Exposes a [`ConsoleCapture`] to tool callers. Holds no logs of its own.

use crate::cdp::ConsoleCapture;
use crate::mcp::protocol::*;
use crate::mcp::tools::{get_all_tools, CLEAR_CONSOLE_LOG, CONSOLE_STATUS, GET_CONSOLE_LOG};
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

type ToolArgs = Option<serde_json::Map<String, serde_json::Value>>;

/// Console MCP Server
pub struct ConsoleMcpServer {
    capture: Arc<ConsoleCapture>,
}

impl ConsoleMcpServer {
    pub fn new(capture: Arc<ConsoleCapture>) -> Self {
        Self { capture }
    }

    /// Get server info
    pub fn get_info(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                ..Default::default()
            },
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Captures the console output of a Chromium page attached over the DevTools protocol.\n\n\
                 Use 'get_console_log' to read captured messages (optionally filtered by 'type'), \
                 'clear_console_log' to start over, and 'console_status' to inspect the connection."
                    .to_string(),
            ),
        }
    }

    /// Handle initialize request
    pub async fn handle_initialize(&self, _params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let info = self.get_info();
        Ok(serde_json::to_value(info)?)
    }

    /// Handle tools/list request
    pub async fn handle_tools_list(&self) -> Result<serde_json::Value> {
        let tools: Vec<Tool> = get_all_tools()
            .into_iter()
            .map(|t| Tool {
                name: t.name,
                description: Some(t.description),
                input_schema: t.input_schema,
            })
            .collect();

        let result = ListToolsResult {
            tools,
            next_cursor: None,
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle tools/call request
    pub async fn handle_tools_call(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let params = params.ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
        let request: CallToolRequest =
            serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?;

        debug!("Calling tool: {}", request.name);

        let result = match request.name.as_str() {
            GET_CONSOLE_LOG => self.handle_get_console_log(request.arguments),
            CLEAR_CONSOLE_LOG => self.handle_clear_console_log(),
            CONSOLE_STATUS => self.handle_console_status().await,
            _ => Ok(CallToolResult::error_text(format!("Unknown tool: {}", request.name))),
        };

        let result = result.unwrap_or_else(|e| CallToolResult::error_text(e.to_string()));
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    // ========================================================================
    // Tool Handlers
    // ========================================================================

    fn handle_get_console_log(&self, args: ToolArgs) -> Result<CallToolResult> {
        let kind = match args.as_ref().and_then(|a| a.get("type")) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) if s.is_empty() => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Ok(CallToolResult::error_text(format!(
                    "'type' must be a string, got {}",
                    other
                )))
            }
        };

        let logs = self.capture.get_logs(kind.as_deref())?;

        debug!("Returning {} console entries", logs.len());
        Ok(CallToolResult::text(serde_json::to_string_pretty(&logs)?))
    }

    fn handle_clear_console_log(&self) -> Result<CallToolResult> {
        let removed = self.capture.clear()?;
        Ok(CallToolResult::text(format!("Cleared {} console messages.", removed)))
    }

    async fn handle_console_status(&self) -> Result<CallToolResult> {
        let status = self.capture.status().await;
        Ok(CallToolResult::text(serde_json::to_string_pretty(&status)?))
    }
}
