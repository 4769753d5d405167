//! MCP Tool Definitions for Console Capture

use serde::{Deserialize, Serialize};

pub const GET_CONSOLE_LOG: &str = "get_console_log";
pub const CLEAR_CONSOLE_LOG: &str = "clear_console_log";
pub const CONSOLE_STATUS: &str = "console_status";

/// MCP Tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Tool: Read captured console output
pub fn tool_get_console_log() -> ToolDefinition {
    ToolDefinition {
        name: GET_CONSOLE_LOG.to_string(),
        description: "Get the console log of the current browser page. Returns every captured message in arrival order with its type, text, arguments and source location.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "description": "Only return messages of this console type (e.g. log, error, warning, info, debug)"
                }
            },
            "required": []
        }),
    }
}

/// Tool: Clear captured console output
pub fn tool_clear_console_log() -> ToolDefinition {
    ToolDefinition {
        name: CLEAR_CONSOLE_LOG.to_string(),
        description: "Discard all console messages captured so far. Capturing continues.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
    }
}

/// Tool: Capture status
pub fn tool_console_status() -> ToolDefinition {
    ToolDefinition {
        name: CONSOLE_STATUS.to_string(),
        description: "Get the console capture status: attach state, debugger endpoint, page URL and number of captured messages.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
    }
}

/// Get all available tools
pub fn get_all_tools() -> Vec<ToolDefinition> {
    vec![
        tool_get_console_log(),
        tool_clear_console_log(),
        tool_console_status(),
    ]
}
