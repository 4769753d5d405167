//! CDP Console MCP Server
//!
//! A Model Context Protocol (MCP) server that attaches to a Chromium started
//! with `--remote-debugging-port`, records the console output of its page and
//! serves it to LLMs.
//!
//! Usage:
//!   Add to Claude Desktop config:
//!   ```json
//!   {
//!     "mcpServers": {
//!       "chrome-console": {
//!         "command": "/path/to/cdp-console-mcp",
//!         "args": ["--port", "9222"]
//!       }
//!     }
//!   }
//!   ```

mod cdp;
mod cli;
mod mcp;

use crate::cdp::{ChromiumConnector, ConsoleCapture};
use crate::cli::Cli;
use crate::mcp::protocol::*;
use crate::mcp::ConsoleMcpServer;
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// MCP Server state
struct ServerState {
    server: ConsoleMcpServer,
    initialized: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr; stdout carries JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Starting CDP Console MCP Server v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.capture_config();
    let port = config.port;
    let capture = Arc::new(ConsoleCapture::new(config, Arc::new(ChromiumConnector::new())));

    if let Err(e) = capture.attach(port).await {
        error!("Could not attach to the browser on debug port {}: {}", port, e);
        return Err(e).with_context(|| format!("browser debug port {} unreachable", port));
    }

    let state = RwLock::new(ServerState {
        server: ConsoleMcpServer::new(Arc::clone(&capture)),
        initialized: false,
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!("CDP Console MCP Server ready, listening on stdin");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Error reading from stdin: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        debug!("Received: {}", line);

        if let Some(reply) = process_line(&state, &line).await? {
            debug!("Sending: {}", reply);
            stdout.write_all(reply.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    info!("CDP Console MCP Server shutting down");
    capture.detach().await;
    Ok(())
}

/// Turn one input line into the serialized reply, if any
async fn process_line(state: &RwLock<ServerState>, line: &str) -> Result<Option<String>> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            error!("Failed to parse request: {}", e);
            let error_resp = JsonRpcErrorResponse::new(None, JsonRpcError::parse_error());
            return Ok(Some(serde_json::to_string(&error_resp)?));
        }
    };

    let method = request.method.clone();
    let id = request.id.clone();
    let outcome = handle_request(state, request).await;

    let Some(id) = id else {
        // Notification, no response needed
        if let Err(e) = outcome {
            warn!("Notification {} failed: {}", method, e.message);
        }
        return Ok(None);
    };

    let reply = match outcome {
        Ok(result) => serde_json::to_string(&JsonRpcResponse::new(id, result))?,
        Err(e) => {
            error!("Error handling {}: {}", method, e.message);
            serde_json::to_string(&JsonRpcErrorResponse::new(Some(id), e))?
        }
    };
    Ok(Some(reply))
}

/// Handle a JSON-RPC request
async fn handle_request(
    state: &RwLock<ServerState>,
    request: JsonRpcRequest,
) -> Result<serde_json::Value, JsonRpcError> {
    let method = request.method.as_str();

    debug!("Handling method: {}", method);

    match method {
        // MCP Protocol methods
        "initialize" => {
            let mut state = state.write().await;
            state.initialized = true;
            state
                .server
                .handle_initialize(request.params)
                .await
                .map_err(|e| JsonRpcError::internal_error(&e.to_string()))
        }
        "initialized" | "notifications/initialized" => Ok(serde_json::json!({})),
        "ping" => Ok(serde_json::json!({})),
        "tools/list" => {
            let state = state.read().await;
            state
                .server
                .handle_tools_list()
                .await
                .map_err(|e| JsonRpcError::internal_error(&e.to_string()))
        }
        "tools/call" => {
            let state = state.read().await;
            if !state.initialized {
                warn!("tools/call received before initialize");
            }
            state.server.handle_tools_call(request.params).await
        }
        "resources/list" => Ok(serde_json::json!({"resources": []})),
        "prompts/list" => Ok(serde_json::json!({"prompts": []})),
        // Acknowledge but ignore
        "logging/setLevel" => Ok(serde_json::json!({})),
        _ => {
            warn!("Unknown method: {}", method);
            Err(JsonRpcError::method_not_found(method))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::testing::FakeBrowser;
    use crate::cdp::{CaptureConfig, ConsoleMessage};
    use serde_json::{json, Value};

    async fn state() -> (RwLock<ServerState>, FakeBrowser) {
        let browser = FakeBrowser::new();
        let capture = Arc::new(ConsoleCapture::new(CaptureConfig::default(), browser.connector()));
        capture.attach(9222).await.unwrap();
        let state = RwLock::new(ServerState {
            server: ConsoleMcpServer::new(capture),
            initialized: false,
        });
        (state, browser)
    }

    async fn reply(state: &RwLock<ServerState>, line: &str) -> Option<Value> {
        process_line(state, line)
            .await
            .unwrap()
            .map(|s| serde_json::from_str(&s).unwrap())
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let (state, _) = state().await;
        let resp = reply(
            &state,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"0"}}}"#,
        )
        .await
        .unwrap();

        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(resp["result"]["serverInfo"]["name"], "cdp-console-mcp");
        assert!(state.read().await.initialized);

        let none = reply(&state, r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let (state, browser) = state().await;
        browser.emit(ConsoleMessage::with_values("log", vec![json!("hi")]));
        browser.emit(ConsoleMessage::with_values("error", vec![json!("boom")]));

        let resp = reply(
            &state,
            r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"get_console_log","arguments":{}}}"#,
        )
        .await
        .unwrap();

        assert_eq!(resp["id"], "a");
        let logs: Value = serde_json::from_str(resp["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(logs[0]["text"], "hi");
        assert_eq!(logs[1]["type"], "error");
    }

    #[tokio::test]
    async fn test_parse_error() {
        let (state, _) = state().await;
        let resp = reply(&state, "{not json").await.unwrap();
        assert_eq!(resp["error"]["code"], -32700);
        assert!(resp["id"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_method_keeps_id() {
        let (state, _) = state().await;
        let resp = reply(&state, r#"{"jsonrpc":"2.0","id":9,"method":"sampling/createMessage"}"#)
            .await
            .unwrap();
        assert_eq!(resp["id"], 9);
        assert_eq!(resp["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_unknown_notification_is_silent() {
        let (state, _) = state().await;
        assert!(reply(&state, r#"{"jsonrpc":"2.0","method":"notifications/cancelled"}"#)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let (state, _) = state().await;
        let resp = reply(&state, r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#).await.unwrap();
        assert_eq!(resp["result"], json!({}));
    }
}
