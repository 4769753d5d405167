//! DevTools HTTP discovery
//!
//! Resolves the WebSocket debugger address of a browser started with
//! `--remote-debugging-port` by querying `/json/list` and `/json/version`.

use crate::cdp::error::{error_chain, CaptureError};
use crate::cdp::types::{BrowserVersion, CaptureConfig, DebuggerEndpoint, PageTarget};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// Client for the discovery endpoints of one debug port
pub struct Discovery {
    client: reqwest::Client,
    base_url: String,
}

impl Discovery {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CaptureError::Connection(format!("failed to build HTTP client: {}", error_chain(&e))))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Discovery client for `port` using the host and timeout from `config`
    pub fn for_port(config: &CaptureConfig, port: u16) -> Result<Self, CaptureError> {
        Self::new(config.discovery_base(port), config.discovery_timeout)
    }

    /// Query both endpoints and return the debugger address
    pub async fn discover(&self) -> Result<DebuggerEndpoint, CaptureError> {
        let targets: Vec<PageTarget> = self.get_json("/json/list").await?;
        let pages: Vec<PageTarget> = targets
            .into_iter()
            .filter(|t| t.target_type == "page")
            .collect();
        debug!("{} open page(s) at {}", pages.len(), self.base_url);

        let version: BrowserVersion = self.get_json("/json/version").await?;
        let websocket_url = version
            .web_socket_debugger_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                self.unreachable("the browser did not report a webSocketDebuggerUrl")
            })?;

        info!(
            "Discovered {} at {}",
            version.browser.as_deref().unwrap_or("browser"),
            websocket_url
        );

        Ok(DebuggerEndpoint {
            websocket_url,
            browser: version.browser,
            protocol_version: version.protocol_version,
            pages,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CaptureError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unreachable(&format!("GET {} failed: {}", path, error_chain(&e))))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.unreachable(&format!("GET {} returned HTTP {}", path, status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| self.unreachable(&format!("GET {} returned an unexpected body: {}", path, error_chain(&e))))
    }

    fn unreachable(&self, cause: &str) -> CaptureError {
        CaptureError::Connection(format!(
            "browser debug port at {} is unreachable; make sure Chromium is running with --remote-debugging-port ({})",
            self.base_url, cause
        ))
    }
}
