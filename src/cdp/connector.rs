//! Browser collaborator seams

use crate::cdp::discovery::Discovery;
use crate::cdp::error::CaptureError;
use crate::cdp::types::{CaptureConfig, ConsoleMessage, DebuggerEndpoint};
use async_trait::async_trait;
use std::sync::Arc;

/// Callback invoked once per console message, in dispatch order.
/// Must not block.
pub type ConsoleHandler = Arc<dyn Fn(ConsoleMessage) + Send + Sync>;

/// Establishes control channels to a running browser
#[async_trait]
pub trait BrowserConnector: Send + Sync {
    /// Resolve the debugger endpoint listening on `port`
    async fn discover(&self, config: &CaptureConfig, port: u16) -> Result<DebuggerEndpoint, CaptureError> {
        Discovery::for_port(config, port)?.discover().await
    }

    /// Open a control channel and start delivering console messages to `handler`
    async fn connect(
        &self,
        endpoint: &DebuggerEndpoint,
        handler: ConsoleHandler,
    ) -> Result<Box<dyn BrowserConnection>, CaptureError>;
}

/// An open control channel with a registered console listener
#[async_trait]
pub trait BrowserConnection: Send {
    /// URL of the page being listened to, when known
    fn page_url(&self) -> Option<&str>;

    /// Stop event delivery and release the channel. The browser keeps running.
    async fn close(&mut self);
}
