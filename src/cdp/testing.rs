//! In-memory browser for tests

use crate::cdp::connector::{BrowserConnection, BrowserConnector, ConsoleHandler};
use crate::cdp::error::CaptureError;
use crate::cdp::types::{CaptureConfig, ConsoleMessage, DebuggerEndpoint, PageTarget};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Inner {
    handler: Mutex<Option<ConsoleHandler>>,
    connect_failure: Mutex<Option<String>>,
    closed: AtomicUsize,
}

/// Fake browser that lets tests emit console messages to whoever is attached
#[derive(Clone, Default)]
pub struct FakeBrowser {
    inner: Arc<Inner>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn BrowserConnector> {
        Arc::new(self.clone())
    }

    /// Deliver a console message the way the event dispatcher would
    pub fn emit(&self, message: ConsoleMessage) {
        let handler = self.inner.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler(message);
        }
    }

    pub fn fail_next_connect(&self, reason: &str) {
        *self.inner.connect_failure.lock().unwrap() = Some(reason.to_string());
    }

    pub fn closed_connections(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserConnector for FakeBrowser {
    async fn discover(&self, _config: &CaptureConfig, port: u16) -> Result<DebuggerEndpoint, CaptureError> {
        Ok(DebuggerEndpoint {
            websocket_url: "ws://127.0.0.1:9222/devtools/browser/fake".to_string(),
            browser: Some(format!("FakeChrome (port {})", port)),
            protocol_version: Some("1.3".to_string()),
            pages: vec![PageTarget {
                id: "P1".to_string(),
                target_type: "page".to_string(),
                title: "App".to_string(),
                url: "http://localhost:3000/".to_string(),
                web_socket_debugger_url: None,
            }],
        })
    }

    async fn connect(
        &self,
        endpoint: &DebuggerEndpoint,
        handler: ConsoleHandler,
    ) -> Result<Box<dyn BrowserConnection>, CaptureError> {
        if let Some(reason) = self.inner.connect_failure.lock().unwrap().take() {
            return Err(CaptureError::Protocol(reason));
        }
        *self.inner.handler.lock().unwrap() = Some(handler);
        Ok(Box::new(FakeConnection {
            browser: self.clone(),
            page_url: endpoint.pages.first().map(|p| p.url.clone()),
        }))
    }
}

struct FakeConnection {
    browser: FakeBrowser,
    page_url: Option<String>,
}

#[async_trait]
impl BrowserConnection for FakeConnection {
    fn page_url(&self) -> Option<&str> {
        self.page_url.as_deref()
    }

    // The handler stays registered so tests can race late events against detach
    async fn close(&mut self) {
        self.browser.inner.closed.fetch_add(1, Ordering::SeqCst);
    }
}
