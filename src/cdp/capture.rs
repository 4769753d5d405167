//! Console Capture
//!
//! Attaches to a running browser, records every console message of one page
//! and serves snapshots of what was recorded.
//!
//! Lifecycle is `Unattached -> Attached -> Detached`; a detached instance is
//! terminal. Reads and clears are only valid while attached.

use crate::cdp::connector::{BrowserConnection, BrowserConnector, ConsoleHandler};
use crate::cdp::error::CaptureError;
use crate::cdp::types::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// State shared with the console listener
#[derive(Debug)]
struct Shared {
    state: CaptureState,
    buffer: LogBuffer,
}

struct Session {
    endpoint: DebuggerEndpoint,
    connection: Box<dyn BrowserConnection>,
}

pub struct ConsoleCapture {
    config: CaptureConfig,
    connector: Arc<dyn BrowserConnector>,
    /// Separate lock from the session so the listener never waits on I/O
    shared: Arc<Mutex<Shared>>,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl ConsoleCapture {
    pub fn new(config: CaptureConfig, connector: Arc<dyn BrowserConnector>) -> Self {
        let buffer = LogBuffer::new(config.max_entries);
        Self {
            config,
            connector,
            shared: Arc::new(Mutex::new(Shared {
                state: CaptureState::Unattached,
                buffer,
            })),
            session: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> CaptureState {
        lock(&self.shared).state
    }

    /// Discover the debugger on `port`, connect, and start recording
    ///
    /// On failure the instance stays unattached.
    pub async fn attach(&self, port: u16) -> Result<(), CaptureError> {
        let mut session = self.session.lock().await;

        let state = self.state();
        if state != CaptureState::Unattached {
            return Err(CaptureError::invalid_state("attach", state));
        }

        info!("Attaching to browser debug port {}", port);
        let endpoint = self.connector.discover(&self.config, port).await?;

        let shared = Arc::clone(&self.shared);
        let handler: ConsoleHandler = Arc::new(move |message| Self::on_console_event(&shared, message));
        let connection = self.connector.connect(&endpoint, handler).await?;

        {
            let mut shared = lock(&self.shared);
            shared.buffer.clear();
            shared.state = CaptureState::Attached;
        }

        info!(
            "Console capture attached to {}",
            connection.page_url().unwrap_or(&endpoint.websocket_url)
        );
        *session = Some(Session { endpoint, connection });
        Ok(())
    }

    /// Append one console message. Runs on the listener task.
    fn on_console_event(shared: &Mutex<Shared>, message: ConsoleMessage) {
        let entry = LogEntry::from(message);
        let line = entry.diagnostic_line();
        {
            let mut shared = lock(shared);
            if shared.state != CaptureState::Attached {
                debug!("Dropping console message received while {}", shared.state);
                return;
            }
            shared.buffer.push(entry);
        }
        // Subscriber output happens outside the buffer lock
        info!(target: "console", "{}", line);
    }

    /// Snapshot of recorded entries, optionally only those of `kind`
    pub fn get_logs(&self, kind: Option<&str>) -> Result<Vec<LogEntry>, CaptureError> {
        let shared = lock(&self.shared);
        if shared.state != CaptureState::Attached {
            return Err(CaptureError::invalid_state("read console logs", shared.state));
        }
        Ok(shared.buffer.snapshot(kind))
    }

    /// Drop every recorded entry, returning how many were removed
    pub fn clear(&self) -> Result<usize, CaptureError> {
        let mut shared = lock(&self.shared);
        if shared.state != CaptureState::Attached {
            return Err(CaptureError::invalid_state("clear console logs", shared.state));
        }
        let removed = shared.buffer.clear();
        debug!("Cleared {} console entries", removed);
        Ok(removed)
    }

    /// Release the connection. Calling it when not attached is a no-op.
    pub async fn detach(&self) {
        let mut session = self.session.lock().await;
        let Some(mut active) = session.take() else {
            return;
        };

        lock(&self.shared).state = CaptureState::Detached;
        active.connection.close().await;
        info!("Console capture detached from {}", active.endpoint.websocket_url);
    }

    pub async fn status(&self) -> CaptureStatus {
        let session = self.session.lock().await;
        let shared = lock(&self.shared);
        CaptureStatus {
            state: shared.state,
            endpoint: session.as_ref().map(|s| s.endpoint.clone()),
            page_url: session
                .as_ref()
                .and_then(|s| s.connection.page_url().map(str::to_string)),
            entries: shared.buffer.len(),
            max_entries: self.config.max_entries,
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
