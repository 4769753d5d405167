//! Chromium control channel over chromiumoxide

use crate::cdp::connector::{BrowserConnection, BrowserConnector, ConsoleHandler};
use crate::cdp::error::CaptureError;
use crate::cdp::types::{CallSite, ConsoleArg, ConsoleMessage, DebuggerEndpoint};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::js_protocol::runtime::{
    CallFunctionOnParams, CallFunctionOnReturns, EventConsoleApiCalled, ObjectPreviewSubtype,
    RemoteObject, RemoteObjectSubtype, RemoteObjectType,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reads the receiver back out as JSON
const RETURN_SELF: &str = "function() { return this; }";

const PAGE_POLL_ATTEMPTS: usize = 5;
const PAGE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Connector that attaches to an existing Chromium via its WebSocket debugger URL
#[derive(Debug, Default, Clone)]
pub struct ChromiumConnector;

impl ChromiumConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserConnector for ChromiumConnector {
    async fn connect(
        &self,
        endpoint: &DebuggerEndpoint,
        handler: ConsoleHandler,
    ) -> Result<Box<dyn BrowserConnection>, CaptureError> {
        info!("Connecting to {}", endpoint.websocket_url);

        let (mut browser, mut events) = Browser::connect(endpoint.websocket_url.clone())
            .await
            .map_err(|e| CaptureError::Protocol(format!("WebSocket handshake failed: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
            debug!("CDP handler stream ended");
        });

        match open_page(&mut browser, endpoint).await {
            Ok(page) => {
                let page_url = page.url().await.ok().flatten();
                let console_task = spawn_console_listener(page, handler).await;
                match console_task {
                    Ok(console_task) => {
                        info!("Listening for console output on {}", page_url.as_deref().unwrap_or("page"));
                        Ok(Box::new(ChromiumConnection {
                            _browser: browser,
                            page_url,
                            handler_task,
                            console_task,
                        }))
                    }
                    Err(e) => {
                        handler_task.abort();
                        Err(e)
                    }
                }
            }
            Err(e) => {
                handler_task.abort();
                Err(e)
            }
        }
    }
}

/// First page listed by `/json/list`, any other open page, or a fresh blank page
async fn open_page(browser: &mut Browser, endpoint: &DebuggerEndpoint) -> Result<Page, CaptureError> {
    let targets = browser.fetch_targets().await?;
    debug!("Browser reports {} target(s)", targets.len());

    let preferred = endpoint.pages.first().map(|p| p.id.as_str());
    let mut fallback = None;

    // Existing targets are attached by the handler in the background
    for _ in 0..PAGE_POLL_ATTEMPTS {
        let pages = browser.pages().await?;
        if let Some(page) = choose_page(pages, preferred, page_id) {
            if preferred.map_or(true, |id| page_id(&page) == id) {
                return Ok(page);
            }
            fallback = Some(page);
        }
        tokio::time::sleep(PAGE_POLL_INTERVAL).await;
    }

    if let Some(page) = fallback {
        warn!("First listed page is not attachable, using {}", page_id(&page));
        return Ok(page);
    }

    info!("No open page found, creating one");
    Ok(browser.new_page("about:blank").await?)
}

fn page_id(page: &Page) -> &str {
    page.target_id().inner()
}

/// The page whose id is `preferred`, otherwise the first one.
/// The browser hands pages back in no particular order.
fn choose_page<T>(pages: Vec<T>, preferred: Option<&str>, id_of: impl Fn(&T) -> &str) -> Option<T> {
    let position = preferred
        .and_then(|id| pages.iter().position(|p| id_of(p) == id))
        .unwrap_or(0);
    pages.into_iter().nth(position)
}

/// Register the console listener and pump its events into `handler`
async fn spawn_console_listener(
    page: Page,
    handler: ConsoleHandler,
) -> Result<JoinHandle<()>, CaptureError> {
    let mut console_events = page.event_listener::<EventConsoleApiCalled>().await?;

    Ok(tokio::spawn(async move {
        while let Some(event) = console_events.next().await {
            // Arguments are resolved here, so the handler only sees plain values
            let message = normalize_event(&page, &event).await;
            handler(message);
        }
        debug!("Console event stream ended");
    }))
}

async fn normalize_event(page: &Page, event: &EventConsoleApiCalled) -> ConsoleMessage {
    let mut args = Vec::with_capacity(event.args.len());
    for arg in &event.args {
        let value = resolve_arg(page, arg).await;
        args.push(ConsoleArg::new(value, render_arg(arg)));
    }

    let call_site = event
        .stack_trace
        .as_ref()
        .and_then(|trace| trace.call_frames.first())
        .map(|frame| CallSite {
            url: frame.url.clone(),
            line_number: frame.line_number,
            column_number: frame.column_number,
        });

    ConsoleMessage {
        kind: event.r#type.as_ref().to_string(),
        args,
        call_site,
    }
}

/// JSON value of an argument, fetching object contents by reference when needed
async fn resolve_arg(page: &Page, arg: &RemoteObject) -> Value {
    if let Some(value) = inline_value(arg) {
        return value;
    }

    let Some(object_id) = arg.object_id.clone() else {
        return description_value(arg);
    };

    let params = match CallFunctionOnParams::builder()
        .function_declaration(RETURN_SELF)
        .object_id(object_id)
        .return_by_value(true)
        .build()
    {
        Ok(params) => params,
        Err(e) => {
            warn!("Failed to build Runtime.callFunctionOn: {}", e);
            return description_value(arg);
        }
    };

    match page.execute(params).await {
        Ok(response) => value_by_reference(arg, Some(&response.result)),
        Err(e) => {
            debug!("Could not read console argument by value: {}", e);
            value_by_reference(arg, None)
        }
    }
}

/// Value read back through `Runtime.callFunctionOn`; `None` when the call failed
fn value_by_reference(arg: &RemoteObject, returned: Option<&CallFunctionOnReturns>) -> Value {
    match returned {
        Some(returns) if returns.exception_details.is_none() => returns
            .result
            .value
            .clone()
            .unwrap_or_else(|| description_value(arg)),
        _ => description_value(arg),
    }
}

/// Value carried in the event itself, without a round trip
fn inline_value(arg: &RemoteObject) -> Option<Value> {
    if let Some(value) = &arg.value {
        return Some(value.clone());
    }
    if let Some(unserializable) = &arg.unserializable_value {
        return Some(Value::String(unserializable.inner().clone()));
    }
    if matches!(arg.r#type, RemoteObjectType::Undefined) || is_null(arg) {
        return Some(Value::Null);
    }
    None
}

/// `null` arrives as an object with subtype null and no value
fn is_null(arg: &RemoteObject) -> bool {
    matches!(arg.subtype, Some(RemoteObjectSubtype::Null))
}

fn description_value(arg: &RemoteObject) -> Value {
    arg.description
        .clone()
        .map(Value::String)
        .unwrap_or(Value::Null)
}

/// How an argument reads in the rendered message text
pub(crate) fn render_arg(arg: &RemoteObject) -> String {
    if let Some(value) = &arg.value {
        return match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }

    if let Some(unserializable) = &arg.unserializable_value {
        return unserializable.inner().clone();
    }

    if let Some(preview) = &arg.preview {
        let is_array = matches!(preview.subtype, Some(ObjectPreviewSubtype::Array));
        let props: Vec<String> = preview
            .properties
            .iter()
            .map(|p| {
                let val = p.value.as_deref().unwrap_or("…");
                if is_array {
                    val.to_string()
                } else {
                    format!("{}: {}", p.name, val)
                }
            })
            .collect();

        let overflow = if preview.overflow { ", …" } else { "" };
        return if is_array {
            format!("[{}{}]", props.join(", "), overflow)
        } else {
            format!("{{{}{}}}", props.join(", "), overflow)
        };
    }

    if let Some(description) = &arg.description {
        return description.clone();
    }

    if matches!(arg.r#type, RemoteObjectType::Undefined) {
        return "undefined".to_string();
    }

    if is_null(arg) {
        return "null".to_string();
    }

    format!("{:?}", arg.r#type).to_lowercase()
}

/// Live connection to one page of an existing browser
struct ChromiumConnection {
    // Holding the browser keeps the command channel open
    _browser: Browser,
    page_url: Option<String>,
    handler_task: JoinHandle<()>,
    console_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserConnection for ChromiumConnection {
    fn page_url(&self) -> Option<&str> {
        self.page_url.as_deref()
    }

    async fn close(&mut self) {
        self.console_task.abort();
        self.handler_task.abort();
        info!("Detached from browser");
    }
}

impl Drop for ChromiumConnection {
    fn drop(&mut self) {
        self.console_task.abort();
        self.handler_task.abort();
    }
}
