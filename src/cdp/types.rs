//! Console Capture Type Definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Source position of a console message
///
/// Every field is always serialized; absent values show up as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub url: Option<String>,
    pub line_number: Option<i64>,
    pub column_number: Option<i64>,
}

/// One captured console message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub args: Vec<Value>,
    pub location: Location,
}

impl LogEntry {
    /// Line written to the operator diagnostic stream
    pub fn diagnostic_line(&self) -> String {
        format!("[{}] {}", self.kind.to_uppercase(), self.text)
    }
}

/// A console argument after its value has been resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleArg {
    /// JSON value of the argument
    pub value: Value,
    /// How the argument reads in the message text
    pub rendered: String,
}

impl ConsoleArg {
    pub fn new(value: Value, rendered: impl Into<String>) -> Self {
        Self {
            value,
            rendered: rendered.into(),
        }
    }

    /// Build an argument whose text form is derived from the value itself
    #[cfg(test)]
    pub fn from_value(value: Value) -> Self {
        let rendered = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self { value, rendered }
    }
}

/// Innermost call frame reported with a console message
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub url: String,
    pub line_number: i64,
    pub column_number: i64,
}

/// Console event as delivered by the browser connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleMessage {
    pub kind: String,
    pub args: Vec<ConsoleArg>,
    pub call_site: Option<CallSite>,
}

#[cfg(test)]
impl ConsoleMessage {
    /// Message whose arguments are plain JSON values
    pub fn with_values(kind: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            kind: kind.into(),
            args: values.into_iter().map(ConsoleArg::from_value).collect(),
            call_site: None,
        }
    }
}

impl From<ConsoleMessage> for LogEntry {
    fn from(message: ConsoleMessage) -> Self {
        let text = message
            .args
            .iter()
            .map(|arg| arg.rendered.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let location = match message.call_site {
            Some(site) => Location {
                url: Some(site.url).filter(|u| !u.is_empty()),
                line_number: Some(site.line_number),
                column_number: Some(site.column_number),
            },
            None => Location::default(),
        };

        LogEntry {
            kind: message.kind,
            text,
            args: message.args.into_iter().map(|arg| arg.value).collect(),
            location,
        }
    }
}

/// Ordered store of captured entries
///
/// Arrival order is preserved. Unbounded unless `max_entries` is set, in
/// which case the oldest entries are evicted first.
#[derive(Debug, Default)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    max_entries: Option<usize>,
}

impl LogBuffer {
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if let Some(max) = self.max_entries {
            if max == 0 {
                return;
            }
            while self.entries.len() >= max {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(entry);
    }

    /// Copy out the entries, optionally only those of one kind
    pub fn snapshot(&self, kind: Option<&str>) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|entry| kind.map_or(true, |k| entry.kind == k))
            .cloned()
            .collect()
    }

    /// Drop every entry, returning how many were removed
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Lifecycle of a capture instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Unattached,
    Attached,
    Detached,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Unattached => "unattached",
            CaptureState::Attached => "attached",
            CaptureState::Detached => "detached",
        };
        f.write_str(name)
    }
}

/// Page target listed by `/json/list`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTarget {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_socket_debugger_url: Option<String>,
}

/// Body of `/json/version`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowserVersion {
    #[serde(default, rename = "Browser")]
    pub browser: Option<String>,
    #[serde(default, rename = "Protocol-Version")]
    pub protocol_version: Option<String>,
    #[serde(default, rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: Option<String>,
}

/// Resolved debugger endpoint of a running browser
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebuggerEndpoint {
    pub websocket_url: String,
    pub browser: Option<String>,
    pub protocol_version: Option<String>,
    pub pages: Vec<PageTarget>,
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub host: String,
    pub port: u16,
    pub discovery_timeout: Duration,
    pub max_entries: Option<usize>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9222,
            discovery_timeout: Duration::from_secs(2),
            max_entries: None,
        }
    }
}

impl CaptureConfig {
    /// Base URL of the discovery endpoints for `port`
    pub fn discovery_base(&self, port: u16) -> String {
        format!("http://{}:{}", self.host, port)
    }
}

/// Snapshot of a capture for status reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatus {
    pub state: CaptureState,
    pub endpoint: Option<DebuggerEndpoint>,
    pub page_url: Option<String>,
    pub entries: usize,
    pub max_entries: Option<usize>,
}
