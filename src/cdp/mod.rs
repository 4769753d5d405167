//! Chrome DevTools Protocol console capture

pub mod capture;
pub mod chromium;
pub mod connector;
pub mod discovery;
pub mod error;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use capture::ConsoleCapture;
pub use chromium::ChromiumConnector;
pub use types::*;
