//! Console capture errors

use crate::cdp::types::CaptureState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Debugger discovery failed, timed out, or returned no usable address
    #[error("{0}")]
    Connection(String),

    /// Operation invoked outside the state it is defined for
    #[error("cannot {operation} while console capture is {state}")]
    InvalidState {
        operation: &'static str,
        state: CaptureState,
    },

    /// Control channel failure after the endpoint was discovered
    #[error("DevTools protocol error: {0}")]
    Protocol(String),
}

impl CaptureError {
    pub fn invalid_state(operation: &'static str, state: CaptureState) -> Self {
        CaptureError::InvalidState { operation, state }
    }
}

impl From<chromiumoxide::error::CdpError> for CaptureError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        CaptureError::Protocol(e.to_string())
    }
}

/// Render an error together with its chain of sources
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_invalid_state_message() {
        let err = CaptureError::invalid_state("read console logs", CaptureState::Unattached);
        assert_eq!(
            err.to_string(),
            "cannot read console logs while console capture is unattached"
        );
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(error_chain(&err), "outer failure: connection refused");
    }
}
