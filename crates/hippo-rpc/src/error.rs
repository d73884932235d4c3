//! Transport-level errors and their mapping onto hippo error codes.

use async_tungstenite::tungstenite::Error as WsError;
use hippo_types::{ErrorKind, Facility, HippoError};

use crate::transport::MAX_MESSAGE_SIZE;

/// Errors raised below the JSON-RPC layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("connecting to {0} timed out")]
    ConnectTimeout(String),

    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("Connection closed")]
    Closed,
}

impl TransportError {
    /// Error kind reported to callers for this failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Connect { .. } => ErrorKind::Open,
            TransportError::ConnectTimeout(_) => ErrorKind::Timeout,
            TransportError::Ws(_) | TransportError::Closed => ErrorKind::Write,
            TransportError::MessageTooLarge(_) => ErrorKind::InvalidParam,
            TransportError::Json(_) | TransportError::Utf8(_) => ErrorKind::MessageError,
        }
    }

    #[must_use]
    pub fn into_error(self, facility: Facility) -> HippoError {
        HippoError::new(facility, self.kind()).with_message(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_maps_to_open() {
        let err = TransportError::Connect {
            url: "ws://localhost:1/".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("connection refused"));

        let hippo = err.into_error(Facility::TouchMat);
        assert_eq!(hippo.kind(), Some(ErrorKind::Open));
        assert_eq!(hippo.facility(), Some(Facility::TouchMat));
        assert!(hippo.message().contains("ws://localhost:1/"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            TransportError::ConnectTimeout("x".to_string()).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(TransportError::Closed.kind(), ErrorKind::Write);
        assert_eq!(
            TransportError::MessageTooLarge(usize::MAX).kind(),
            ErrorKind::InvalidParam
        );

        let json_err = serde_json::from_str::<serde_json::Value>("}{").unwrap_err();
        assert_eq!(TransportError::Json(json_err).kind(), ErrorKind::MessageError);
    }

    #[test]
    fn test_display() {
        assert_eq!(TransportError::Closed.to_string(), "Connection closed");
        assert!(
            TransportError::MessageTooLarge(50_000_000)
                .to_string()
                .contains("50000000")
        );
    }
}
