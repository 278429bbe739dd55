use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FreeCadError {
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("connection failed for `{endpoint}`: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("Failed to connect to FreeCAD at `{endpoint}`. Make sure the FreeCAD addon RPC server is running.")]
    PingFailed { endpoint: String },

    #[error("transport send failed: {reason}")]
    TransportSend { reason: String },

    #[error("transport receive failed: {reason}")]
    TransportReceive { reason: String },

    #[error("transport task is unavailable")]
    TransportClosed,

    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("RPC endpoint answered with HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("XML-RPC decode failed: {0}")]
    XmlRpcDecode(String),

    #[error("unexpected `{method}` response: {reason}")]
    UnexpectedResponse { method: String, reason: String },

    /// The remote call ran and reported `success: false`; `message` is its error verbatim.
    #[error("{message}")]
    Remote { message: String },

    #[error("base64 decode failed: {0}")]
    Base64Decode(String),

    #[error("I/O error on `{path}`: {reason}")]
    Io { path: String, reason: String },

    #[error("mutex poisoned")]
    InternalPoisoned,
}

impl FreeCadError {
    /// True when the failure happened below the XML-RPC layer, meaning the cached
    /// connection should not be trusted for the next call.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::PingFailed { .. }
                | Self::TransportSend { .. }
                | Self::TransportReceive { .. }
                | Self::TransportClosed
                | Self::Timeout { .. }
                | Self::HttpStatus { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::FreeCadError;

    #[test]
    fn remote_error_displays_message_verbatim() {
        let err = FreeCadError::Remote {
            message: "Document 'Missing' not found".to_string(),
        };
        assert_eq!(err.to_string(), "Document 'Missing' not found");
        assert!(!err.is_connection_error());
    }

    #[test]
    fn transport_failures_are_connection_errors() {
        assert!(FreeCadError::TransportClosed.is_connection_error());
        assert!(FreeCadError::PingFailed {
            endpoint: "http://localhost:9875/RPC2".to_string(),
        }
        .is_connection_error());
        assert!(!FreeCadError::Fault {
            code: 1,
            message: "boom".to_string(),
        }
        .is_connection_error());
    }
}
