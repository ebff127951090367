//! Error types for bleshock

use thiserror::Error;

/// Result type alias for bleshock operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bleshock
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Too many consecutive undecodable reads: the dongle is not there
    #[error("Dongle not detected ({failures} consecutive undecodable reads)")]
    TransportAbsent { failures: u32 },

    /// A frame could not be written to the dongle
    #[error("Transport send failed: {0}")]
    TransportSend(String),

    /// Serial port could not be opened
    #[error("Failed to open serial port {port}: {reason}")]
    PortOpen { port: String, reason: String },

    /// Timer started while another timer of the same name is active
    #[error("Timer '{0}' is already active")]
    DuplicateTimer(String),

    /// Timer refreshed or looked up while not active
    #[error("Timer '{0}' is not active")]
    UnknownTimer(String),

    /// Frame that the current connection state does not expect
    #[error("Unexpected frame: {0}")]
    UnexpectedFrame(String),

    /// Peer stopped advertising after a reset
    #[error("No advertisement from {peer}; the device may have crashed")]
    LivenessLost { peer: String },

    /// Invalid parameter error
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Bluetooth address could not be parsed
    #[error("Invalid Bluetooth address: {0}")]
    InvalidAddress(String),

    /// Capture file error
    #[error("Packet capture error: {0}")]
    Capture(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Create an invalid parameter error
    pub fn invalid_parameter<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a capture error with a custom message
    pub fn capture<S: Into<String>>(msg: S) -> Self {
        Error::Capture(msg.into())
    }

    /// Create a send failure with a custom message
    pub fn send<S: Into<String>>(msg: S) -> Self {
        Error::TransportSend(msg.into())
    }

    /// Errors that end the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::TransportAbsent { .. })
    }

    /// Errors that are logged and otherwise ignored by the harness
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DuplicateTimer(_)
                | Error::UnknownTimer(_)
                | Error::UnexpectedFrame(_)
                | Error::LivenessLost { .. }
        )
    }

    /// Stable identifier for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Io(_) => "IO",
            Error::TransportAbsent { .. } => "TRANSPORT_ABSENT",
            Error::TransportSend(_) => "TRANSPORT_SEND",
            Error::PortOpen { .. } => "PORT_OPEN",
            Error::DuplicateTimer(_) => "DUPLICATE_TIMER",
            Error::UnknownTimer(_) => "UNKNOWN_TIMER",
            Error::UnexpectedFrame(_) => "UNEXPECTED_FRAME",
            Error::LivenessLost { .. } => "LIVENESS_LOST",
            Error::InvalidParameter { .. } => "INVALID_PARAMETER",
            Error::InvalidAddress(_) => "INVALID_ADDRESS",
            Error::Capture(_) => "CAPTURE",
            Error::NotFound(_) => "NOT_FOUND",
        }
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::Io(kind) => {
                Error::Io(std::io::Error::new(kind, err.description))
            }
            _ => Error::TransportSend(err.description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_absent_is_fatal() {
        assert!(Error::TransportAbsent { failures: 4 }.is_fatal());
        assert!(!Error::send("boom").is_fatal());
        assert!(!Error::LivenessLost {
            peer: "a4:c1:38:d8:ad:a9".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::UnknownTimer("scan_timeout".into()).is_recoverable());
        assert!(Error::DuplicateTimer("scan_timeout".into()).is_recoverable());
        assert!(!Error::TransportAbsent { failures: 4 }.is_recoverable());
        assert!(!Error::invalid_parameter("mtu", "not a number").is_recoverable());
    }

    #[test]
    fn test_messages() {
        let err = Error::TransportAbsent { failures: 4 };
        assert_eq!(err.error_code(), "TRANSPORT_ABSENT");
        assert!(err.to_string().contains("not detected"));

        let err = Error::invalid_parameter("max_key_size", "out of range");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'max_key_size': out of range"
        );
    }
}
