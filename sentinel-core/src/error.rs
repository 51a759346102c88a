//! Error types for dhcp-sentinel

use thiserror::Error;

/// Result type alias for sentinel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dhcp-sentinel
///
/// Startup variants (`Configuration`, `CaptureOpen`, `Authentication`) abort
/// the process before any task is spawned. `InterfaceNotFound` comes from
/// interface lookups; the capture layer reports it as `CaptureOpen`.
/// `ProbeTransmit` and `Notify` are fatal at runtime and cancel the engine.
/// `FrameAnomaly` is only ever logged.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing flags, environment or derived settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Capture handle could not be opened or the filter was rejected
    #[error("Failed to open capture: {0}")]
    CaptureOpen(String),

    /// Notification service rejected our credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A captured frame could not be classified
    #[error("Frame anomaly: {0}")]
    FrameAnomaly(String),

    /// Packet construction error
    #[error("Packet construction error: {0}")]
    PacketConstruction(String),

    /// Packet parsing error
    #[error("Packet parsing error: {0}")]
    PacketParsing(String),

    /// Probe could not be built or sent
    #[error("Probe transmission failed: {0}")]
    ProbeTransmit(String),

    /// Notification could not be delivered
    #[error("Notification failed: {0}")]
    Notify(String),

    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error with a custom message
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a probe transmission error with a custom message
    pub fn probe_transmit<S: Into<String>>(msg: S) -> Self {
        Error::ProbeTransmit(msg.into())
    }

    /// Create a notification error with a custom message
    pub fn notify<S: Into<String>>(msg: S) -> Self {
        Error::Notify(msg.into())
    }

    /// Name of the component this error originates from, for log context
    pub fn component(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "config",
            Error::InterfaceNotFound(_) | Error::CaptureOpen(_) => "capture",
            Error::Authentication(_) | Error::Notify(_) => "notifier",
            Error::FrameAnomaly(_) => "classifier",
            Error::PacketConstruction(_) | Error::PacketParsing(_) | Error::ProbeTransmit(_) => {
                "prober"
            }
            Error::Io(_) => "io",
        }
    }
}
