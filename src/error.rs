//! Error types for the fader bridge

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serial transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    #[error("Serial stream closed")]
    Closed,

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Reader is already running")]
    AlreadyRunning,
}

/// Audio session subsystem errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session enumeration failed: {0}")]
    EnumerationFailed(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Failed to set volume for {id}: {reason}")]
    VolumeSetFailed { id: String, reason: String },

    #[error("COM error: {0}")]
    Com(String),
}

/// Channel registry errors
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel index out of range: {0}")]
    OutOfRange(usize),

    #[error("No active audio session matches '{0}'")]
    NoMatchingSessions(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
