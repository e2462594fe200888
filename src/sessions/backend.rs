//! Session backend abstraction
//!
//! The platform-specific surface is deliberately small: list the audio
//! sessions currently alive and set the volume of one of them. Caching,
//! lookup and staleness all live in the directory on top.

use std::fmt;

use crate::error::SessionError;

/// Identifier of one OS audio session instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An audio session owned by a running application
#[derive(Debug, Clone)]
pub struct AudioSession {
    pub id: SessionId,
    pub process_id: u32,
    /// Lower-cased process image name, e.g. `spotify.exe`
    pub process_name: String,
    /// Human-readable name for pickers; falls back to the process name
    pub display_name: String,
}

/// Platform access to the audio session enumeration
pub trait SessionBackend: Send + Sync {
    /// List the sessions alive on the default render endpoint
    fn enumerate(&self) -> Result<Vec<AudioSession>, SessionError>;

    /// Set one session's volume scalar, `[0.0, 1.0]`
    fn set_volume(&self, id: &SessionId, volume: f32) -> Result<(), SessionError>;
}

/// Backend that sees no sessions
///
/// Stand-in on platforms without a real session backend; the pipeline
/// runs, channels just never resolve.
#[derive(Debug, Default)]
pub struct NullBackend;

impl SessionBackend for NullBackend {
    fn enumerate(&self) -> Result<Vec<AudioSession>, SessionError> {
        Ok(Vec::new())
    }

    fn set_volume(&self, id: &SessionId, _volume: f32) -> Result<(), SessionError> {
        Err(SessionError::NotFound(id.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_backend_is_empty() {
        let backend = NullBackend;
        assert!(backend.enumerate().unwrap().is_empty());
        assert!(backend.set_volume(&SessionId::new("x"), 0.5).is_err());
    }
}
