// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the broadcast session manager

use crate::backends::capture::TrackKind;
use crate::session::SessionState;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Session-related errors
    Session(SessionError),
    /// Stream directory errors
    Directory(DirectoryError),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
}

/// Why the platform rejected a capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionErrorKind {
    /// The operator (or a policy) refused camera/microphone access
    PermissionDenied,
    /// No matching capture device is connected
    DeviceNotFound,
    /// The device exists but another application holds it
    DeviceBusy,
    /// No device mode satisfies the requested constraints
    OverConstrained,
    /// Anything the platform does not classify
    Unknown,
}

impl AcquisitionErrorKind {
    /// Every kind, for iteration in tests and tooling
    pub const ALL: [AcquisitionErrorKind; 5] = [
        AcquisitionErrorKind::PermissionDenied,
        AcquisitionErrorKind::DeviceNotFound,
        AcquisitionErrorKind::DeviceBusy,
        AcquisitionErrorKind::OverConstrained,
        AcquisitionErrorKind::Unknown,
    ];
}

impl fmt::Display for AcquisitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionErrorKind::PermissionDenied => write!(f, "permission denied"),
            AcquisitionErrorKind::DeviceNotFound => write!(f, "device not found"),
            AcquisitionErrorKind::DeviceBusy => write!(f, "device busy"),
            AcquisitionErrorKind::OverConstrained => write!(f, "over-constrained"),
            AcquisitionErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A rejected device-capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionError {
    pub kind: AcquisitionErrorKind,
    pub message: String,
}

impl AcquisitionError {
    pub fn new(kind: AcquisitionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(AcquisitionErrorKind::Unknown, message)
    }

    /// Operator-facing explanation, keyed by error kind
    ///
    /// Over-constrained failures are framed as a quality problem: by the time
    /// one reaches the operator the cascade has already tried looser tiers.
    pub fn user_message(&self) -> String {
        match self.kind {
            AcquisitionErrorKind::PermissionDenied => {
                "Camera/microphone access was denied. Allow access in your browser or system settings and try again.".to_string()
            }
            AcquisitionErrorKind::DeviceNotFound => {
                "No camera or microphone was found. Check that your device is connected.".to_string()
            }
            AcquisitionErrorKind::DeviceBusy => {
                "Camera/microphone is already in use by another application. Close it and try again.".to_string()
            }
            AcquisitionErrorKind::OverConstrained => {
                "Your camera could not satisfy any supported quality setting. A lower quality may be needed.".to_string()
            }
            AcquisitionErrorKind::Unknown if !self.message.is_empty() => self.message.clone(),
            AcquisitionErrorKind::Unknown => {
                "Please check your camera permissions and try again.".to_string()
            }
        }
    }
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capture request failed ({}): {}", self.kind, self.message)
    }
}

/// Session-level errors
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Every constraint tier was rejected; carries the first tier's error
    Acquisition(AcquisitionError),
    /// The targeted sub-resource was never captured
    SubresourceUnavailable(TrackKind),
    /// A toggle for this kind is already in flight
    Busy(TrackKind),
    /// Rejected because an acquisition is already in flight
    Reentrant {
        operation: &'static str,
        state: SessionState,
    },
    /// Operation is not valid from the current state
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },
    /// The session moved on (ended or replaced the resource) while this
    /// operation was suspended; anything it acquired has been released
    Superseded,
    /// Going live requires a title
    MissingTitle,
    /// Chat messages must contain non-whitespace text
    EmptyMessage,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Acquisition(e) => write!(f, "{}", e),
            SessionError::SubresourceUnavailable(kind) => {
                write!(f, "No {} track was captured for this session", kind)
            }
            SessionError::Busy(kind) => write!(f, "A {} toggle is already in progress", kind),
            SessionError::Reentrant { operation, state } => {
                write!(f, "Cannot {} while {}: acquisition in flight", operation, state)
            }
            SessionError::InvalidTransition { operation, state } => {
                write!(f, "Cannot {} from state {}", operation, state)
            }
            SessionError::Superseded => {
                write!(f, "Session changed while the operation was pending")
            }
            SessionError::MissingTitle => write!(f, "Please enter a title for your live stream"),
            SessionError::EmptyMessage => write!(f, "Chat message is empty"),
        }
    }
}

/// Stream directory errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// A required record field was blank
    MissingField(&'static str),
    /// URL is not a recognised stream platform
    UnsupportedUrl(String),
    /// No record with this id
    NotFound(String),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::MissingField(field) => write!(f, "{} is required", field),
            DirectoryError::UnsupportedUrl(url) => write!(
                f,
                "Unsupported URL format: {}. Please use YouTube or Twitch URLs.",
                url
            ),
            DirectoryError::NotFound(id) => write!(f, "Stream {} not found", id),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Session(e) => write!(f, "Session error: {}", e),
            AppError::Directory(e) => write!(f, "Directory error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for AcquisitionError {}
impl std::error::Error for SessionError {}
impl std::error::Error for DirectoryError {}

impl From<AcquisitionError> for SessionError {
    fn from(err: AcquisitionError) -> Self {
        SessionError::Acquisition(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        AppError::Directory(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_operator_text() {
        for kind in AcquisitionErrorKind::ALL {
            let err = AcquisitionError::new(kind, "");
            assert!(!err.user_message().is_empty(), "{:?} has no text", kind);
        }
    }

    #[test]
    fn over_constrained_is_framed_as_quality() {
        let err = AcquisitionError::new(AcquisitionErrorKind::OverConstrained, "width");
        assert!(err.user_message().contains("lower quality"));
    }

    #[test]
    fn unknown_passes_platform_message_through() {
        let err = AcquisitionError::unknown("getUserMedia is not supported");
        assert_eq!(err.user_message(), "getUserMedia is not supported");
    }
}
