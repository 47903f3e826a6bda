//! Error types for the glowup-core library.
//!
//! This module provides granular error variants for different failure modes,
//! enabling precise error handling and user-friendly error messages.

use thiserror::Error;

/// Errors that can occur within the glowup-core library.
///
/// Each variant represents a specific failure mode with contextual information
/// to help diagnose and handle errors appropriately.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (missing keys, invalid values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Camera access was denied by the platform or the user.
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    /// Camera stream or frame acquisition failed.
    #[error("Camera capture failed: {0}")]
    CameraCapture(String),

    /// An uploaded file exceeds the size ceiling.
    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    /// An uploaded payload could not be decoded as an image.
    #[error("Image decoding failed: {0}")]
    ImageDecode(String),

    /// The pipeline was started without a captured source image.
    #[error("No source image has been captured or uploaded")]
    NoSourceImage,

    /// Network, auth or other transport failure talking to the Gemini API.
    #[error("Gemini API error: {0}")]
    Transport(String),

    /// The synthesis response contained no inline image part.
    #[error("The model returned no generated image")]
    NoImageGenerated,

    /// A response could not be parsed into the expected structure.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// A share-link fragment could not be decoded.
    #[error("Share link decoding failed: {0}")]
    ShareDecode(String),

    /// Snapshot card rasterization or delivery failed.
    #[error("Snapshot export failed: {0}")]
    RasterizeFailure(String),

    /// A snapshot export was requested while another is in flight.
    #[error("A snapshot export is already in progress")]
    ExportInFlight,

    /// Clipboard access failed.
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a camera capture error with the given message.
    pub fn camera(msg: impl Into<String>) -> Self {
        Self::CameraCapture(msg.into())
    }

    /// Creates an image decoding error with the given message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::ImageDecode(msg.into())
    }

    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a malformed-response error with the given message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Creates a snapshot export error with the given message.
    pub fn raster(msg: impl Into<String>) -> Self {
        Self::RasterizeFailure(msg.into())
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
