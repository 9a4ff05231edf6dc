//! Core error types for the form-scanning pipeline.
//!
//! Only input-level problems (an unreadable image, a broken template) are
//! hard errors. Everything that stems from OCR content quality is absorbed
//! into the data model as missing values, low confidence, or validation-error
//! entries, so a partially unreadable form still yields a usable record.

use thiserror::Error;

/// Errors that abort processing of a single form.
#[derive(Debug, Error)]
pub enum FormScanError {
    /// The input image could not be read or decoded.
    #[error("failed to load form image from '{path}'")]
    ImageLoad {
        /// Path of the image that failed to load.
        path: String,
        /// The underlying decode error.
        #[source]
        source: image::ImageError,
    },

    /// An IO error outside of image decoding (e.g. listing a batch folder).
    #[error("io")]
    Io(#[from] std::io::Error),

    /// The template configuration is invalid.
    #[error(transparent)]
    Config(#[from] crate::core::config::ConfigError),
}

/// Error reported by a [`TextRecognizer`](crate::core::traits::TextRecognizer)
/// collaborator.
///
/// The pipeline never propagates this to the caller: a failed anchor-search
/// recognition is treated as "anchor not found" and a failed per-field
/// recognition degrades that one field to no-data.
#[derive(Debug, Error)]
#[error("text recognition failed: {message}")]
pub struct RecognitionError {
    /// A message describing the failure.
    pub message: String,
    /// The underlying engine error, when one exists.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RecognitionError {
    /// Creates a recognition error from a message alone.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a recognition error wrapping an engine error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
