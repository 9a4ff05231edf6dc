//! Interfaces of the external collaborators consumed by the pipeline.
//!
//! The optical character recognition engine and the barcode decoder are
//! black boxes to this crate: the pipeline only depends on the traits in
//! this module, and tests drive it with scripted fakes.

use crate::core::errors::RecognitionError;
use crate::processors::geometry::Rect;
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Page-segmentation mode requested for one recognition call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMode {
    /// A single dense text line.
    SingleLine,
    /// A uniform block of text; the default for unspecified fields.
    Block,
    /// A single character (e.g. a sex marker box).
    SingleChar,
    /// Sparse text scattered over the region.
    SparseText,
}

impl Default for RecognitionMode {
    fn default() -> Self {
        RecognitionMode::Block
    }
}

/// One recognized word with its confidence and bounding box.
///
/// Coordinates are in the frame of the image passed to
/// [`TextRecognizer::recognize`]; because the pipeline masks rather than
/// crops, that frame is the prepared form itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordBox {
    /// The recognized token.
    pub text: String,
    /// Confidence on a 0-100 scale; negative means no usable text.
    pub confidence: f32,
    /// Bounding box of the token.
    pub region: Rect,
}

/// The result of one recognition call: region-level text and confidence
/// plus word-level detail for the same region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineRecognition {
    /// Concatenated text of the region.
    pub text: String,
    /// Region-level confidence on a 0-100 scale.
    pub confidence: f32,
    /// Word-level results for the region.
    pub words: Vec<WordBox>,
}

/// A black-box text recognition engine.
///
/// The engine is potentially expensive and non-reentrant per call, so it is
/// taken by `&mut self`; one engine instance belongs to one pipeline
/// instance. Callers that want timeouts should wrap the whole per-form
/// pipeline, not individual calls (partial completion of a form has no
/// defined meaning).
pub trait TextRecognizer {
    /// Recognizes text in `image` using the given mode.
    ///
    /// The image is full-canvas with everything outside the field of
    /// interest masked to a neutral background, so returned word boxes are
    /// in absolute template coordinates.
    fn recognize(
        &mut self,
        image: &GrayImage,
        mode: RecognitionMode,
    ) -> Result<LineRecognition, RecognitionError>;
}

/// A black-box barcode decoder.
///
/// When supplied, a decoded value that passes request-identifier validation
/// populates that one field directly, bypassing OCR.
pub trait BarcodeDecoder {
    /// Decodes every barcode found in `image`, in detection order.
    fn decode(&self, image: &RgbImage) -> Vec<String>;
}
