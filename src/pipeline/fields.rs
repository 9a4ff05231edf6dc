//! Field location and recognition.
//!
//! Rectangles come from exactly one strategy per form: every spec's
//! calibrated offset resolved against the anchor, or every spec's absolute
//! fallback region. Each located rectangle is recognized behind a
//! background mask so stray content from neighboring fields cannot leak
//! into the result.

use crate::core::config::{FieldId, FieldSpec, Template};
use crate::core::traits::{RecognitionMode, TextRecognizer};
use crate::pipeline::result::{FieldOrigin, LocateStrategy, RecognizedField};
use crate::processors::geometry::Rect;
use crate::processors::mask::mask_outside;
use image::GrayImage;
use std::collections::BTreeMap;

/// Locates and recognizes every field of the template.
#[derive(Debug, Clone, Copy)]
pub struct FieldLocator<'t> {
    template: &'t Template,
}

impl<'t> FieldLocator<'t> {
    /// Creates a locator over a compiled template.
    pub fn new(template: &'t Template) -> Self {
        Self { template }
    }

    /// Produces one [`RecognizedField`] per locatable field spec.
    ///
    /// Under the anchor-relative strategy, specs without a calibrated
    /// offset are skipped (the anchor itself and barcode-backed fields are
    /// filled by the caller). Under the absolute strategy every spec is
    /// recognized from its fallback region. A per-field recognition
    /// failure degrades that field to no-data and processing continues.
    pub fn locate_all<R: TextRecognizer>(
        &self,
        recognizer: &mut R,
        prepared: &GrayImage,
        strategy: &LocateStrategy,
    ) -> BTreeMap<FieldId, RecognizedField> {
        let mut fields = BTreeMap::new();
        for spec in self.template.fields() {
            let (region, origin) = match strategy {
                LocateStrategy::AnchorRelative { anchor } => {
                    let Some(offset) = spec.offset else {
                        continue;
                    };
                    let top_left = anchor.region.top_left();
                    (
                        offset.resolve(top_left.x, top_left.y),
                        FieldOrigin::AnchorRelative,
                    )
                }
                LocateStrategy::Absolute => (spec.region, FieldOrigin::Absolute),
            };
            fields.insert(spec.id, self.read_region(recognizer, prepared, spec, region, origin));
        }
        fields
    }

    /// Masks everything outside `region` and recognizes it with the spec's
    /// mode.
    fn read_region<R: TextRecognizer>(
        &self,
        recognizer: &mut R,
        prepared: &GrayImage,
        spec: &FieldSpec,
        region: Rect,
        origin: FieldOrigin,
    ) -> RecognizedField {
        let clipped = region.clip(prepared.width(), prepared.height());
        if clipped.is_degenerate() {
            tracing::debug!(field = %spec.id, ?region, "field region degenerate after clipping");
            return RecognizedField::missing(origin);
        }

        let masked = mask_outside(prepared, clipped);
        let mode = spec.mode.unwrap_or(RecognitionMode::Block);
        match recognizer.recognize(&masked, mode) {
            Ok(recognition) => {
                tracing::debug!(
                    field = %spec.id,
                    text = %recognition.text,
                    confidence = recognition.confidence,
                    "field recognized"
                );
                let raw = if recognition.text.trim().is_empty() {
                    None
                } else {
                    Some(recognition.text)
                };
                let confidence = if recognition.confidence >= 0.0 {
                    Some(recognition.confidence)
                } else {
                    None
                };
                RecognizedField::located(raw, confidence, clipped, origin)
            }
            Err(error) => {
                tracing::warn!(field = %spec.id, %error, "field recognition failed");
                RecognizedField::located(None, None, clipped, origin)
            }
        }
    }
}
