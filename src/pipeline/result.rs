//! Result types for the form-scanning pipeline.

use crate::core::config::FieldId;
use crate::processors::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// How a field's value came to exist.
///
/// Located fields are `AnchorRelative` or `Absolute`, never a mixture
/// within one form. The remaining variants mark values that did not come
/// from region recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrigin {
    /// Recognized from a rectangle derived from the anchor position.
    AnchorRelative,
    /// Recognized from the field's absolute fallback rectangle.
    Absolute,
    /// Split or assembled from another field's value.
    Derived,
    /// Decoded from a machine-readable code, bypassing OCR.
    Barcode,
    /// Produced by the pipeline itself (e.g. the received-date stamp).
    Generated,
}

/// The runtime result of recognizing (or deriving) one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedField {
    /// Raw recognizer output for the field's region, when any.
    pub raw: Option<String>,
    /// The cleaned, normalized value.
    pub value: Option<String>,
    /// Recognition confidence on a 0-100 scale; `None` means no data.
    pub confidence: Option<f32>,
    /// Source rectangle in prepared-form coordinates, when the field was
    /// located on the page.
    pub region: Option<Rect>,
    /// How the value came to exist.
    pub origin: FieldOrigin,
}

impl RecognizedField {
    /// Creates a field recognized from a region.
    pub fn located(
        raw: Option<String>,
        confidence: Option<f32>,
        region: Rect,
        origin: FieldOrigin,
    ) -> Self {
        Self {
            raw,
            value: None,
            confidence,
            region: Some(region),
            origin,
        }
    }

    /// Creates a no-data field (degenerate region or failed recognition).
    pub fn missing(origin: FieldOrigin) -> Self {
        Self {
            raw: None,
            value: None,
            confidence: None,
            region: None,
            origin,
        }
    }

    /// Creates a derived field carrying `value`, inheriting this field's
    /// confidence and bounding box.
    pub fn derive(&self, value: impl Into<String>) -> Self {
        Self {
            raw: None,
            value: Some(value.into()),
            confidence: self.confidence,
            region: self.region,
            origin: FieldOrigin::Derived,
        }
    }

    /// Returns true if the field carries a normalized value.
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// The anchor token found inside the search window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anchor {
    /// The cleaned anchor text.
    pub text: String,
    /// Word-level recognition confidence of the anchor.
    pub confidence: f32,
    /// Tight bounding box of the anchor token.
    pub region: Rect,
}

/// The field-location strategy chosen for one form.
///
/// Chosen exactly once per form, before any field is located, so rectangles
/// from the two strategies can never mix within one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateStrategy {
    /// Every field rectangle is derived from this anchor's position.
    AnchorRelative {
        /// The anchor every rectangle was derived from.
        anchor: Anchor,
    },
    /// Every field uses its absolute fallback rectangle.
    Absolute,
}

/// The aggregate output of processing one form.
///
/// Constructed once, returned to the caller, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedForm {
    /// Path of the source photograph.
    pub source: PathBuf,
    /// How field rectangles were derived for this form.
    pub strategy: LocateStrategy,
    /// Every recognized and derived field, keyed by identifier.
    pub fields: BTreeMap<FieldId, RecognizedField>,
    /// Mean of all numeric per-field confidences; no-data fields are
    /// excluded from both numerator and denominator.
    pub overall_confidence: Option<f32>,
    /// Validation failures keyed by field identifier (plus the
    /// record-level `ocr_confidence` entry).
    pub validation_errors: BTreeMap<String, String>,
    /// True when any validation entry exists; routes the record to the
    /// manual-review queue downstream.
    pub needs_review: bool,
}

impl ProcessedForm {
    /// Returns a field by identifier.
    pub fn field(&self, id: FieldId) -> Option<&RecognizedField> {
        self.fields.get(&id)
    }

    /// Returns a field's normalized value by identifier.
    pub fn value(&self, id: FieldId) -> Option<&str> {
        self.fields.get(&id).and_then(|f| f.value.as_deref())
    }

    /// Returns the number of fields carrying a value.
    pub fn value_count(&self) -> usize {
        self.fields.values().filter(|f| f.has_value()).count()
    }
}

impl fmt::Display for ProcessedForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Source: {}", self.source.display())?;
        match &self.strategy {
            LocateStrategy::AnchorRelative { anchor } => {
                writeln!(
                    f,
                    "Strategy: anchor-relative ('{}' at confidence {:.1})",
                    anchor.text, anchor.confidence
                )?;
            }
            LocateStrategy::Absolute => writeln!(f, "Strategy: absolute regions")?,
        }
        match self.overall_confidence {
            Some(confidence) => writeln!(f, "Overall confidence: {confidence:.1}")?,
            None => writeln!(f, "Overall confidence: no data")?,
        }
        for (id, field) in &self.fields {
            match (&field.value, field.confidence) {
                (Some(value), Some(confidence)) => {
                    writeln!(f, "  {id}: '{value}' (confidence: {confidence:.1})")?
                }
                (Some(value), None) => writeln!(f, "  {id}: '{value}'")?,
                (None, _) => writeln!(f, "  {id}: [no value]")?,
            }
        }
        if self.validation_errors.is_empty() {
            writeln!(f, "Validation: passed")?;
        } else {
            writeln!(f, "Validation: {} error(s)", self.validation_errors.len())?;
            for (key, reason) in &self.validation_errors {
                writeln!(f, "  {key}: {reason}")?;
            }
        }
        Ok(())
    }
}

/// Mean of the numeric per-field confidences.
///
/// Fields with the no-data sentinel are excluded from both the numerator
/// and the denominator; `None` when no field has a numeric confidence.
pub fn mean_confidence(fields: &BTreeMap<FieldId, RecognizedField>) -> Option<f32> {
    let numeric: Vec<f32> = fields.values().filter_map(|f| f.confidence).collect();
    if numeric.is_empty() {
        None
    } else {
        Some(numeric.iter().sum::<f32>() / numeric.len() as f32)
    }
}
