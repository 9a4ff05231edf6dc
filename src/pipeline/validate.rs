//! Record validation.
//!
//! Validation never raises: it evaluates the template's rules over the
//! final field set and produces data: a map of failure reasons keyed by
//! field identifier. Any entry (including the record-level low-confidence
//! entry) flags the record for manual review downstream.

use crate::core::config::{FieldId, Template};
use crate::pipeline::result::RecognizedField;
use chrono::NaiveDate;
use std::collections::BTreeMap;

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Key of the record-level low-confidence validation entry.
pub const OCR_CONFIDENCE_KEY: &str = "ocr_confidence";

/// Evaluates format and confidence rules over a final field set.
#[derive(Debug, Clone, Copy)]
pub struct RecordValidator<'t> {
    template: &'t Template,
}

impl<'t> RecordValidator<'t> {
    /// Creates a validator over a compiled template.
    pub fn new(template: &'t Template) -> Self {
        Self { template }
    }

    /// Validates the field set and returns the failure map.
    pub fn validate(
        &self,
        fields: &BTreeMap<FieldId, RecognizedField>,
        overall_confidence: Option<f32>,
    ) -> BTreeMap<String, String> {
        let validation = self.template.validation();
        let mut errors = BTreeMap::new();

        for id in &validation.required {
            let present = fields.get(id).map(RecognizedField::has_value).unwrap_or(false);
            if !present {
                errors.insert(id.as_str().to_string(), format!("{} is required.", title(*id)));
            }
        }

        for (id, field) in fields {
            let Some(value) = field.value.as_deref() else {
                continue;
            };
            if let Some(pattern) = self.template.validation_pattern(*id) {
                if !pattern.is_match(value) {
                    errors.insert(
                        id.as_str().to_string(),
                        format!("Invalid {} format.", title(*id)),
                    );
                }
            }
            if validation.date_fields.contains(id)
                && NaiveDate::parse_from_str(value, DATE_FORMAT).is_err()
            {
                errors.insert(
                    id.as_str().to_string(),
                    format!("Invalid {} format.", title(*id)),
                );
            }
        }

        if let Some(confidence) = overall_confidence {
            if confidence < validation.confidence_floor {
                tracing::warn!(confidence, "overall OCR confidence is low");
                errors.insert(
                    OCR_CONFIDENCE_KEY.to_string(),
                    "Overall OCR confidence is low.".to_string(),
                );
            }
        }

        errors
    }
}

/// Title-cases a field identifier for human-readable reasons.
fn title(id: FieldId) -> String {
    id.as_str()
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
