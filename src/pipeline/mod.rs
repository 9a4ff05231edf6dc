//! The per-form processing pipeline.
//!
//! Processing one form is a single synchronous pipeline of stages, each
//! consuming the previous stage's output:
//!
//! prepare → anchor search → field location (anchor-relative or absolute)
//! → text cleaning → derived-field resolution → validation → record.
//!
//! Only input-level failures surface as errors. Anchor-not-found switches
//! the location strategy; every OCR-content problem degrades the affected
//! field and processing continues.

pub mod anchor;
pub mod batch;
pub mod fields;
pub mod prepare;
pub mod result;
pub mod validate;

use crate::core::config::{FieldId, Template};
use crate::core::errors::FormScanError;
use crate::core::traits::{BarcodeDecoder, TextRecognizer};
use crate::pipeline::anchor::AnchorLocator;
use crate::pipeline::fields::FieldLocator;
use crate::pipeline::prepare::FormImagePreparer;
use crate::pipeline::result::{
    mean_confidence, FieldOrigin, LocateStrategy, ProcessedForm, RecognizedField,
};
use crate::pipeline::validate::RecordValidator;
use crate::processors::derive::DerivedFieldResolver;
use crate::processors::text_clean::TextCleaner;
use image::RgbImage;
use std::collections::BTreeMap;
use std::path::Path;

pub use batch::{process_folder, BatchOutcome, BatchSummary};
pub use result::Anchor;

const GENERATED_CONFIDENCE: f32 = 100.0;

/// Processes one form image into a [`ProcessedForm`].
///
/// Holds no per-form state: the same processor can be reused across forms,
/// and independent processors sharing one [`Template`] can run concurrently.
pub struct FormProcessor<'t, R> {
    template: &'t Template,
    recognizer: R,
    barcode: Option<Box<dyn BarcodeDecoder>>,
    preparer: FormImagePreparer,
}

impl<'t, R: TextRecognizer> FormProcessor<'t, R> {
    /// Creates a processor over a compiled template and a recognition
    /// engine.
    pub fn new(template: &'t Template, recognizer: R) -> Self {
        Self {
            template,
            recognizer,
            barcode: None,
            preparer: FormImagePreparer::new(template),
        }
    }

    /// Attaches a barcode decoder used to populate the request-identifier
    /// field when the form carries a machine-readable code.
    pub fn with_barcode_decoder(mut self, decoder: Box<dyn BarcodeDecoder>) -> Self {
        self.barcode = Some(decoder);
        self
    }

    /// Loads and processes the form image at `path`.
    pub fn process_path(&mut self, path: &Path) -> Result<ProcessedForm, FormScanError> {
        let photo = FormImagePreparer::load(path)?;
        self.process_image(path, &photo)
    }

    /// Processes an already-loaded form photograph.
    pub fn process_image(
        &mut self,
        source: &Path,
        photo: &RgbImage,
    ) -> Result<ProcessedForm, FormScanError> {
        let prepared = self.preparer.prepare(photo);

        let barcode_value = self.decode_request_barcode(photo);

        let strategy = match AnchorLocator::new(self.template).locate(&mut self.recognizer, &prepared)
        {
            Some(anchor) => LocateStrategy::AnchorRelative { anchor },
            None => {
                tracing::debug!("anchor not found; using absolute field regions");
                LocateStrategy::Absolute
            }
        };

        let mut fields =
            FieldLocator::new(self.template).locate_all(&mut self.recognizer, &prepared, &strategy);

        // The anchor text is itself the combined identifier field.
        if let LocateStrategy::AnchorRelative { anchor } = &strategy {
            fields.insert(
                FieldId::MedicareNumber,
                RecognizedField::located(
                    Some(anchor.text.clone()),
                    Some(anchor.confidence),
                    anchor.region,
                    FieldOrigin::AnchorRelative,
                ),
            );
        }

        let cleaner = TextCleaner::new(self.template);
        for (id, field) in fields.iter_mut() {
            field.value = cleaner.clean(*id, field.raw.as_deref());
        }

        if let Some(value) = barcode_value {
            fields.insert(
                FieldId::RequestNumber,
                RecognizedField {
                    raw: Some(value.clone()),
                    value: Some(value),
                    confidence: Some(GENERATED_CONFIDENCE),
                    region: None,
                    origin: FieldOrigin::Barcode,
                },
            );
        }

        let mut fields = apply_derivations(self.template, fields);

        fields.insert(
            FieldId::ReceivedDate,
            RecognizedField {
                raw: None,
                value: Some(chrono::Local::now().format("%d/%m/%Y").to_string()),
                confidence: Some(GENERATED_CONFIDENCE),
                region: None,
                origin: FieldOrigin::Generated,
            },
        );

        let overall_confidence = mean_confidence(&fields);
        let validation_errors =
            RecordValidator::new(self.template).validate(&fields, overall_confidence);
        let needs_review = !validation_errors.is_empty();

        Ok(ProcessedForm {
            source: source.to_path_buf(),
            strategy,
            fields,
            overall_confidence,
            validation_errors,
            needs_review,
        })
    }

    /// Decodes the request identifier from a barcode, when a decoder is
    /// attached and a decoded value passes the identifier format.
    fn decode_request_barcode(&self, photo: &RgbImage) -> Option<String> {
        let decoder = self.barcode.as_ref()?;
        for value in decoder.decode(photo) {
            if self.is_valid_request_number(&value) {
                tracing::debug!(%value, "request identifier decoded from barcode");
                return Some(value);
            }
            tracing::warn!(%value, "barcode value does not match request identifier format");
        }
        None
    }

    fn is_valid_request_number(&self, value: &str) -> bool {
        match self.template.validation_pattern(FieldId::RequestNumber) {
            Some(pattern) => pattern.is_match(value),
            None => self
                .template
                .request_shape()
                .find(value)
                .is_some_and(|found| found.as_str() == value),
        }
    }
}

/// Applies every derivation rule to the cleaned field set, producing the
/// final set. Each rule reads already-normalized values and inserts derived
/// fields that inherit the parent's confidence and bounding box.
fn apply_derivations(
    template: &Template,
    mut fields: BTreeMap<FieldId, RecognizedField>,
) -> BTreeMap<FieldId, RecognizedField> {
    let resolver = DerivedFieldResolver::new(template);

    // Composite identifier: <10 digits>/<position digit>.
    if let Some(parent) = fields.get(&FieldId::MedicareNumber).cloned() {
        if let Some(value) = parent.value.as_deref() {
            if let Some((number, position)) = resolver.split_identifier(value) {
                if let Some(field) = fields.get_mut(&FieldId::MedicareNumber) {
                    field.value = Some(number);
                }
                fields.insert(FieldId::MedicarePosition, parent.derive(position));
            }
        }
    }

    // Address → street / suburb / postcode / state.
    if let Some(parent) = fields.get(&FieldId::Address).cloned() {
        if let Some(value) = parent.value.as_deref() {
            let parts = resolver.split_address(value);
            if let Some(street) = parts.address {
                if let Some(field) = fields.get_mut(&FieldId::Address) {
                    field.value = Some(street);
                }
            }
            if let Some(suburb) = parts.suburb {
                fields.insert(FieldId::Suburb, parent.derive(suburb));
            }
            if let Some(postcode) = parts.postcode {
                fields.insert(FieldId::Postcode, parent.derive(postcode));
            }
            if let Some(state) = parts.state {
                fields.insert(FieldId::State, parent.derive(state));
            }
        }
    }

    // Provider reference code: re-shape an existing value, or extract the
    // trailing code from the physician free-text block.
    let existing_provider = fields
        .get(&FieldId::ProviderNumber)
        .and_then(|f| f.value.clone());
    match existing_provider {
        Some(value) => {
            let code = resolver.extract_provider_code(&value);
            if let Some(field) = fields.get_mut(&FieldId::ProviderNumber) {
                field.value = code;
            }
        }
        None => {
            if let Some(parent) = fields.get(&FieldId::DoctorInformation).cloned() {
                if let Some(code) = parent
                    .value
                    .as_deref()
                    .and_then(|text| resolver.extract_provider_code(text))
                {
                    fields.insert(FieldId::ProviderNumber, parent.derive(code));
                }
            }
        }
    }

    // Phone blob → home / mobile, only when the dedicated fields are empty.
    let home_present = fields
        .get(&FieldId::HomePhone)
        .map(RecognizedField::has_value)
        .unwrap_or(false);
    let mobile_present = fields
        .get(&FieldId::MobilePhone)
        .map(RecognizedField::has_value)
        .unwrap_or(false);
    if !home_present && !mobile_present {
        if let Some(parent) = fields.get(&FieldId::PhoneNumber).cloned() {
            if let Some(blob) = parent.value.as_deref() {
                let pair = resolver.resolve_phones(blob);
                if let Some(home) = pair.home {
                    fields.insert(FieldId::HomePhone, parent.derive(home));
                }
                if let Some(mobile) = pair.mobile {
                    fields.insert(FieldId::MobilePhone, parent.derive(mobile));
                }
            }
        }
    }

    // Display name from given name and surname.
    let given = fields
        .get(&FieldId::GivenNames)
        .and_then(|f| f.value.clone());
    let surname = fields.get(&FieldId::Surname).and_then(|f| f.value.clone());
    if let Some(name) = resolver.assemble_name(given.as_deref(), surname.as_deref()) {
        if let Some(parent) = fields.get(&FieldId::GivenNames).cloned() {
            fields.insert(FieldId::Name, parent.derive(name));
        }
    }

    // Sex marker constrained to M/F/U.
    let sex = fields.get(&FieldId::Sex).and_then(|f| f.value.clone());
    let normalized = resolver.normalize_sex(sex.as_deref());
    match fields.get_mut(&FieldId::Sex) {
        Some(field) => field.value = Some(normalized),
        None => {
            fields.insert(
                FieldId::Sex,
                RecognizedField {
                    raw: None,
                    value: Some(normalized),
                    confidence: None,
                    region: None,
                    origin: FieldOrigin::Derived,
                },
            );
        }
    }

    fields
}
