//! # formscan
//!
//! A Rust library that extracts structured patient-intake data from scanned
//! pathology request form images of a fixed but imperfectly-aligned layout.
//!
//! The pipeline locates a single strict-format text token (the "anchor")
//! inside a search window, derives every other field's bounding box from the
//! anchor position using calibrated relative offsets, falls back to absolute
//! regions when no anchor is found, then cleans, splits, and validates the
//! recognized text into a typed record.
//!
//! ## Components
//!
//! - **Image preparation**: Crop a raw photograph to content and rescale it
//!   to the template's canonical size
//! - **Anchor location**: Find the highest-confidence token matching the
//!   anchor pattern inside the configured search window
//! - **Field location**: Compute per-field rectangles (anchor-relative or
//!   absolute) and recognize each region behind a background mask
//! - **Text cleaning**: Misread correction, character whitelisting, and
//!   field-shape normalization
//! - **Derived fields**: Split composite values (identifier, phone blob,
//!   address, physician block) into their logical parts
//! - **Validation**: Per-field format rules plus a record-level confidence
//!   floor, producing a "needs manual review" flag
//!
//! ## Modules
//!
//! * [`core`] - Error types, template configuration, and collaborator traits
//! * [`processors`] - Geometry, masking, text cleaning, and derivation rules
//! * [`pipeline`] - The per-form processing pipeline and batch orchestration
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use formscan::core::config::TemplateConfig;
//! use formscan::pipeline::FormProcessor;
//! # use formscan::core::traits::{TextRecognizer, LineRecognition, RecognitionMode};
//! # use formscan::core::errors::RecognitionError;
//! # struct Engine;
//! # impl TextRecognizer for Engine {
//! #     fn recognize(
//! #         &mut self,
//! #         _image: &image::GrayImage,
//! #         _mode: RecognitionMode,
//! #     ) -> Result<LineRecognition, RecognitionError> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template = TemplateConfig::default().compile()?;
//! let mut processor = FormProcessor::new(&template, Engine);
//! let form = processor.process_path(std::path::Path::new("scan.png"))?;
//! if form.needs_review {
//!     for (field, reason) in &form.validation_errors {
//!         eprintln!("{field}: {reason}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod pipeline;
pub mod processors;

pub use crate::core::config::{FieldId, Template, TemplateConfig};
pub use crate::core::errors::FormScanError;
pub use pipeline::result::{ProcessedForm, RecognizedField};
pub use pipeline::FormProcessor;
