//! Batch processing of a folder of scanned forms.
//!
//! Forms are independent: each gets its own pipeline instance (and its own
//! recognition engine, since engines are non-reentrant), sharing only the
//! read-only template. A form that fails to load is recorded as a failed
//! result; it never aborts the batch.

use crate::core::config::Template;
use crate::core::errors::FormScanError;
use crate::core::traits::TextRecognizer;
use crate::pipeline::result::ProcessedForm;
use crate::pipeline::FormProcessor;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "tiff"];

/// Statistics over one processed folder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// Number of image files found.
    pub total: usize,
    /// Forms that produced a record (possibly flagged for review).
    pub succeeded: usize,
    /// Forms that failed with an input error.
    pub failed: usize,
    /// Mean overall confidence across successful forms.
    pub mean_confidence: Option<f32>,
}

/// The outcome of processing a folder: per-form results plus statistics.
#[derive(Debug)]
pub struct BatchOutcome {
    /// One entry per image file, in path order.
    pub forms: Vec<(PathBuf, Result<ProcessedForm, FormScanError>)>,
    /// Aggregate statistics.
    pub summary: BatchSummary,
}

/// Processes every image file in `folder` with independent, concurrent
/// pipeline instances.
///
/// `make_recognizer` is invoked once per form so that each pipeline owns
/// its engine. Returns an error only when the folder itself cannot be
/// enumerated; per-form failures are data in the outcome.
pub fn process_folder<R, F>(
    template: &Template,
    folder: &Path,
    make_recognizer: F,
) -> Result<BatchOutcome, FormScanError>
where
    R: TextRecognizer,
    F: Fn() -> R + Sync,
{
    let mut paths: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    let ext = ext.to_ascii_lowercase();
                    IMAGE_EXTENSIONS.contains(&ext.as_str())
                })
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    tracing::info!(folder = %folder.display(), files = paths.len(), "processing folder");

    let forms: Vec<(PathBuf, Result<ProcessedForm, FormScanError>)> = paths
        .into_par_iter()
        .map(|path| {
            let mut processor = FormProcessor::new(template, make_recognizer());
            let result = processor.process_path(&path);
            if let Err(error) = &result {
                tracing::warn!(path = %path.display(), %error, "form failed");
            }
            (path, result)
        })
        .collect();

    let total = forms.len();
    let succeeded = forms.iter().filter(|(_, r)| r.is_ok()).count();
    let confidences: Vec<f32> = forms
        .iter()
        .filter_map(|(_, r)| r.as_ref().ok())
        .filter_map(|form| form.overall_confidence)
        .collect();
    let mean_confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
    };

    let summary = BatchSummary {
        total,
        succeeded,
        failed: total - succeeded,
        mean_confidence,
    };
    tracing::info!(?summary, "folder processing complete");

    Ok(BatchOutcome { forms, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TemplateConfig;
    use crate::core::errors::RecognitionError;
    use crate::core::traits::{LineRecognition, RecognitionMode};
    use image::{GrayImage, Rgb, RgbImage};

    /// Always reports no usable text.
    struct SilentRecognizer;

    impl TextRecognizer for SilentRecognizer {
        fn recognize(
            &mut self,
            _image: &GrayImage,
            _mode: RecognitionMode,
        ) -> Result<LineRecognition, RecognitionError> {
            Ok(LineRecognition {
                text: String::new(),
                confidence: -1.0,
                words: Vec::new(),
            })
        }
    }

    #[test]
    fn test_process_folder_collects_per_form_results() {
        let dir = tempfile::tempdir().unwrap();
        let photo = RgbImage::from_pixel(200, 150, Rgb([255, 255, 255]));
        photo.save(dir.path().join("a.png")).unwrap();
        photo.save(dir.path().join("b.png")).unwrap();
        // A corrupt file fails to load but does not abort the batch.
        std::fs::write(dir.path().join("c.png"), b"not an image").unwrap();
        // Non-image files are ignored.
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let template = TemplateConfig::default().compile().unwrap();
        let outcome = process_folder(&template, dir.path(), || SilentRecognizer).unwrap();

        assert_eq!(outcome.summary.total, 3);
        assert_eq!(outcome.summary.succeeded, 2);
        assert_eq!(outcome.summary.failed, 1);
        assert_eq!(outcome.forms.len(), 3);
        // Results come back in path order.
        assert!(outcome.forms[0].0.ends_with("a.png"));
        assert!(outcome.forms[2].0.ends_with("c.png"));
        assert!(outcome.forms[2].1.is_err());
    }

    #[test]
    fn test_process_folder_missing_directory_is_an_error() {
        let template = TemplateConfig::default().compile().unwrap();
        let result = process_folder(&template, Path::new("/nonexistent/scans"), || {
            SilentRecognizer
        });
        assert!(matches!(result, Err(FormScanError::Io(_))));
    }

    #[test]
    fn test_empty_folder_yields_empty_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let template = TemplateConfig::default().compile().unwrap();
        let outcome = process_folder(&template, dir.path(), || SilentRecognizer).unwrap();
        assert_eq!(outcome.summary, BatchSummary::default());
        assert!(outcome.forms.is_empty());
    }
}
