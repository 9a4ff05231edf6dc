//! Anchor location.
//!
//! The anchor is the single most discriminable token on the form (a strict
//! `<10 digits>/<digit>` identifier in the reference template). Finding it
//! anywhere inside the configured search window lets every other field be
//! located by calibrated relative offsets, tolerating scan skew and offset.
//! Not finding it is not an error: the caller falls back to absolute
//! regions.

use crate::core::config::Template;
use crate::core::traits::{RecognitionMode, TextRecognizer, WordBox};
use crate::pipeline::result::Anchor;
use crate::processors::geometry::Rect;
use crate::processors::mask::{binarize_otsu, mask_outside};
use image::GrayImage;

/// Searches the anchor window for the best token matching the anchor
/// pattern.
#[derive(Debug, Clone, Copy)]
pub struct AnchorLocator<'t> {
    template: &'t Template,
}

impl<'t> AnchorLocator<'t> {
    /// Creates a locator over a compiled template.
    pub fn new(template: &'t Template) -> Self {
        Self { template }
    }

    /// Finds the highest-confidence anchor candidate in the prepared form,
    /// or `None` when no word in the search window satisfies the pattern.
    ///
    /// A recognition failure is logged and treated as "anchor not found";
    /// it never propagates.
    pub fn locate<R: TextRecognizer>(
        &self,
        recognizer: &mut R,
        prepared: &GrayImage,
    ) -> Option<Anchor> {
        let window = self.template.anchor().search_region;
        // The recognizer sees a canvas identical in size to the page,
        // blank except for the search window.
        let masked = mask_outside(prepared, window);
        let binary = binarize_otsu(&masked);

        let recognition = match recognizer.recognize(&binary, RecognitionMode::SingleLine) {
            Ok(recognition) => recognition,
            Err(error) => {
                tracing::warn!(%error, "anchor recognition failed; falling back");
                return None;
            }
        };
        tracing::debug!(
            text = %recognition.text,
            confidence = recognition.confidence,
            words = recognition.words.len(),
            "anchor window recognized"
        );

        let mut best: Option<Anchor> = None;
        for word in &recognition.words {
            if word.text.trim().is_empty() {
                continue;
            }
            // A negative confidence marks unusable text.
            if !word.confidence.is_finite() || word.confidence < 0.0 {
                continue;
            }
            let Some((text, variant)) = self.candidate_for(&word.text) else {
                continue;
            };
            let region = tight_region(&variant, &self.template.anchor().allowed_chars, word);
            let replace = match &best {
                Some(current) => word.confidence > current.confidence,
                None => true,
            };
            if replace {
                best = Some(Anchor {
                    text,
                    confidence: word.confidence,
                    region,
                });
            }
        }

        match &best {
            Some(anchor) => tracing::debug!(
                text = %anchor.text,
                confidence = anchor.confidence,
                "anchor located"
            ),
            None => tracing::debug!("no anchor candidate in search window"),
        }
        best
    }

    /// Generates anchor candidates for one word: the unmodified cleaned
    /// token first, then each misread correction in configured order.
    /// Returns the first candidate satisfying the anchor pattern, together
    /// with the corrected word text it was cleaned from.
    fn candidate_for(&self, word: &str) -> Option<(String, String)> {
        let anchor = self.template.anchor();
        let variants = std::iter::once(word.to_string()).chain(
            anchor
                .corrections
                .iter()
                .map(|rule| word.replace(&rule.from, &rule.to)),
        );
        for variant in variants {
            let cleaned: String = variant
                .chars()
                .filter(|c| anchor.allowed_chars.contains(*c))
                .collect();
            if self.template.anchor_pattern().is_match(&cleaned) {
                return Some((cleaned, variant));
            }
        }
        None
    }
}

/// Estimates the tight bounding box of the anchor characters inside a word
/// box by proportional character width.
fn tight_region(variant: &str, allowed: &str, word: &WordBox) -> Rect {
    let total = variant.chars().count();
    if total == 0 {
        return word.region;
    }
    let kept: Vec<usize> = variant
        .chars()
        .enumerate()
        .filter(|(_, c)| allowed.contains(*c))
        .map(|(i, _)| i)
        .collect();
    let (Some(&first), Some(&last)) = (kept.first(), kept.last()) else {
        return word.region;
    };

    let char_width = word.region.width() as f32 / total as f32;
    let x1 = word.region.x1 + (first as f32 * char_width) as i32;
    let x2 = word.region.x1 + ((last + 1) as f32 * char_width).ceil() as i32;
    Rect::from_coords(x1, word.region.y1, x2, word.region.y2)
}
