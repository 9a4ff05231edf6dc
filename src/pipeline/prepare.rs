//! Form image preparation.
//!
//! A raw photograph arrives at an arbitrary size with the form floating
//! somewhere inside it. Preparation crops the image to its dark content,
//! pads the crop, and rescales to the template's canonical canvas so that
//! every downstream coordinate (search window, absolute regions, relative
//! offsets) is template-relative.

use crate::core::config::Template;
use crate::core::errors::FormScanError;
use crate::processors::mask::content_bounds;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use std::path::Path;

const CONTENT_PADDING: i32 = 20;

/// Crops and rescales raw photographs to the template's canonical canvas.
#[derive(Debug, Clone, Copy)]
pub struct FormImagePreparer {
    target_width: u32,
    target_height: u32,
}

impl FormImagePreparer {
    /// Creates a preparer targeting the template's canvas size.
    pub fn new(template: &Template) -> Self {
        let (target_width, target_height) = template.canvas();
        Self {
            target_width,
            target_height,
        }
    }

    /// Loads a photograph from disk.
    ///
    /// An unreadable or corrupt image is fatal for the form: the pipeline
    /// aborts before producing a partial record.
    pub fn load(path: &Path) -> Result<RgbImage, FormScanError> {
        let image = image::open(path).map_err(|source| FormScanError::ImageLoad {
            path: path.display().to_string(),
            source,
        })?;
        Ok(image.to_rgb8())
    }

    /// Prepares a photograph: grayscale, crop to content, rescale.
    pub fn prepare(&self, image: &RgbImage) -> GrayImage {
        let gray: GrayImage = imageops::grayscale(image);

        let cropped = match content_bounds(&gray) {
            Some(bounds) => {
                let padded = crate::processors::geometry::Rect::from_coords(
                    bounds.x1 - CONTENT_PADDING,
                    bounds.y1 - CONTENT_PADDING,
                    bounds.x2 + CONTENT_PADDING,
                    bounds.y2 + CONTENT_PADDING,
                )
                .clip(gray.width(), gray.height());
                imageops::crop_imm(
                    &gray,
                    padded.x1 as u32,
                    padded.y1 as u32,
                    padded.width(),
                    padded.height(),
                )
                .to_image()
            }
            None => {
                tracing::warn!("no content found in form image; using the full frame");
                gray
            }
        };

        imageops::resize(
            &cropped,
            self.target_width,
            self.target_height,
            FilterType::Triangle,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TemplateConfig;
    use image::{Luma, Rgb};

    #[test]
    fn test_prepare_rescales_to_canvas() {
        let template = TemplateConfig::default().compile().unwrap();
        let preparer = FormImagePreparer::new(&template);

        let mut photo = RgbImage::from_pixel(400, 300, Rgb([255, 255, 255]));
        for y in 40..260 {
            for x in 30..370 {
                photo.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        let prepared = preparer.prepare(&photo);
        assert_eq!(prepared.dimensions(), (1024, 768));
    }

    #[test]
    fn test_prepare_blank_photo_uses_full_frame() {
        let template = TemplateConfig::default().compile().unwrap();
        let preparer = FormImagePreparer::new(&template);
        let photo = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        let prepared = preparer.prepare(&photo);
        assert_eq!(prepared.dimensions(), (1024, 768));
        assert!(prepared.pixels().all(|p| *p == Luma([255u8])));
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let result = FormImagePreparer::load(Path::new("/nonexistent/form.png"));
        assert!(result.is_err());
    }
}
