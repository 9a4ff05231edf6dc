//! Background masking and binarization utilities.
//!
//! The pipeline never crops a field region out of the form: it replaces
//! everything *outside* the region with a neutral white background and hands
//! the full-size canvas to the recognizer. Unlike a crop this preserves the
//! absolute coordinate frame, so recognizer word boxes and debug overlays
//! line up with the prepared form.

use crate::processors::geometry::Rect;
use image::{GrayImage, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};

const BACKGROUND: Luma<u8> = Luma([255u8]);

/// Returns an image of identical dimensions with all content outside
/// `region` replaced by a white background.
///
/// The region is clipped to the image bounds first; a region entirely
/// outside the image yields an all-white canvas.
pub fn mask_outside(image: &GrayImage, region: Rect) -> GrayImage {
    let clipped = region.clip(image.width(), image.height());
    let mut masked = GrayImage::from_pixel(image.width(), image.height(), BACKGROUND);
    if clipped.is_degenerate() {
        return masked;
    }
    for y in clipped.y1..clipped.y2 {
        for x in clipped.x1..clipped.x2 {
            masked.put_pixel(x as u32, y as u32, *image.get_pixel(x as u32, y as u32));
        }
    }
    masked
}

/// Binarizes an image with an automatically chosen (Otsu) threshold.
///
/// Foreground stays dark and background white, matching what short-line
/// recognition expects from a masked anchor window.
pub fn binarize_otsu(image: &GrayImage) -> GrayImage {
    let level = otsu_level(image);
    threshold(image, level, ThresholdType::Binary)
}

/// Computes the bounding box of the image's dark content.
///
/// Pixels below the Otsu threshold count as foreground. Returns the tight
/// rectangle around every foreground pixel, or `None` when the page is
/// blank.
pub fn content_bounds(image: &GrayImage) -> Option<Rect> {
    let level = otsu_level(image);

    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut found = false;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0[0] < level {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if !found {
        return None;
    }
    Some(Rect::from_coords(
        min_x as i32,
        min_y as i32,
        max_x as i32 + 1,
        max_y as i32 + 1,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_dark_patch(patch: Rect) -> GrayImage {
        let mut image = GrayImage::from_pixel(100, 80, Luma([255u8]));
        for y in patch.y1..patch.y2 {
            for x in patch.x1..patch.x2 {
                image.put_pixel(x as u32, y as u32, Luma([10u8]));
            }
        }
        image
    }

    #[test]
    fn test_mask_outside_preserves_dimensions() {
        let image = page_with_dark_patch(Rect::from_coords(10, 10, 30, 20));
        let masked = mask_outside(&image, Rect::from_coords(0, 0, 50, 40));
        assert_eq!(masked.dimensions(), image.dimensions());
    }

    #[test]
    fn test_mask_outside_whitens_outside_keeps_inside() {
        let image = page_with_dark_patch(Rect::from_coords(10, 10, 30, 20));
        let masked = mask_outside(&image, Rect::from_coords(0, 0, 20, 40));

        // Inside the kept region, the dark patch survives.
        assert_eq!(masked.get_pixel(15, 15).0[0], 10);
        // Outside, the dark patch is replaced by background.
        assert_eq!(masked.get_pixel(25, 15).0[0], 255);
    }

    #[test]
    fn test_mask_outside_region_beyond_bounds_is_blank() {
        let image = page_with_dark_patch(Rect::from_coords(10, 10, 30, 20));
        let masked = mask_outside(&image, Rect::from_coords(500, 500, 600, 600));
        assert!(masked.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_content_bounds_finds_dark_patch() {
        let image = page_with_dark_patch(Rect::from_coords(12, 8, 40, 30));
        let bounds = content_bounds(&image).unwrap();
        assert_eq!(bounds, Rect::from_coords(12, 8, 40, 30));
    }

    #[test]
    fn test_content_bounds_blank_page() {
        let image = GrayImage::from_pixel(50, 50, Luma([255u8]));
        assert!(content_bounds(&image).is_none());
    }
}
