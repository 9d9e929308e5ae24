//! # Background Subtraction Module
//!
//! Removes the patterned background from a captcha image by comparing it
//! against a library of candidate background images and keeping only the
//! pixels the best-matching background fails to explain.
//!
//! The matcher is a pure function of its inputs: for each candidate it
//! computes a per-pixel absolute difference, thresholds the grayscale
//! intensity of that difference into a keep/remove mask, and applies the
//! mask to the *original* captcha so surviving glyph pixels retain their
//! true colors for OCR. Candidates are scored by the total difference
//! intensity; the lower the residual, the better the background explains
//! the image.

use crate::config::{CANONICAL_HEIGHT, CANONICAL_WIDTH};
use image::{imageops::FilterType, DynamicImage, Rgb, RgbImage};
use tracing::debug;

/// Resize an image to the canonical captcha dimensions (110x60 RGB).
///
/// Every image entering the matcher or the OCR engine goes through this
/// first; comparisons are only meaningful over identically-sized rasters.
pub fn to_canonical(image: &DynamicImage) -> RgbImage {
    image
        .resize_exact(CANONICAL_WIDTH, CANONICAL_HEIGHT, FilterType::Triangle)
        .to_rgb8()
}

/// Grayscale intensity of an RGB difference pixel (ITU-R BT.601 weights).
fn gray_intensity(pixel: Rgb<u8>) -> u8 {
    let Rgb([r, g, b]) = pixel;
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

/// Mask the captcha against one candidate background.
///
/// Returns the masked image plus the residual score: the sum of grayscale
/// difference intensity over *all* pixels, masked or not. A low score means
/// the candidate explains most of the image as background.
fn mask_against(captcha: &RgbImage, background: &RgbImage, threshold: u8) -> (RgbImage, u64) {
    debug_assert_eq!(captcha.dimensions(), background.dimensions());

    let mut masked = RgbImage::new(captcha.width(), captcha.height());
    let mut score: u64 = 0;

    for (x, y, pixel) in captcha.enumerate_pixels() {
        let bg = background.get_pixel(x, y);
        let diff = Rgb([
            pixel[0].abs_diff(bg[0]),
            pixel[1].abs_diff(bg[1]),
            pixel[2].abs_diff(bg[2]),
        ]);
        let intensity = gray_intensity(diff);
        score += intensity as u64;

        // Surviving pixels keep their original color; the mask is binary.
        if intensity > threshold {
            masked.put_pixel(x, y, *pixel);
        } else {
            masked.put_pixel(x, y, Rgb([0, 0, 0]));
        }
    }

    (masked, score)
}

/// Remove the background from a captcha using the best-matching candidate.
///
/// The captcha is resized to canonical dimensions and each candidate
/// background is resized to match it (never the reverse). With an empty
/// background set the canonical captcha is returned unchanged. Ties in the
/// residual score go to the first-encountered candidate.
pub fn remove_background(
    captcha: &DynamicImage,
    backgrounds: &[DynamicImage],
    threshold: u8,
) -> RgbImage {
    let captcha = to_canonical(captcha);

    if backgrounds.is_empty() {
        debug!("No backgrounds supplied, returning canonical captcha unchanged");
        return captcha;
    }

    let mut best: Option<(RgbImage, u64)> = None;

    for (index, background) in backgrounds.iter().enumerate() {
        let background = to_canonical(background);
        let (masked, score) = mask_against(&captcha, &background, threshold);
        debug!(candidate = index, score, "Scored background candidate");

        match &best {
            Some((_, best_score)) if score >= *best_score => {}
            _ => best = Some((masked, score)),
        }
    }

    let (masked, score) = best.expect("at least one background candidate was scored");
    debug!(score, "Selected best-matching background");
    masked
}

/// Turn fully-black masked-out pixels white.
///
/// Tesseract performs markedly better on dark glyphs over a light field
/// than over the black holes the mask leaves behind, so the removed region
/// is filled with white before recognition.
pub fn whiten_masked(image: &mut RgbImage) {
    for pixel in image.pixels_mut() {
        if pixel.0 == [0, 0, 0] {
            *pixel = Rgb([255, 255, 255]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DIFF_THRESHOLD;

    fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        let mut img = RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = Rgb(color);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_to_canonical_resizes() {
        let img = solid_image(300, 100, [10, 20, 30]);
        let canonical = to_canonical(&img);
        assert_eq!(canonical.dimensions(), (CANONICAL_WIDTH, CANONICAL_HEIGHT));
    }

    #[test]
    fn test_empty_background_set_is_identity() {
        let captcha = solid_image(CANONICAL_WIDTH, CANONICAL_HEIGHT, [120, 130, 140]);
        let result = remove_background(&captcha, &[], DEFAULT_DIFF_THRESHOLD);
        assert_eq!(result, captcha.to_rgb8());
    }

    #[test]
    fn test_matching_background_masks_everything() {
        let captcha = solid_image(CANONICAL_WIDTH, CANONICAL_HEIGHT, [200, 200, 200]);
        let background = solid_image(CANONICAL_WIDTH, CANONICAL_HEIGHT, [200, 200, 200]);

        let result = remove_background(&captcha, &[background], DEFAULT_DIFF_THRESHOLD);
        assert!(result.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_best_scoring_candidate_selected() {
        // A captcha identical to the second candidate scores zero against
        // it; the first candidate leaves every pixel unexplained, so the
        // second must win and mask the whole image.
        let captcha = solid_image(CANONICAL_WIDTH, CANONICAL_HEIGHT, [50, 50, 50]);
        let far = solid_image(CANONICAL_WIDTH, CANONICAL_HEIGHT, [250, 250, 250]);
        let exact = solid_image(CANONICAL_WIDTH, CANONICAL_HEIGHT, [50, 50, 50]);

        let result = remove_background(&captcha, &[far, exact], DEFAULT_DIFF_THRESHOLD);
        assert!(result.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_surviving_pixels_keep_original_color() {
        // Background matches everywhere except one glyph pixel, which must
        // survive with its original color rather than the difference value.
        let mut captcha = RgbImage::new(CANONICAL_WIDTH, CANONICAL_HEIGHT);
        for pixel in captcha.pixels_mut() {
            *pixel = Rgb([100, 100, 100]);
        }
        captcha.put_pixel(5, 5, Rgb([230, 40, 40]));
        let captcha = DynamicImage::ImageRgb8(captcha);
        let background = solid_image(CANONICAL_WIDTH, CANONICAL_HEIGHT, [100, 100, 100]);

        let result = remove_background(&captcha, &[background], DEFAULT_DIFF_THRESHOLD);
        assert_eq!(result.get_pixel(5, 5).0, [230, 40, 40]);
        assert_eq!(result.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_candidate_resized_to_captcha_dimensions() {
        // Oversized candidate still usable; the captcha keeps canonical size.
        let captcha = solid_image(CANONICAL_WIDTH, CANONICAL_HEIGHT, [80, 80, 80]);
        let background = solid_image(400, 250, [80, 80, 80]);

        let result = remove_background(&captcha, &[background], DEFAULT_DIFF_THRESHOLD);
        assert_eq!(result.dimensions(), (CANONICAL_WIDTH, CANONICAL_HEIGHT));
        assert!(result.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_whiten_masked_fills_black_only() {
        let mut img = RgbImage::new(4, 4);
        img.put_pixel(1, 1, Rgb([230, 40, 40]));
        whiten_masked(&mut img);

        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(1, 1).0, [230, 40, 40]);
    }
}
