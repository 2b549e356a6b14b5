//! Default [`TemplateMatcher`]: a sampled colour-distance scan.
//!
//! Every `scan_step`-th window position is scored by sampling every
//! `sample_step`-th template pixel and averaging
//! `1 - (|Δr| + |Δg| + |Δb|) / 765`. Coarse, but fast enough to poll a
//! full-HD monitor every few seconds without a native vision library.

use image::RgbImage;

use super::TemplateMatcher;
use crate::error::MatchError;

/// Top-left corner and score of the best window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate {
    pub x: u32,
    pub y: u32,
    pub score: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct SampledMatcher {
    scan_step: u32,
    sample_step: u32,
}

impl SampledMatcher {
    pub fn new(scan_step: u32, sample_step: u32) -> Self {
        Self {
            scan_step: scan_step.max(1),
            sample_step: sample_step.max(1),
        }
    }

    fn score_at(&self, haystack: &RgbImage, needle: &RgbImage, x: u32, y: u32) -> f32 {
        let mut total = 0.0f32;
        let mut samples = 0u32;
        for ty in (0..needle.height()).step_by(self.sample_step as usize) {
            for tx in (0..needle.width()).step_by(self.sample_step as usize) {
                let t = needle.get_pixel(tx, ty).0;
                let s = haystack.get_pixel(x + tx, y + ty).0;
                let diff: u32 = t
                    .iter()
                    .zip(s.iter())
                    .map(|(a, b)| a.abs_diff(*b) as u32)
                    .sum();
                total += 1.0 - diff as f32 / 765.0;
                samples += 1;
            }
        }
        if samples == 0 { 0.0 } else { total / samples as f32 }
    }
}

impl Default for SampledMatcher {
    fn default() -> Self {
        Self::new(2, 3)
    }
}

impl TemplateMatcher for SampledMatcher {
    fn best_match(
        &self,
        haystack: &RgbImage,
        needle: &RgbImage,
    ) -> Result<Option<MatchCandidate>, MatchError> {
        let (hw, hh) = haystack.dimensions();
        let (nw, nh) = needle.dimensions();
        if nw == 0 || nh == 0 || nw > hw || nh > hh {
            return Ok(None);
        }

        let mut best: Option<MatchCandidate> = None;
        for y in (0..=hh - nh).step_by(self.scan_step as usize) {
            for x in (0..=hw - nw).step_by(self.scan_step as usize) {
                let score = self.score_at(haystack, needle, x, y);
                if best.is_none_or(|b| score > b.score) {
                    best = Some(MatchCandidate { x, y, score });
                }
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn noise(w: u32, h: u32, seed: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let v = (x.wrapping_mul(73) ^ y.wrapping_mul(151) ^ seed).wrapping_mul(2_654_435_761);
            Rgb([(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8])
        })
    }

    fn paste(dst: &mut RgbImage, src: &RgbImage, at_x: u32, at_y: u32) {
        for (x, y, px) in src.enumerate_pixels() {
            dst.put_pixel(at_x + x, at_y + y, *px);
        }
    }

    #[test]
    fn finds_pasted_template_exactly() {
        let mut screen = RgbImage::from_pixel(200, 120, Rgb([20, 20, 20]));
        let button = noise(24, 12, 7);
        paste(&mut screen, &button, 60, 40);

        let m = SampledMatcher::default().best_match(&screen, &button).unwrap().unwrap();
        assert_eq!((m.x, m.y), (60, 40));
        assert!(m.score > 0.999);
    }

    #[test]
    fn unrelated_screen_scores_low() {
        let screen = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let button = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        let m = SampledMatcher::default().best_match(&screen, &button).unwrap().unwrap();
        assert!(m.score < 0.01);
    }

    #[test]
    fn oversized_template_never_matches() {
        let screen = RgbImage::new(10, 10);
        let button = RgbImage::new(11, 5);
        assert!(SampledMatcher::default().best_match(&screen, &button).unwrap().is_none());
    }
}
