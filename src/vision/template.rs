/// Template matching with normalized correlation coefficient
///
/// Scores every equally-sized window of the frame against the template using
/// the zero-mean normalized cross-correlation summed over the three colour
/// channels (`1.0` for a pixel-identical window, `0.0` for flat windows).
///
/// The default search is exhaustive. Large searches can opt into a
/// coarse-to-fine pyramid: both images are downscaled, the coarse score map
/// picks a handful of candidates, and each candidate is re-scored at full
/// resolution in its neighbourhood. That search is approximate and may settle
/// on a decoy window, so `locate` falls back to the exhaustive search whenever
/// the pyramid's best window is below the requested similarity.
///
/// Rows of the score map are spread over the rayon pool, but every call
/// returns only once the whole search is done: callers see a plain blocking
/// function and the game loop stays sequential.
use crate::frame::Frame;
use crate::geometry::{BBox, Point};
use image::imageops::{self, FilterType};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Coarse levels are skipped once the downscaled template's short side
/// would drop below this many pixels.
const MIN_COARSE_SIDE: u32 = 8;

/// Exhaustive searches below this many multiply-adds never use the pyramid.
const EXHAUSTIVE_BUDGET: u64 = 50_000_000;

/// Template matcher tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Maximum number of 2x downscale levels (0 = always exhaustive, the
    /// default). Non-zero levels trade exactness for speed on large searches.
    pub pyramid_levels: u32,
    /// Coarse candidates refined at full resolution
    pub refine_candidates: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self::exhaustive()
    }
}

impl MatcherConfig {
    /// Configuration that scores every window at full resolution
    pub fn exhaustive() -> Self {
        Self {
            pyramid_levels: 0,
            refine_candidates: 4,
        }
    }

    /// Approximate coarse-to-fine search with `levels` 2x downscales
    pub fn pyramid(levels: u32) -> Self {
        Self {
            pyramid_levels: levels,
            ..Self::exhaustive()
        }
    }
}

/// Best-scoring window of a search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchScore {
    /// Top-left corner, local to the searched frame
    pub location: Point,
    pub score: f64,
}

/// Locates a reference image inside a captured frame
#[derive(Debug, Clone, Default)]
pub struct TemplateMatcher {
    config: MatcherConfig,
}

impl TemplateMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Locate `template` inside `frame`.
    ///
    /// Returns the box of the best window shifted by `offset` (pass the frame's
    /// screen origin to get screen-absolute coordinates), or `None` when the
    /// best score is below `min_similarity` or the template does not fit.
    pub fn locate(
        &self,
        frame: &Frame,
        template: &Frame,
        min_similarity: f64,
        offset: Point,
    ) -> Option<BBox> {
        let mut best = self.best_match(frame, template)?;
        if best.score < min_similarity && self.effective_levels(frame, template) > 0 {
            tracing::trace!(
                "Pyramid best {:.4} below {:.4}, rescoring exhaustively",
                best.score,
                min_similarity
            );
            best = SearchSpace::new(frame, template).exhaustive()?;
        }
        tracing::trace!(
            "Best template score {:.4} at ({}, {})",
            best.score,
            best.location.x,
            best.location.y
        );

        if best.score < min_similarity {
            return None;
        }

        Some(BBox::from_origin_size(
            best.location.offset(offset),
            template.width(),
            template.height(),
        ))
    }

    /// Highest-scoring window, first in raster order on ties.
    ///
    /// Exact with the default configuration; with pyramid levels enabled the
    /// result on large searches is the best window among the refined coarse
    /// candidates. Returns `None` when the template is empty or larger than
    /// the frame.
    pub fn best_match(&self, frame: &Frame, template: &Frame) -> Option<MatchScore> {
        if !fits(frame, template) {
            return None;
        }

        let levels = self.effective_levels(frame, template);
        if levels == 0 {
            return SearchSpace::new(frame, template).exhaustive();
        }

        let factor = 1u32 << levels;
        let coarse_frame = downscale(frame, factor);
        let coarse_template = downscale(template, factor);
        let coarse = SearchSpace::new(&coarse_frame, &coarse_template);
        let candidates = coarse.top_candidates(self.config.refine_candidates.max(1), 2);

        let full = SearchSpace::new(frame, template);
        let max_x = frame.width() - template.width();
        let max_y = frame.height() - template.height();
        let radius = factor as i32;

        let mut best: Option<MatchScore> = None;
        for candidate in candidates {
            let cx = candidate.location.x * factor as i32;
            let cy = candidate.location.y * factor as i32;
            let x0 = (cx - radius).max(0) as u32;
            let y0 = (cy - radius).max(0) as u32;
            let x1 = ((cx + radius) as u32).min(max_x);
            let y1 = ((cy + radius) as u32).min(max_y);

            if let Some(refined) = full.search(x0..=x1, y0..=y1) {
                if best.map_or(true, |b| is_better(&refined, &b)) {
                    best = Some(refined);
                }
            }
        }

        best
    }

    fn effective_levels(&self, frame: &Frame, template: &Frame) -> u32 {
        let positions = (frame.width() - template.width() + 1) as u64
            * (frame.height() - template.height() + 1) as u64;
        let cost = positions * (template.width() * template.height()) as u64 * 3;
        if cost <= EXHAUSTIVE_BUDGET {
            return 0;
        }

        let short_side = template.width().min(template.height());
        let mut levels = 0;
        while levels < self.config.pyramid_levels && (short_side >> (levels + 1)) >= MIN_COARSE_SIDE {
            levels += 1;
        }
        levels
    }
}

fn fits(frame: &Frame, template: &Frame) -> bool {
    template.width() > 0
        && template.height() > 0
        && template.width() <= frame.width()
        && template.height() <= frame.height()
}

fn downscale(image: &Frame, factor: u32) -> Frame {
    let width = (image.width() / factor).max(1);
    let height = (image.height() / factor).max(1);
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Higher score wins; equal scores prefer the earlier raster position
fn is_better(candidate: &MatchScore, current: &MatchScore) -> bool {
    candidate.score > current.score
        || (candidate.score == current.score
            && (candidate.location.y, candidate.location.x) < (current.location.y, current.location.x))
}

/// Summed-area tables of pixel values and squared values per channel
struct Integral {
    stride: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl Integral {
    fn new(frame: &Frame) -> Self {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1) * 3];
        let mut sq_sum = vec![0u64; stride * (h + 1) * 3];
        let raw = frame.as_raw();

        for y in 0..h {
            let mut row_sum = [0u64; 3];
            let mut row_sq = [0u64; 3];
            for x in 0..w {
                let px = (y * w + x) * 3;
                let above = (y * stride + x + 1) * 3;
                let here = ((y + 1) * stride + x + 1) * 3;
                for c in 0..3 {
                    let v = raw[px + c] as u64;
                    row_sum[c] += v;
                    row_sq[c] += v * v;
                    sum[here + c] = sum[above + c] + row_sum[c];
                    sq_sum[here + c] = sq_sum[above + c] + row_sq[c];
                }
            }
        }

        Self { stride, sum, sq_sum }
    }

    fn rect(table: &[u64], stride: usize, x: usize, y: usize, w: usize, h: usize, c: usize) -> u64 {
        let at = |xx: usize, yy: usize| table[(yy * stride + xx) * 3 + c];
        at(x + w, y + h) + at(x, y) - at(x + w, y) - at(x, y + h)
    }

    /// Sum over channels of the window's squared deviation from its mean
    fn window_variance(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let n = (w * h) as f64;
        (0..3)
            .map(|c| {
                let s = Self::rect(&self.sum, self.stride, x, y, w, h, c) as f64;
                let s2 = Self::rect(&self.sq_sum, self.stride, x, y, w, h, c) as f64;
                s2 - s * s / n
            })
            .sum::<f64>()
            .max(0.0)
    }
}

struct SearchSpace<'a> {
    frame: &'a Frame,
    integral: Integral,
    /// Zero-mean template values, interleaved RGB
    centered: Vec<f64>,
    template_norm2: f64,
    tw: usize,
    th: usize,
}

impl<'a> SearchSpace<'a> {
    fn new(frame: &'a Frame, template: &Frame) -> Self {
        let (tw, th) = (template.width() as usize, template.height() as usize);
        let raw = template.as_raw();
        let n = (tw * th) as f64;

        let mut means = [0f64; 3];
        for px in raw.chunks_exact(3) {
            for c in 0..3 {
                means[c] += px[c] as f64;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let centered: Vec<f64> = raw
            .iter()
            .enumerate()
            .map(|(i, &v)| v as f64 - means[i % 3])
            .collect();
        let template_norm2 = centered.iter().map(|v| v * v).sum();

        Self {
            frame,
            integral: Integral::new(frame),
            centered,
            template_norm2,
            tw,
            th,
        }
    }

    fn score_at(&self, x: usize, y: usize) -> f64 {
        let fw = self.frame.width() as usize;
        let raw = self.frame.as_raw();
        let row_len = self.tw * 3;

        let mut num = 0f64;
        for j in 0..self.th {
            let frame_row = &raw[((y + j) * fw + x) * 3..][..row_len];
            let templ_row = &self.centered[j * row_len..][..row_len];
            num += frame_row
                .iter()
                .zip(templ_row)
                .map(|(&f, &t)| f as f64 * t)
                .sum::<f64>();
        }

        let t = (self.integral.window_variance(x, y, self.tw, self.th) * self.template_norm2).sqrt();
        if num.abs() < t {
            num / t
        } else if num.abs() < t * 1.125 {
            num.signum()
        } else {
            0.0
        }
    }

    fn search(
        &self,
        xs: std::ops::RangeInclusive<u32>,
        ys: std::ops::RangeInclusive<u32>,
    ) -> Option<MatchScore> {
        let rows: Vec<Option<MatchScore>> = ys
            .into_par_iter()
            .map(|y| {
                let mut best: Option<MatchScore> = None;
                for x in xs.clone() {
                    let score = self.score_at(x as usize, y as usize);
                    if best.map_or(true, |b| score > b.score) {
                        best = Some(MatchScore {
                            location: Point::new(x as i32, y as i32),
                            score,
                        });
                    }
                }
                best
            })
            .collect();

        // Rows come back in order, so strict comparison keeps the first maximum
        rows.into_iter()
            .flatten()
            .fold(None, |best: Option<MatchScore>, row| match best {
                Some(b) if row.score <= b.score => Some(b),
                _ => Some(row),
            })
    }

    fn exhaustive(&self) -> Option<MatchScore> {
        let max_x = (self.frame.width() as usize - self.tw) as u32;
        let max_y = (self.frame.height() as usize - self.th) as u32;
        self.search(0..=max_x, 0..=max_y)
    }

    /// Up to `count` best positions, each at least `spacing` apart on some axis
    fn top_candidates(&self, count: usize, spacing: i32) -> Vec<MatchScore> {
        let max_x = (self.frame.width() as usize - self.tw) as i32;
        let max_y = (self.frame.height() as usize - self.th) as i32;

        let mut scored: Vec<MatchScore> = (0..=max_y)
            .into_par_iter()
            .flat_map_iter(|y| {
                (0..=max_x).map(move |x| MatchScore {
                    location: Point::new(x, y),
                    score: self.score_at(x as usize, y as usize),
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| (a.location.y, a.location.x).cmp(&(b.location.y, b.location.x)))
        });

        let mut picked: Vec<MatchScore> = Vec::with_capacity(count);
        for candidate in scored {
            let far_enough = picked.iter().all(|p| {
                (p.location.x - candidate.location.x).abs() > spacing
                    || (p.location.y - candidate.location.y).abs() > spacing
            });
            if far_enough {
                picked.push(candidate);
                if picked.len() == count {
                    break;
                }
            }
        }
        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Deterministic textured frame so every window is distinct
    fn textured_frame(width: u32, height: u32) -> Frame {
        Frame::from_fn(width, height, |x, y| {
            let v = (x * 37 + y * 91 + x * y * 7) % 251;
            Rgb([v as u8, ((v * 3) % 256) as u8, ((x * 11 + y * 5) % 256) as u8])
        })
    }

    /// Low-frequency pattern that survives downscaling
    fn smooth_frame(width: u32, height: u32) -> Frame {
        Frame::from_fn(width, height, |x, y| {
            let (fx, fy) = (x as f64, y as f64);
            let r = 128.0 + 100.0 * (fx / 13.0).sin() * (fy / 17.0).cos();
            let g = 128.0 + 100.0 * ((fx + fy) / 23.0).sin();
            let b = 128.0 + 100.0 * (fx / 19.0 - fy / 11.0).cos();
            Rgb([r as u8, g as u8, b as u8])
        })
    }

    fn crop(frame: &Frame, x: u32, y: u32, w: u32, h: u32) -> Frame {
        imageops::crop_imm(frame, x, y, w, h).to_image()
    }

    #[test]
    fn test_exact_match_found() {
        let frame = textured_frame(60, 40);
        let template = crop(&frame, 17, 9, 12, 10);
        let matcher = TemplateMatcher::new(MatcherConfig::exhaustive());

        let best = matcher.best_match(&frame, &template).unwrap();
        assert_eq!(best.location, Point::new(17, 9));
        assert!(best.score > 0.9999);

        let found = matcher.locate(&frame, &template, 0.99, Point::ORIGIN).unwrap();
        assert_eq!(found, BBox::new(17, 9, 29, 19).unwrap());
    }

    #[test]
    fn test_offset_shifts_result() {
        let frame = textured_frame(30, 30);
        let template = crop(&frame, 5, 6, 8, 8);
        let matcher = TemplateMatcher::new(MatcherConfig::exhaustive());

        let found = matcher
            .locate(&frame, &template, 0.9, Point::new(100, 200))
            .unwrap();
        assert_eq!(found, BBox::new(105, 206, 113, 214).unwrap());
    }

    #[test]
    fn test_template_larger_than_frame() {
        let frame = textured_frame(10, 10);
        let template = textured_frame(11, 5);
        let matcher = TemplateMatcher::default();

        assert!(matcher.best_match(&frame, &template).is_none());
        assert!(matcher.locate(&frame, &template, 0.0, Point::ORIGIN).is_none());
    }

    #[test]
    fn test_flat_template_scores_zero() {
        let frame = textured_frame(20, 20);
        let template = Frame::from_pixel(4, 4, Rgb([50, 50, 50]));
        let matcher = TemplateMatcher::new(MatcherConfig::exhaustive());

        let best = matcher.best_match(&frame, &template).unwrap();
        assert_eq!(best.score, 0.0);
        assert!(matcher.locate(&frame, &template, 0.5, Point::ORIGIN).is_none());
    }

    #[test]
    fn test_threshold_above_best_score_misses() {
        let frame = textured_frame(40, 40);
        let mut template = crop(&frame, 10, 10, 10, 10);
        template.put_pixel(3, 3, Rgb([255, 0, 255]));
        let matcher = TemplateMatcher::new(MatcherConfig::exhaustive());

        let best = matcher.best_match(&frame, &template).unwrap();
        assert!(best.score < 1.0);
        assert!(matcher.locate(&frame, &template, best.score, Point::ORIGIN).is_some());
        assert!(matcher
            .locate(&frame, &template, best.score + 1e-6, Point::ORIGIN)
            .is_none());
    }

    #[test]
    fn test_pyramid_finds_exact_match() {
        let frame = smooth_frame(400, 300);
        let template = crop(&frame, 213, 141, 64, 48);
        let matcher = TemplateMatcher::new(MatcherConfig::pyramid(2));

        assert!(matcher.effective_levels(&frame, &template) > 0);
        let best = matcher.best_match(&frame, &template).unwrap();
        assert_eq!(best.location, Point::new(213, 141));
        assert!(best.score > 0.9999);
    }

    #[test]
    fn test_default_config_is_exhaustive() {
        let frame = smooth_frame(400, 300);
        let template = crop(&frame, 213, 141, 64, 48);

        assert_eq!(MatcherConfig::default(), MatcherConfig::exhaustive());
        assert_eq!(TemplateMatcher::default().effective_levels(&frame, &template), 0);
    }

    #[test]
    fn test_matching_is_deterministic() {
        let frame = textured_frame(50, 50);
        let template = crop(&frame, 20, 20, 9, 9);
        let matcher = TemplateMatcher::default();

        let first = matcher.best_match(&frame, &template);
        let second = matcher.best_match(&frame, &template);
        assert_eq!(first, second);
    }
}
