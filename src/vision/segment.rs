/// Colour segmentation into connected regions
///
/// Pixels are thresholded against inclusive HSV ranges, and each foreground
/// blob is reported by its outer boundary only: holes and anything nested
/// inside a hole belong to the enclosing region. Foreground uses
/// 8-connectivity, background 4-connectivity.
use crate::frame::{ColorRange, Frame, HsvImage};
use crate::geometry::Point;
use serde::{Deserialize, Serialize};

/// How multiple colour ranges are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationMode {
    /// OR all range masks first; touching blobs of different colours merge
    #[default]
    Combined,
    /// Extract regions per range; touching blobs of different colours stay apart
    Separate,
}

/// Connected set of pixels from one segmentation pass.
///
/// Coordinates are local to the segmented frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pixels: Vec<Point>,
}

impl Region {
    pub(crate) fn from_pixels(pixels: Vec<Point>) -> Self {
        Self { pixels }
    }

    /// Pixel count (zeroth raster moment)
    pub fn area(&self) -> u64 {
        self.pixels.len() as u64
    }

    /// First raster moments (sum of x, sum of y)
    pub fn first_moments(&self) -> (u64, u64) {
        self.pixels.iter().fold((0, 0), |(mx, my), p| {
            (mx + p.x as u64, my + p.y as u64)
        })
    }
}

/// Binary foreground mask, row-major
struct Mask {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Mask {
    fn in_range(hsv: &HsvImage, range: &ColorRange) -> Self {
        Self {
            width: hsv.width() as usize,
            height: hsv.height() as usize,
            bits: hsv.pixels().iter().map(|&px| range.contains(px)).collect(),
        }
    }

    fn union(mut self, other: &Mask) -> Self {
        for (a, &b) in self.bits.iter_mut().zip(&other.bits) {
            *a |= b;
        }
        self
    }

    /// Foreground plus every background pixel not reachable from the border
    fn fill_holes(&self) -> Mask {
        let (w, h) = (self.width, self.height);
        let mut outside = vec![false; w * h];
        let mut stack = Vec::new();

        let seed = |x: usize, y: usize, outside: &mut [bool], stack: &mut Vec<usize>| {
            let i = y * w + x;
            if !self.bits[i] && !outside[i] {
                outside[i] = true;
                stack.push(i);
            }
        };
        for x in 0..w {
            seed(x, 0, &mut outside, &mut stack);
            seed(x, h - 1, &mut outside, &mut stack);
        }
        for y in 0..h {
            seed(0, y, &mut outside, &mut stack);
            seed(w - 1, y, &mut outside, &mut stack);
        }

        while let Some(i) = stack.pop() {
            let (x, y) = (i % w, i / w);
            let neighbours = [
                (x > 0).then(|| i - 1),
                (x + 1 < w).then(|| i + 1),
                (y > 0).then(|| i - w),
                (y + 1 < h).then(|| i + w),
            ];
            for n in neighbours.into_iter().flatten() {
                if !self.bits[n] && !outside[n] {
                    outside[n] = true;
                    stack.push(n);
                }
            }
        }

        Mask {
            width: w,
            height: h,
            bits: outside.into_iter().map(|o| !o).collect(),
        }
    }

    /// 8-connected components, ordered by their first pixel in raster order
    fn components(&self) -> Vec<Region> {
        let (w, h) = (self.width, self.height);
        let mut visited = vec![false; w * h];
        let mut regions = Vec::new();
        let mut stack = Vec::new();

        for start in 0..w * h {
            if !self.bits[start] || visited[start] {
                continue;
            }

            visited[start] = true;
            stack.push(start);
            let mut pixels = Vec::new();

            while let Some(i) = stack.pop() {
                let (x, y) = (i % w, i / w);
                pixels.push(Point::new(x as i32, y as i32));

                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as i32 + dx;
                        let ny = y as i32 + dy;
                        if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                            continue;
                        }
                        let n = ny as usize * w + nx as usize;
                        if self.bits[n] && !visited[n] {
                            visited[n] = true;
                            stack.push(n);
                        }
                    }
                }
            }

            regions.push(Region::from_pixels(pixels));
        }

        regions
    }

    fn outer_regions(&self) -> Vec<Region> {
        if self.width == 0 || self.height == 0 {
            return Vec::new();
        }
        self.fill_holes().components()
    }
}

/// Extract regions matching `ranges` from an RGB frame
pub fn segment(frame: &Frame, ranges: &[ColorRange], mode: SegmentationMode) -> Vec<Region> {
    segment_hsv(&HsvImage::from_frame(frame), ranges, mode)
}

/// Extract regions from a frame already converted to HSV.
///
/// Lets callers convert once and segment several categories of the same frame.
pub fn segment_hsv(hsv: &HsvImage, ranges: &[ColorRange], mode: SegmentationMode) -> Vec<Region> {
    let masks = ranges.iter().map(|range| Mask::in_range(hsv, range));

    match mode {
        SegmentationMode::Combined => masks
            .reduce(|acc, mask| acc.union(&mask))
            .map(|mask| mask.outer_regions())
            .unwrap_or_default(),
        SegmentationMode::Separate => masks.flat_map(|mask| mask.outer_regions()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Hsv;
    use image::Rgb;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn red_range() -> ColorRange {
        ColorRange::new(Hsv::new(0, 200, 200), Hsv::new(5, 255, 255)).unwrap()
    }

    fn green_range() -> ColorRange {
        ColorRange::new(Hsv::new(55, 200, 200), Hsv::new(65, 255, 255)).unwrap()
    }

    fn fill(frame: &mut Frame, x0: u32, y0: u32, w: u32, h: u32, colour: Rgb<u8>) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                frame.put_pixel(x, y, colour);
            }
        }
    }

    #[test]
    fn test_single_square() {
        let mut frame = Frame::from_pixel(32, 32, BLACK);
        fill(&mut frame, 4, 6, 10, 8, RED);

        let regions = segment(&frame, &[red_range()], SegmentationMode::Combined);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area(), 80);
        // x 4..14 over 8 rows, y 6..14 over 10 columns
        assert_eq!(regions[0].first_moments(), (680, 760));
    }

    #[test]
    fn test_no_ranges_yields_nothing() {
        let frame = Frame::from_pixel(8, 8, RED);
        assert!(segment(&frame, &[], SegmentationMode::Combined).is_empty());
        assert!(segment(&frame, &[], SegmentationMode::Separate).is_empty());
    }

    #[test]
    fn test_hole_is_not_a_separate_region() {
        let mut frame = Frame::from_pixel(20, 20, BLACK);
        fill(&mut frame, 2, 2, 10, 10, RED);
        fill(&mut frame, 5, 5, 4, 4, BLACK);

        let regions = segment(&frame, &[red_range()], SegmentationMode::Combined);
        assert_eq!(regions.len(), 1);
        // Outer boundary encloses the hole
        assert_eq!(regions[0].area(), 100);
    }

    #[test]
    fn test_nested_blob_absorbed_by_outer_region() {
        let mut frame = Frame::from_pixel(20, 20, BLACK);
        fill(&mut frame, 2, 2, 12, 12, RED);
        fill(&mut frame, 4, 4, 8, 8, BLACK);
        fill(&mut frame, 7, 7, 2, 2, RED);

        let regions = segment(&frame, &[red_range()], SegmentationMode::Combined);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area(), 144);
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let mut frame = Frame::from_pixel(6, 6, BLACK);
        frame.put_pixel(1, 1, RED);
        frame.put_pixel(2, 2, RED);
        frame.put_pixel(3, 3, RED);

        let regions = segment(&frame, &[red_range()], SegmentationMode::Combined);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area(), 3);
    }

    #[test]
    fn test_modes_diverge_on_touching_blobs() {
        let mut frame = Frame::from_pixel(40, 20, BLACK);
        fill(&mut frame, 5, 5, 10, 10, RED);
        fill(&mut frame, 15, 5, 10, 10, GREEN);
        let ranges = [red_range(), green_range()];

        let combined = segment(&frame, &ranges, SegmentationMode::Combined);
        let separate = segment(&frame, &ranges, SegmentationMode::Separate);

        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].area(), 200);
        assert_eq!(separate.len(), 2);
        assert!(separate.iter().all(|r| r.area() == 100));
    }

    #[test]
    fn test_regions_in_raster_order() {
        let mut frame = Frame::from_pixel(30, 30, BLACK);
        fill(&mut frame, 20, 2, 3, 3, RED);
        fill(&mut frame, 2, 10, 3, 3, RED);

        let regions = segment(&frame, &[red_range()], SegmentationMode::Combined);
        assert_eq!(regions.len(), 2);
        // Upper blob first even though it lies further right
        assert_eq!(regions[0].first_moments(), (189, 27));
        assert_eq!(regions[1].first_moments(), (27, 99));
    }

    #[test]
    fn test_blob_touching_border() {
        let mut frame = Frame::from_pixel(10, 10, BLACK);
        fill(&mut frame, 0, 0, 4, 10, RED);

        let regions = segment(&frame, &[red_range()], SegmentationMode::Separate);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area(), 40);
    }

    #[test]
    fn test_empty_region_has_zero_moments() {
        let region = Region::from_pixels(Vec::new());
        assert_eq!(region.area(), 0);
        assert_eq!(region.first_moments(), (0, 0));
    }
}
