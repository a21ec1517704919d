/// Captured pixel buffers and colour-space conversion
///
/// A `Frame` is one capture of one screen region at one instant. It is created
/// per capture call and dropped after a single pass through the pipeline.
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Three-channel RGB pixel buffer
pub type Frame = RgbImage;

/// Hue/saturation/value triple in the 8-bit convention:
/// hue in `0..180` (degrees halved), saturation and value in `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// Inclusive lower/upper HSV bound.
///
/// Hue is compared as a plain number, so a range never wraps around red.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl ColorRange {
    /// Build a range, returning `None` if any lower channel exceeds its upper one
    pub fn new(lower: Hsv, upper: Hsv) -> Option<Self> {
        let range = Self { lower, upper };
        range.is_valid().then_some(range)
    }

    /// Per-channel `lower <= upper`
    pub fn is_valid(&self) -> bool {
        self.lower.h <= self.upper.h && self.lower.s <= self.upper.s && self.lower.v <= self.upper.v
    }

    pub fn contains(&self, px: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&px.h)
            && (self.lower.s..=self.upper.s).contains(&px.s)
            && (self.lower.v..=self.upper.v).contains(&px.v)
    }
}

/// Frame converted to HSV, row-major
#[derive(Debug, Clone)]
pub struct HsvImage {
    width: u32,
    height: u32,
    pixels: Vec<Hsv>,
}

impl HsvImage {
    pub fn from_frame(frame: &Frame) -> Self {
        let pixels = frame
            .pixels()
            .map(|p| rgb_to_hsv(p[0], p[1], p[2]))
            .collect();
        Self {
            width: frame.width(),
            height: frame.height(),
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Hsv] {
        &self.pixels
    }
}

const HSV_SHIFT: i32 = 12;
const HSV_ROUND: i32 = 1 << (HSV_SHIFT - 1);

struct DivTables {
    sat: [i32; 256],
    hue: [i32; 256],
}

fn div_tables() -> &'static DivTables {
    static TABLES: OnceLock<DivTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut sat = [0i32; 256];
        let mut hue = [0i32; 256];
        for i in 1..256 {
            sat[i] = ((255 << HSV_SHIFT) as f64 / i as f64).round() as i32;
            hue[i] = ((180 << HSV_SHIFT) as f64 / (6 * i) as f64).round() as i32;
        }
        DivTables { sat, hue }
    })
}

/// Fixed-point RGB -> HSV with half-degree hue.
///
/// Uses the same rounding tables as the common 8-bit vision convention so the
/// colour ranges tuned against reference screenshots keep their meaning.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let tables = div_tables();
    let (r, g, b) = (r as i32, g as i32, b as i32);

    let v = r.max(g).max(b);
    let vmin = r.min(g).min(b);
    let diff = v - vmin;

    let h = if v == r {
        g - b
    } else if v == g {
        b - r + 2 * diff
    } else {
        r - g + 4 * diff
    };

    let s = (diff * tables.sat[v as usize] + HSV_ROUND) >> HSV_SHIFT;
    let mut h = (h * tables.hue[diff as usize] + HSV_ROUND) >> HSV_SHIFT;
    if h < 0 {
        h += 180;
    }

    Hsv::new(h as u8, s as u8, v as u8)
}
