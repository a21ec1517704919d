/// Screen geometry primitives
///
/// `Point` and `BBox` carry no coordinate-space tag of their own. Every API that
/// accepts or returns them documents whether the values are screen-absolute or
/// local to a captured region.
use serde::{Deserialize, Serialize};

/// Integer pixel position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Shift this point by `offset` (local -> absolute conversion)
    pub fn offset(self, offset: Point) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y)
    }
}

/// Axis-aligned rectangle as (left, top, right, bottom)
///
/// Right and bottom are exclusive, so a box's width is `right - left`.
/// Constructed boxes always satisfy `left <= right` and `top <= bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BBox {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl BBox {
    /// Build a box, returning `None` when the edges are inverted
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Option<Self> {
        if left > right || top > bottom {
            return None;
        }
        Some(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Build a box from its top-left corner and size
    pub fn from_origin_size(origin: Point, width: u32, height: u32) -> Self {
        Self {
            left: origin.x,
            top: origin.y,
            right: origin.x + width as i32,
            bottom: origin.y + height as i32,
        }
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn right(&self) -> i32 {
        self.right
    }

    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top) as u32
    }

    /// Top-left corner
    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// Integer-truncated midpoint
    pub fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.left == self.right || self.top == self.bottom
    }

    /// Shrink every edge inwards by the given margins.
    ///
    /// Returns `None` when the margins consume the whole box.
    pub fn shrink(&self, margins: &Margins) -> Option<Self> {
        Self::new(
            self.left + margins.left as i32,
            self.top + margins.top as i32,
            self.right - margins.right as i32,
            self.bottom - margins.bottom as i32,
        )
    }
}

/// Per-edge inset in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Margins {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_offset() {
        let p = Point::new(5, 5).offset(Point::new(10, 10));
        assert_eq!(p, Point::new(15, 15));
    }

    #[test]
    fn test_bbox_rejects_inverted_edges() {
        assert!(BBox::new(10, 0, 5, 10).is_none());
        assert!(BBox::new(0, 10, 10, 5).is_none());
        assert!(BBox::new(3, 3, 3, 3).is_some());
    }

    #[test]
    fn test_bbox_center_truncates() {
        let b = BBox::new(0, 0, 5, 7).unwrap();
        assert_eq!(b.center(), Point::new(2, 3));
    }

    #[test]
    fn test_bbox_from_origin_size() {
        let b = BBox::from_origin_size(Point::new(10, 20), 30, 40);
        assert_eq!((b.left(), b.top(), b.right(), b.bottom()), (10, 20, 40, 60));
        assert_eq!((b.width(), b.height()), (30, 40));
    }

    #[test]
    fn test_bbox_shrink() {
        let anchor = BBox::new(100, 50, 500, 900).unwrap();
        let margins = Margins {
            left: 0,
            top: 120,
            right: 0,
            bottom: 500,
        };
        let play = anchor.shrink(&margins).unwrap();
        assert_eq!((play.left(), play.top(), play.right(), play.bottom()), (100, 170, 500, 400));

        let too_much = Margins {
            top: 600,
            bottom: 600,
            ..Margins::default()
        };
        assert!(anchor.shrink(&too_much).is_none());
    }
}
