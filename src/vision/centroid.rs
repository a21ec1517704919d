/// Region -> click point reduction
use super::segment::Region;
use crate::geometry::Point;

/// Centroid of `region` if its area is strictly greater than `min_area`.
///
/// Area is the pixel count, the centroid the first moments divided by area,
/// truncated to integers. Empty regions yield `None`. The returned point is
/// in the same local coordinates as the segmented frame.
pub fn centroid_if_large_enough(region: &Region, min_area: u64) -> Option<Point> {
    let area = region.area();
    if area == 0 || area <= min_area {
        return None;
    }

    let (mx, my) = region.first_moments();
    Some(Point::new((mx / area) as i32, (my / area) as i32))
}

/// Click points for every region that clears `min_area`, keeping region order
pub fn click_points(regions: &[Region], min_area: u64) -> Vec<Point> {
    regions
        .iter()
        .filter_map(|region| centroid_if_large_enough(region, min_area))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: i32, y0: i32, side: i32) -> Region {
        let pixels = (y0..y0 + side)
            .flat_map(|y| (x0..x0 + side).map(move |x| Point::new(x, y)))
            .collect();
        Region::from_pixels(pixels)
    }

    #[test]
    fn test_zero_area_guard() {
        let empty = Region::from_pixels(Vec::new());
        assert_eq!(centroid_if_large_enough(&empty, 0), None);
    }

    #[test]
    fn test_area_must_exceed_threshold() {
        let region = square(0, 0, 10);
        assert_eq!(centroid_if_large_enough(&region, 100), None);
        assert!(centroid_if_large_enough(&region, 99).is_some());
    }

    #[test]
    fn test_centroid_truncates() {
        // x in 10..30 averages 19.5, truncated to 19
        let region = square(10, 10, 20);
        assert_eq!(centroid_if_large_enough(&region, 200), Some(Point::new(19, 19)));
    }

    #[test]
    fn test_click_points_filters_small_regions() {
        let regions = vec![square(0, 0, 3), square(10, 10, 5), square(30, 0, 2)];
        assert_eq!(click_points(&regions, 8), vec![Point::new(1, 1), Point::new(12, 12)]);
    }
}
