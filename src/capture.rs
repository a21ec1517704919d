use crate::error::CaptureError;
use crate::frame::Frame;
use crate::geometry::{BBox, Point};
use image::{imageops, DynamicImage, RgbaImage};
use xcap::Monitor;

/// Source of screen frames
///
/// Implementations must not block waiting for a new frame: when nothing can
/// be delivered they return `None` and the caller drops that iteration.
pub trait ScreenCapture {
    /// Grab `region` (screen-absolute) or the whole screen when `None`.
    fn grab(&mut self, region: Option<BBox>) -> Option<Frame>;

    /// Screen-absolute position of the full-screen frame's top-left pixel
    fn screen_origin(&self) -> Point {
        Point::ORIGIN
    }
}

impl<T: ScreenCapture + ?Sized> ScreenCapture for &mut T {
    fn grab(&mut self, region: Option<BBox>) -> Option<Frame> {
        (**self).grab(region)
    }

    fn screen_origin(&self) -> Point {
        (**self).screen_origin()
    }
}

/// Screen capture of the primary display backed by `xcap`
///
/// # Platform Notes
/// - macOS: requires Screen Recording permission for the terminal or app
/// - Windows: no special permissions required
/// - Linux: X11 works out of the box, Wayland depends on the compositor
///
/// Every grab captures the whole monitor and crops to the requested region.
/// A region hanging off the right or bottom edge is clipped; one starting
/// before the monitor's top-left corner yields no frame, since the frame's
/// first pixel must stay at the region origin.
pub struct MonitorCapture {
    monitor: Monitor,
    origin: Point,
}

impl MonitorCapture {
    /// Open the primary monitor (or the first one if none reports primary)
    pub fn primary() -> Result<Self, CaptureError> {
        let monitors = Monitor::all().map_err(|e| CaptureError::InitFailed(Box::new(e)))?;

        let mut primary = None;
        let mut first = None;
        for monitor in monitors {
            if monitor.is_primary().unwrap_or(false) {
                primary = Some(monitor);
                break;
            }
            if first.is_none() {
                first = Some(monitor);
            }
        }
        let monitor = primary.or(first).ok_or(CaptureError::NoDisplays)?;

        let origin = Point::new(monitor.x().unwrap_or(0), monitor.y().unwrap_or(0));
        tracing::info!(
            "Capturing monitor '{}' at ({}, {}) {}x{}",
            monitor.name().unwrap_or_else(|_| "Unknown".to_string()),
            origin.x,
            origin.y,
            monitor.width().unwrap_or(0),
            monitor.height().unwrap_or(0)
        );

        Ok(Self { monitor, origin })
    }
}

impl ScreenCapture for MonitorCapture {
    fn grab(&mut self, region: Option<BBox>) -> Option<Frame> {
        let image = match self.monitor.capture_image() {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!("Screen capture failed: {}", e);
                return None;
            }
        };

        match region {
            None => Some(to_frame(image)),
            Some(region) => {
                let (x, y, w, h) = clip_region(region, self.origin, image.width(), image.height())?;
                Some(to_frame(imageops::crop_imm(&image, x, y, w, h).to_image()))
            }
        }
    }

    fn screen_origin(&self) -> Point {
        self.origin
    }
}

fn to_frame(image: RgbaImage) -> Frame {
    DynamicImage::ImageRgba8(image).to_rgb8()
}

/// Translate a screen-absolute region into monitor pixels and clip it.
///
/// Returns `(x, y, width, height)`, or `None` when the region starts
/// outside this monitor or is empty after clipping.
fn clip_region(region: BBox, origin: Point, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let left = region.left() - origin.x;
    let top = region.top() - origin.y;
    if left < 0 || top < 0 {
        return None;
    }
    let right = (region.right() - origin.x).clamp(0, width as i32);
    let bottom = (region.bottom() - origin.y).clamp(0, height as i32);

    if right <= left || bottom <= top {
        return None;
    }
    Some((left as u32, top as u32, (right - left) as u32, (bottom - top) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_region_inside() {
        let region = BBox::new(10, 20, 310, 170).unwrap();
        assert_eq!(
            clip_region(region, Point::ORIGIN, 1920, 1080),
            Some((10, 20, 300, 150))
        );
    }

    #[test]
    fn test_clip_region_respects_monitor_origin() {
        let region = BBox::new(110, 220, 210, 320).unwrap();
        assert_eq!(
            clip_region(region, Point::new(100, 200), 800, 600),
            Some((10, 20, 100, 100))
        );
    }

    #[test]
    fn test_clip_region_partially_offscreen() {
        let region = BBox::new(1900, 1000, 2000, 1200).unwrap();
        assert_eq!(
            clip_region(region, Point::ORIGIN, 1920, 1080),
            Some((1900, 1000, 20, 80))
        );
    }

    #[test]
    fn test_clip_region_offscreen_or_empty() {
        let outside = BBox::new(2000, 0, 2100, 100).unwrap();
        assert_eq!(clip_region(outside, Point::ORIGIN, 1920, 1080), None);

        let before_origin = BBox::new(-10, 0, 100, 100).unwrap();
        assert_eq!(clip_region(before_origin, Point::ORIGIN, 1920, 1080), None);

        let empty = BBox::new(50, 50, 50, 80).unwrap();
        assert_eq!(clip_region(empty, Point::ORIGIN, 1920, 1080), None);
    }
}
