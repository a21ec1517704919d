/// Vision module
///
/// Pure per-frame functions: no state survives between calls.
///
/// ## Pipeline
///
/// ```text
/// Frame
///   ├── template::TemplateMatcher   (anchor / start / round-end controls)
///   └── segment::segment            (HSV ranges -> Regions)
///         └── centroid::centroid_if_large_enough  (Region -> click Point)
/// ```
pub mod centroid;
pub mod segment;
pub mod template;

pub use centroid::{centroid_if_large_enough, click_points};
pub use segment::{segment, segment_hsv, Region, SegmentationMode};
pub use template::{MatchScore, MatcherConfig, TemplateMatcher};
