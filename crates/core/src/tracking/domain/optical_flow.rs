use crate::shared::frame::Frame;
use crate::shared::geometry::{PixelRect, Point2f};
use crate::shared::BoxError;

/// Domain interface for sparse optical flow between two grayscale frames.
///
/// `points`, `tracked` and `status` have the same length. On return
/// `tracked[i]` holds the position of `points[i]` in `current` and
/// `status[i]` tells whether it was found. Both frames share the same
/// dimensions; `region` limits the search to the tracking rectangle.
pub trait OpticalFlowTracker: Send {
    fn track(
        &mut self,
        previous: &Frame,
        current: &Frame,
        region: PixelRect,
        points: &[Point2f],
        tracked: &mut [Point2f],
        status: &mut [bool],
    ) -> Result<(), BoxError>;
}
