use crate::shared::frame::Frame;
use crate::shared::geometry::PixelRect;
use crate::shared::BoxError;

/// Domain interface for face classification on a single frame.
///
/// Returns candidate face rectangles in the frame's pixel coordinates,
/// strongest first; objects smaller than `min_size` pixels per side are
/// not reported. Runs on the locator's worker thread, hence `Send`.
pub trait FaceClassifier: Send {
    fn scan(&mut self, frame: &Frame, min_size: u32) -> Result<Vec<PixelRect>, BoxError>;
}
