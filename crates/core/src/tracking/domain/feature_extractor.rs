use crate::shared::frame::Frame;
use crate::shared::geometry::PixelRect;
use crate::shared::BoxError;
use crate::tracking::domain::feature_points::FeaturePoints;

/// Domain interface for corner extraction.
///
/// Fills `out` with up to `FeaturePoints::CAPACITY` sub-pixel refined
/// points found inside `region` of the grayscale `image`. Coordinates are
/// relative to the region's top-left corner.
pub trait FeatureExtractor: Send {
    fn extract(
        &mut self,
        image: &Frame,
        region: PixelRect,
        out: &mut FeaturePoints,
    ) -> Result<(), BoxError>;
}
