use crate::shared::geometry::{Point2f, Rect2f};
use crate::tracking::domain::feature_points::FeaturePoints;

/// Turns one optical-flow step into a velocity.
///
/// A point survives when the tracker found it AND its previous position lay
/// inside `rect`. Survivors stay in `points` at their tracked positions,
/// compacted in order. The velocity is the mean displacement
/// `new - previous` over survivors, exactly zero when none survive.
pub fn estimate_motion(
    points: &mut FeaturePoints,
    tracked: &[Point2f],
    status: &[bool],
    rect: Rect2f,
) -> Point2f {
    debug_assert_eq!(points.len(), tracked.len());
    debug_assert_eq!(points.len(), status.len());

    let mut sum = Point2f::ZERO;
    let survivors = points.retain_map(|i, previous| {
        if !status[i] || !rect.contains(previous) {
            return None;
        }
        sum = sum + (tracked[i] - previous);
        Some(tracked[i])
    });

    if survivors == 0 {
        return Point2f::ZERO;
    }
    let n = survivors as f32;
    Point2f::new(sum.x / n, sum.y / n)
}
