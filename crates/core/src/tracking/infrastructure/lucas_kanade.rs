use crate::shared::constants::{
    FLOW_EPSILON, FLOW_HALF_WINDOW, FLOW_MAX_ITERATIONS, FLOW_PYRAMID_LEVELS,
};
use crate::shared::frame::Frame;
use crate::shared::geometry::{FrameSize, PixelRect, Point2f};
use crate::shared::BoxError;
use crate::tracking::domain::optical_flow::OpticalFlowTracker;
use crate::tracking::infrastructure::plane::Plane;

/// Smallest pyramid level side worth tracking on.
const MIN_LEVEL_SIDE: usize = 16;

/// Determinant below which the gradient matrix counts as singular.
const MIN_DETERMINANT: f32 = 1e-6;

enum Step {
    Converged(Point2f),
    Singular,
}

/// Pyramidal forward-additive Lucas–Kanade tracker.
///
/// Both frames are cropped to the tracking region before the pyramids are
/// built, so nothing outside the region influences the result. A point is
/// lost when its gradient matrix is singular on any level or when its final
/// position leaves the region.
pub struct LucasKanadeTracker {
    half_window: i32,
    max_iterations: usize,
    epsilon: f32,
    max_levels: usize,
    previous: Vec<Plane>,
    current: Vec<Plane>,
}

impl LucasKanadeTracker {
    pub fn new(half_window: i32, max_iterations: usize, epsilon: f32, max_levels: usize) -> Self {
        Self {
            half_window,
            max_iterations,
            epsilon,
            max_levels,
            previous: Vec::new(),
            current: Vec::new(),
        }
    }

    fn build_pyramids(&mut self, previous: &Frame, current: &Frame, region: PixelRect) -> usize {
        let levels = self.max_levels + 1;
        self.previous.resize_with(levels, Plane::default);
        self.current.resize_with(levels, Plane::default);

        self.previous[0].load(previous, region);
        self.current[0].load(current, region);

        let mut used = 1;
        while used < levels {
            let below = &self.previous[used - 1];
            if below.width() / 2 < MIN_LEVEL_SIDE || below.height() / 2 < MIN_LEVEL_SIDE {
                break;
            }
            let (done, rest) = self.previous.split_at_mut(used);
            rest[0].downsample(&done[used - 1]);
            let (done, rest) = self.current.split_at_mut(used);
            rest[0].downsample(&done[used - 1]);
            used += 1;
        }
        used
    }

    /// Tracks one region-relative point coarse to fine.
    fn track_point(&self, p: Point2f, levels: usize) -> Option<Point2f> {
        let mut d = Point2f::ZERO;
        for level in (0..levels).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            let at = Point2f::new(p.x * scale, p.y * scale);
            match self.refine(&self.previous[level], &self.current[level], at, d) {
                Step::Converged(next) => d = next,
                Step::Singular => return None,
            }
            if level > 0 {
                d = Point2f::new(d.x * 2.0, d.y * 2.0);
            }
        }
        Some(p + d)
    }

    /// Gauss-Newton iterations on one level, starting from displacement `d`.
    fn refine(&self, prev: &Plane, curr: &Plane, at: Point2f, mut d: Point2f) -> Step {
        let half = self.half_window;
        let eps2 = self.epsilon * self.epsilon;

        for _ in 0..self.max_iterations {
            let (mut g00, mut g01, mut g11) = (0.0f32, 0.0f32, 0.0f32);
            let (mut b0, mut b1) = (0.0f32, 0.0f32);

            for wy in -half..=half {
                for wx in -half..=half {
                    let tx = at.x + wx as f32;
                    let ty = at.y + wy as f32;
                    let ix = tx + d.x;
                    let iy = ty + d.y;

                    let e = prev.sample(tx, ty) - curr.sample(ix, iy);
                    let gx = 0.5 * (curr.sample(ix + 1.0, iy) - curr.sample(ix - 1.0, iy));
                    let gy = 0.5 * (curr.sample(ix, iy + 1.0) - curr.sample(ix, iy - 1.0));

                    g00 += gx * gx;
                    g01 += gx * gy;
                    g11 += gy * gy;
                    b0 += gx * e;
                    b1 += gy * e;
                }
            }

            let det = g00 * g11 - g01 * g01;
            if det.abs() < MIN_DETERMINANT {
                return Step::Singular;
            }
            let inv = 1.0 / det;
            let step = Point2f::new(inv * (g11 * b0 - g01 * b1), inv * (g00 * b1 - g01 * b0));
            d = d + step;

            if step.x * step.x + step.y * step.y < eps2 {
                break;
            }
        }
        Step::Converged(d)
    }
}

impl Default for LucasKanadeTracker {
    fn default() -> Self {
        Self::new(
            FLOW_HALF_WINDOW,
            FLOW_MAX_ITERATIONS,
            FLOW_EPSILON,
            FLOW_PYRAMID_LEVELS,
        )
    }
}

impl OpticalFlowTracker for LucasKanadeTracker {
    fn track(
        &mut self,
        previous: &Frame,
        current: &Frame,
        region: PixelRect,
        points: &[Point2f],
        tracked: &mut [Point2f],
        status: &mut [bool],
    ) -> Result<(), BoxError> {
        if previous.channels() != 1 || current.channels() != 1 {
            return Err("optical flow needs single-channel frames".into());
        }
        if previous.width() != current.width() || previous.height() != current.height() {
            return Err(format!(
                "frame size mismatch: {}x{} vs {}x{}",
                previous.width(),
                previous.height(),
                current.width(),
                current.height()
            )
            .into());
        }
        if tracked.len() != points.len() || status.len() != points.len() {
            return Err("output buffers must match the number of points".into());
        }

        tracked.copy_from_slice(points);
        status.fill(false);
        if points.is_empty() {
            return Ok(());
        }

        let bounds = region.clamp_to(FrameSize::new(previous.width(), previous.height()));
        if bounds.is_empty() {
            return Ok(());
        }
        let levels = self.build_pyramids(previous, current, bounds);

        let origin = bounds.origin();
        let w = bounds.width as f32;
        let h = bounds.height as f32;
        for (i, &p) in points.iter().enumerate() {
            let Some(moved) = self.track_point(p - origin, levels) else {
                continue;
            };
            if moved.x < 0.0 || moved.y < 0.0 || moved.x >= w || moved.y >= h {
                continue;
            }
            tracked[i] = moved + origin;
            status[i] = true;
        }

        log::trace!(
            "LK tracked {}/{} points on {} levels",
            status.iter().filter(|s| **s).count(),
            points.len(),
            levels
        );
        Ok(())
    }
}
