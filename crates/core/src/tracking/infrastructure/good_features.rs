use crate::shared::constants::{
    CORNER_MIN_DISTANCE, CORNER_QUALITY_LEVEL, SUBPIX_EPSILON, SUBPIX_HALF_WINDOW,
    SUBPIX_MAX_ITERATIONS,
};
use crate::shared::frame::Frame;
use crate::shared::geometry::{FrameSize, PixelRect, Point2f};
use crate::shared::BoxError;
use crate::tracking::domain::feature_extractor::FeatureExtractor;
use crate::tracking::domain::feature_points::FeaturePoints;
use crate::tracking::infrastructure::plane::Plane;

/// Shi–Tomasi corner extractor with iterative sub-pixel refinement.
///
/// Corner strength is the smaller eigenvalue of the gradient structure
/// tensor summed over a 3x3 block. Candidates must reach `quality_level`
/// times the strongest response and be local maxima; the strongest are
/// then taken greedily, keeping `min_distance` between accepted corners.
pub struct GoodFeaturesExtractor {
    quality_level: f32,
    min_distance: f32,
    subpix_half_window: i32,
    subpix_max_iterations: usize,
    subpix_epsilon: f32,
    image: Plane,
    grad_x: Plane,
    grad_y: Plane,
    response: Plane,
    candidates: Vec<(f32, usize, usize)>,
}

impl GoodFeaturesExtractor {
    pub fn new(quality_level: f32, min_distance: f32) -> Self {
        Self {
            quality_level,
            min_distance,
            subpix_half_window: SUBPIX_HALF_WINDOW,
            subpix_max_iterations: SUBPIX_MAX_ITERATIONS,
            subpix_epsilon: SUBPIX_EPSILON,
            image: Plane::default(),
            grad_x: Plane::default(),
            grad_y: Plane::default(),
            response: Plane::default(),
            candidates: Vec::new(),
        }
    }

    fn compute_gradients(&mut self) {
        let (w, h) = (self.image.width(), self.image.height());
        self.grad_x.resize(w, h);
        self.grad_y.resize(w, h);
        for y in 1..h.saturating_sub(1) {
            for x in 1..w.saturating_sub(1) {
                let gx = 0.5 * (self.image.at(x + 1, y) - self.image.at(x - 1, y));
                let gy = 0.5 * (self.image.at(x, y + 1) - self.image.at(x, y - 1));
                self.grad_x.set(x, y, gx);
                self.grad_y.set(x, y, gy);
            }
        }
    }

    /// Minimum eigenvalue per pixel; returns the maximum response.
    fn compute_response(&mut self) -> f32 {
        let (w, h) = (self.image.width(), self.image.height());
        self.response.resize(w, h);
        let mut max = 0.0f32;
        for y in 2..h.saturating_sub(2) {
            for x in 2..w.saturating_sub(2) {
                let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
                for by in y - 1..=y + 1 {
                    for bx in x - 1..=x + 1 {
                        let gx = self.grad_x.at(bx, by);
                        let gy = self.grad_y.at(bx, by);
                        a += gx * gx;
                        b += gx * gy;
                        c += gy * gy;
                    }
                }
                let half_trace = 0.5 * (a + c);
                let diff = 0.5 * (a - c);
                let lambda = half_trace - (diff * diff + b * b).sqrt();
                self.response.set(x, y, lambda);
                max = max.max(lambda);
            }
        }
        max
    }

    fn collect_candidates(&mut self, threshold: f32) {
        self.candidates.clear();
        let (w, h) = (self.response.width(), self.response.height());
        for y in 2..h.saturating_sub(2) {
            'pixel: for x in 2..w.saturating_sub(2) {
                let v = self.response.at(x, y);
                if v < threshold {
                    continue;
                }
                for ny in y - 1..=y + 1 {
                    for nx in x - 1..=x + 1 {
                        if self.response.at(nx, ny) > v {
                            continue 'pixel;
                        }
                    }
                }
                self.candidates.push((v, x, y));
            }
        }
        self.candidates
            .sort_by(|l, r| r.0.total_cmp(&l.0).then(l.2.cmp(&r.2)).then(l.1.cmp(&r.1)));
    }

    fn select(&self, out: &mut FeaturePoints) {
        let min_d2 = self.min_distance * self.min_distance;
        for &(_, x, y) in &self.candidates {
            if out.is_full() {
                break;
            }
            let p = Point2f::new(x as f32, y as f32);
            let crowded = out.as_slice().iter().any(|q| {
                let d = *q - p;
                d.x * d.x + d.y * d.y < min_d2
            });
            if !crowded {
                out.push(p);
            }
        }
    }

    /// Moves `p` to the point where the window's gradients are orthogonal to
    /// the offsets from it, i.e. the saddle/corner location.
    fn refine(&self, start: Point2f) -> Point2f {
        let half = self.subpix_half_window;
        let eps2 = self.subpix_epsilon * self.subpix_epsilon;
        let mut p = start;

        for _ in 0..self.subpix_max_iterations {
            let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
            let (mut bx, mut by) = (0.0f32, 0.0f32);
            for wy in -half..=half {
                for wx in -half..=half {
                    let qx = p.x + wx as f32;
                    let qy = p.y + wy as f32;
                    let gx = self.grad_x.sample(qx, qy);
                    let gy = self.grad_y.sample(qx, qy);
                    let gxx = gx * gx;
                    let gxy = gx * gy;
                    let gyy = gy * gy;
                    a += gxx;
                    b += gxy;
                    c += gyy;
                    bx += gxx * qx + gxy * qy;
                    by += gxy * qx + gyy * qy;
                }
            }

            let det = a * c - b * b;
            if det.abs() <= f32::EPSILON {
                break;
            }
            let next = Point2f::new((c * bx - b * by) / det, (a * by - b * bx) / det);
            let step = next - p;
            p = next;
            if step.x * step.x + step.y * step.y <= eps2 {
                break;
            }
        }

        let drift = p - start;
        if drift.x.abs() > half as f32 || drift.y.abs() > half as f32 {
            return start;
        }
        p
    }
}

impl Default for GoodFeaturesExtractor {
    fn default() -> Self {
        Self::new(CORNER_QUALITY_LEVEL, CORNER_MIN_DISTANCE)
    }
}

impl FeatureExtractor for GoodFeaturesExtractor {
    fn extract(
        &mut self,
        image: &Frame,
        region: PixelRect,
        out: &mut FeaturePoints,
    ) -> Result<(), BoxError> {
        if image.channels() != 1 {
            return Err(format!(
                "feature extraction needs a single-channel frame, got {} channels",
                image.channels()
            )
            .into());
        }
        out.clear();

        let bounds = region.clamp_to(FrameSize::new(image.width(), image.height()));
        if bounds.width < 5 || bounds.height < 5 {
            return Ok(());
        }

        self.image.load(image, bounds);
        self.compute_gradients();
        let max = self.compute_response();
        if max <= 0.0 {
            return Ok(());
        }
        self.collect_candidates(max * self.quality_level);
        self.select(out);

        for p in out.as_mut_slice() {
            *p = self.refine(*p);
        }
        // results are relative to the requested region, not the clamped one
        out.translate(Point2f::new(
            (bounds.x - region.x) as f32,
            (bounds.y - region.y) as f32,
        ));

        log::trace!(
            "extracted {} corners from {} candidates",
            out.len(),
            self.candidates.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::MAX_FEATURES;
    use approx::assert_abs_diff_eq;

    /// Bright square on a dark background; its corners are the only
    /// Shi–Tomasi features.
    fn square(width: u32, height: u32, x0: u32, y0: u32, side: u32) -> Frame {
        let data = (0..height)
            .flat_map(|y| {
                (0..width).map(move |x| {
                    let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
                    if inside {
                        220
                    } else {
                        30
                    }
                })
            })
            .collect();
        Frame::new(data, width, height, 1)
    }

    fn checkerboard(width: u32, height: u32, cell: u32) -> Frame {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| if (x / cell + y / cell) % 2 == 0 { 40 } else { 210 }))
            .collect();
        Frame::new(data, width, height, 1)
    }

    #[test]
    fn test_finds_square_corners() {
        let frame = square(60, 60, 20, 20, 20);
        let mut extractor = GoodFeaturesExtractor::default();
        let mut out = FeaturePoints::new();
        extractor
            .extract(&frame, PixelRect::new(0, 0, 60, 60), &mut out)
            .unwrap();

        assert!(out.len() >= 4);
        let corners = [(20.0, 20.0), (40.0, 20.0), (20.0, 40.0), (40.0, 40.0)];
        for (cx, cy) in corners {
            let near = out
                .as_slice()
                .iter()
                .any(|p| (p.x - cx).abs() <= 2.5 && (p.y - cy).abs() <= 2.5);
            assert!(near, "no feature near ({cx}, {cy}): {:?}", out.as_slice());
        }
    }

    #[test]
    fn test_points_are_region_relative() {
        let frame = square(80, 80, 40, 40, 20);
        let mut extractor = GoodFeaturesExtractor::default();
        let mut out = FeaturePoints::new();
        extractor
            .extract(&frame, PixelRect::new(30, 30, 40, 40), &mut out)
            .unwrap();

        assert!(!out.is_empty());
        // the square's top-left corner sits at (10, 10) inside the region
        let near = out
            .as_slice()
            .iter()
            .any(|p| (p.x - 10.0).abs() <= 2.5 && (p.y - 10.0).abs() <= 2.5);
        assert!(near, "{:?}", out.as_slice());
    }

    #[test]
    fn test_caps_at_capacity() {
        let frame = checkerboard(100, 100, 6);
        let mut extractor = GoodFeaturesExtractor::default();
        let mut out = FeaturePoints::new();
        extractor
            .extract(&frame, PixelRect::new(0, 0, 100, 100), &mut out)
            .unwrap();

        assert_eq!(out.len(), MAX_FEATURES);
        for p in out.as_slice() {
            assert!(p.x >= 0.0 && p.x < 100.0 && p.y >= 0.0 && p.y < 100.0, "{p:?}");
        }
    }

    #[test]
    fn test_selection_keeps_min_distance() {
        let frame = checkerboard(100, 100, 6);
        let mut extractor = GoodFeaturesExtractor::default();
        extractor.image.load(&frame, PixelRect::new(0, 0, 100, 100));
        extractor.compute_gradients();
        let max = extractor.compute_response();
        extractor.collect_candidates(max * CORNER_QUALITY_LEVEL);
        let mut out = FeaturePoints::new();
        extractor.select(&mut out);

        let pts = out.as_slice();
        for (i, a) in pts.iter().enumerate() {
            for b in &pts[i + 1..] {
                let d = *a - *b;
                assert!(d.x * d.x + d.y * d.y >= CORNER_MIN_DISTANCE * CORNER_MIN_DISTANCE);
            }
        }
    }

    #[test]
    fn test_flat_region_has_no_features() {
        let frame = Frame::new(vec![90; 40 * 40], 40, 40, 1);
        let mut extractor = GoodFeaturesExtractor::default();
        let mut out = FeaturePoints::new();
        out.push(Point2f::new(1.0, 1.0));
        extractor
            .extract(&frame, PixelRect::new(0, 0, 40, 40), &mut out)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_refine_converges_on_checker_corner() {
        let frame = checkerboard(40, 40, 10);
        let mut extractor = GoodFeaturesExtractor::default();
        extractor.image.load(&frame, PixelRect::new(0, 0, 40, 40));
        extractor.compute_gradients();
        let p = extractor.refine(Point2f::new(19.0, 21.0));
        // central differences put the edge between pixels 9.5 and 10.5
        assert_abs_diff_eq!(p.x, 19.5, epsilon = 0.6);
        assert_abs_diff_eq!(p.y, 19.5, epsilon = 0.6);
    }

    #[test]
    fn test_rejects_color_frame() {
        let frame = Frame::new(vec![0; 10 * 10 * 3], 10, 10, 3);
        let mut extractor = GoodFeaturesExtractor::default();
        let mut out = FeaturePoints::new();
        assert!(extractor
            .extract(&frame, PixelRect::new(0, 0, 10, 10), &mut out)
            .is_err());
    }
}
