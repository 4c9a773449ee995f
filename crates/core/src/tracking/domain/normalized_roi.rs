use crate::shared::geometry::{FrameSize, PixelRect, Point2f, Rect2f, Size2f};

/// Region of interest stored in the coordinates of a reference frame size.
///
/// When the reference changes (new resolution or orientation) the rectangle
/// is rescaled per axis, so it keeps covering the same part of the image.
/// After every mutation the rectangle is fitted back inside the reference:
///
/// `0 <= x`, `x + width <= ref.width`, `width <= ref.width` (same for y).
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRoi {
    reference: FrameSize,
    origin: Point2f,
    size: Size2f,
}

impl NormalizedRoi {
    /// Whole-frame ROI against a 1x1 reference.
    pub fn new() -> Self {
        let mut roi = Self {
            reference: FrameSize::new(1, 1),
            origin: Point2f::ZERO,
            size: Size2f::new(1.0, 1.0),
        };
        roi.fit();
        roi
    }

    pub fn reference_size(&self) -> FrameSize {
        self.reference
    }

    /// Rescales the ROI to a new reference size. No-op when unchanged.
    pub fn set_reference_size(&mut self, reference: FrameSize) {
        if reference == self.reference {
            return;
        }
        debug_assert!(
            reference.width > 0 && reference.height > 0,
            "reference size must be non-zero"
        );

        let mx = reference.width as f32 / self.reference.width as f32;
        self.origin.x *= mx;
        self.size.width *= mx;

        let my = reference.height as f32 / self.reference.height as f32;
        self.origin.y *= my;
        self.size.height *= my;

        self.reference = reference;
        self.fit();
    }

    /// Replaces the ROI. The rectangle must already lie inside the
    /// reference; anything else is a caller bug.
    pub fn set(&mut self, origin: Point2f, size: Size2f) {
        let rw = self.reference.width as f32;
        let rh = self.reference.height as f32;
        debug_assert!(origin.x >= 0.0 && origin.y >= 0.0, "ROI origin is negative");
        debug_assert!(origin.x < rw && origin.y < rh, "ROI origin outside reference");
        debug_assert!(size.width >= 0.0 && size.height >= 0.0, "ROI size is negative");
        debug_assert!(
            origin.x + size.width <= rw && origin.y + size.height <= rh,
            "ROI exceeds reference"
        );

        self.origin = origin;
        self.size = size;
    }

    pub fn set_rect(&mut self, rect: PixelRect) {
        self.set(
            Point2f::new(rect.x as f32, rect.y as f32),
            Size2f::new(rect.width as f32, rect.height as f32),
        );
    }

    /// Shifts the ROI by `delta`, then fits it back inside the reference.
    pub fn translate(&mut self, delta: Point2f) {
        self.origin.x += delta.x;
        self.origin.y += delta.y;
        self.fit();
    }

    pub fn get(&self) -> (Point2f, Size2f) {
        (self.origin, self.size)
    }

    pub fn rect(&self) -> Rect2f {
        Rect2f::from_origin_size(self.origin, self.size)
    }

    fn fit(&mut self) {
        let rw = self.reference.width;
        let rh = self.reference.height;

        fit_point(&mut self.origin.x, rw);
        fit_point(&mut self.origin.y, rh);

        fit_size(&mut self.size.width, rw);
        fit_size(&mut self.size.height, rh);

        fit_point_with_size(&mut self.origin.x, self.size.width, rw);
        fit_point_with_size(&mut self.origin.y, self.size.height, rh);
    }
}

impl Default for NormalizedRoi {
    fn default() -> Self {
        Self::new()
    }
}

fn fit_point(p: &mut f32, max: u32) {
    if *p < 0.0 {
        *p = 0.0;
    } else if *p >= max as f32 {
        *p = max.saturating_sub(1) as f32;
    }
}

fn fit_size(s: &mut f32, max: u32) {
    if *s < 0.0 {
        *s = 0.0;
    } else if *s > max as f32 {
        *s = max as f32;
    }
}

// Size is already bounded by `max`, so the shifted point stays >= 0.
fn fit_point_with_size(p: &mut f32, s: f32, max: u32) {
    if *p + s <= max as f32 {
        return;
    }
    *p = max as f32 - s;
}
