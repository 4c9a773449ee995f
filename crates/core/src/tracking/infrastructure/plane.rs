use crate::shared::frame::Frame;
use crate::shared::geometry::PixelRect;

/// Reusable single-channel f32 image, row-major.
#[derive(Debug, Default)]
pub(crate) struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(width * height, 0.0);
    }

    /// Copies `region` of a gray frame. The region must lie inside the frame.
    pub fn load(&mut self, frame: &Frame, region: PixelRect) {
        debug_assert_eq!(frame.channels(), 1);
        let w = region.width.max(0) as usize;
        let h = region.height.max(0) as usize;
        self.resize(w, h);

        let stride = frame.width() as usize;
        let src = frame.data();
        for y in 0..h {
            let row = (region.y as usize + y) * stride + region.x as usize;
            for (dst, &v) in self.data[y * w..(y + 1) * w].iter_mut().zip(&src[row..row + w]) {
                *dst = v as f32;
            }
        }
    }

    /// Half-resolution copy of `src` by 2x2 averaging.
    pub fn downsample(&mut self, src: &Plane) {
        let w = src.width / 2;
        let h = src.height / 2;
        self.resize(w, h);
        for y in 0..h {
            for x in 0..w {
                let sum = src.at(2 * x, 2 * y)
                    + src.at(2 * x + 1, 2 * y)
                    + src.at(2 * x, 2 * y + 1)
                    + src.at(2 * x + 1, 2 * y + 1);
                self.data[y * w + x] = sum * 0.25;
            }
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    /// Bilinear sample with coordinates clamped to the plane.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let top = self.at(x0, y0) * (1.0 - fx) + self.at(x1, y0) * fx;
        let bottom = self.at(x0, y1) * (1.0 - fx) + self.at(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}
