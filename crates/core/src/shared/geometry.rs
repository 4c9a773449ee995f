use serde::{Deserialize, Serialize};

/// Point (or displacement) in frame-relative float coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

impl Point2f {
    pub const ZERO: Point2f = Point2f { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Point2f {
    type Output = Point2f;

    fn add(self, rhs: Point2f) -> Point2f {
        Point2f::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point2f {
    type Output = Point2f;

    fn sub(self, rhs: Point2f) -> Point2f {
        Point2f::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size2f {
    pub width: f32,
    pub height: f32,
}

impl Size2f {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Pixel dimensions of a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Float rectangle used for containment tests against tracked points.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect2f {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect2f {
    pub fn from_origin_size(origin: Point2f, size: Size2f) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
        }
    }

    /// Half-open containment: left/top edges inside, right/bottom outside.
    pub fn contains(&self, p: Point2f) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }

    /// Truncates to integer pixel bounds.
    pub fn to_pixel_rect(&self) -> PixelRect {
        PixelRect::new(
            self.x as i32,
            self.y as i32,
            self.width as i32,
            self.height as i32,
        )
    }

    /// Centred sub-rectangle whose sides are `ratio` times this one's.
    pub fn centered_fraction(&self, ratio: f32) -> Rect2f {
        let margin = (1.0 - ratio) / 2.0;
        Rect2f {
            x: self.x + self.width * margin,
            y: self.y + self.height * margin,
            width: self.width * ratio,
            height: self.height * ratio,
        }
    }
}

/// Integer pixel rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point2f {
        Point2f::new(self.x as f32, self.y as f32)
    }

    /// Intersection with the `size` frame bounds.
    pub fn clamp_to(&self, size: FrameSize) -> PixelRect {
        let x1 = self.x.clamp(0, size.width as i32);
        let y1 = self.y.clamp(0, size.height as i32);
        let x2 = self.right().clamp(x1, size.width as i32);
        let y2 = self.bottom().clamp(y1, size.height as i32);
        PixelRect::new(x1, y1, x2 - x1, y2 - y1)
    }
}
