use serde::{Deserialize, Serialize};

use crate::shared::frame::Frame;
use crate::shared::geometry::FrameSize;

/// Clockwise rotation needed to bring the subject upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    #[serde(rename = "0")]
    Deg0,
    #[serde(rename = "90")]
    Deg90,
    #[serde(rename = "180")]
    Deg180,
    #[serde(rename = "270")]
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Size of a `size` frame after this rotation.
    pub fn rotated_size(self, size: FrameSize) -> FrameSize {
        match self {
            Rotation::Deg0 | Rotation::Deg180 => size,
            Rotation::Deg90 | Rotation::Deg270 => FrameSize::new(size.height, size.width),
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = String;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {other}")),
        }
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// Mirror applied before rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flip {
    #[default]
    None,
    /// Around the X axis (rows reversed).
    Vertical,
    /// Around the Y axis (columns reversed).
    Horizontal,
}

impl TryFrom<i32> for Flip {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Flip::None),
            1 => Ok(Flip::Vertical),
            2 => Ok(Flip::Horizontal),
            other => Err(format!("flip must be 0 (none), 1 (vertical) or 2 (horizontal), got {other}")),
        }
    }
}

impl std::str::FromStr for Flip {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Flip::None),
            "vertical" => Ok(Flip::Vertical),
            "horizontal" => Ok(Flip::Horizontal),
            other => Err(format!(
                "flip must be 'none', 'vertical' or 'horizontal', got '{other}'"
            )),
        }
    }
}

/// Converts `src` to grayscale, mirrors it, then rotates it into `dst`.
///
/// Color frames are read as RGB (3 channels) or RGBA (4 channels, alpha
/// ignored); BGR sources must be swapped by the host.
///
/// `scratch` must already be a gray buffer of `src`'s size and `dst` one of
/// the rotated size; the caller owns (re)allocation.
pub fn to_canonical_gray(
    src: &Frame,
    flip: Flip,
    rotation: Rotation,
    scratch: &mut Frame,
    dst: &mut Frame,
) {
    let size = FrameSize::new(src.width(), src.height());
    debug_assert_eq!(FrameSize::new(scratch.width(), scratch.height()), size);
    debug_assert_eq!(
        FrameSize::new(dst.width(), dst.height()),
        rotation.rotated_size(size)
    );

    gray_with_flip(src, flip, scratch);
    rotate_into(scratch, rotation, dst);
}

fn gray_with_flip(src: &Frame, flip: Flip, out: &mut Frame) {
    let w = src.width() as usize;
    let h = src.height() as usize;
    let channels = src.channels() as usize;
    let data = src.data();
    let out = out.data_mut();

    for y in 0..h {
        let sy = if flip == Flip::Vertical { h - 1 - y } else { y };
        for x in 0..w {
            let sx = if flip == Flip::Horizontal { w - 1 - x } else { x };
            let i = (sy * w + sx) * channels;
            out[y * w + x] = match channels {
                1 => data[i],
                _ => luma(data[i], data[i + 1], data[i + 2]),
            };
        }
    }
}

/// ITU-R BT.601 weights in 8-bit fixed point.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}

fn rotate_into(src: &Frame, rotation: Rotation, dst: &mut Frame) {
    let w = src.width() as usize;
    let h = src.height() as usize;
    let dst_w = dst.width() as usize;
    let s = src.data();
    let d = dst.data_mut();

    match rotation {
        Rotation::Deg0 => d.copy_from_slice(s),
        Rotation::Deg90 => {
            // dst is h wide and w tall
            for dy in 0..w {
                for dx in 0..h {
                    d[dy * dst_w + dx] = s[(h - 1 - dx) * w + dy];
                }
            }
        }
        Rotation::Deg180 => {
            for y in 0..h {
                for x in 0..w {
                    d[y * w + x] = s[(h - 1 - y) * w + (w - 1 - x)];
                }
            }
        }
        Rotation::Deg270 => {
            for dy in 0..w {
                for dx in 0..h {
                    d[dy * dst_w + dx] = s[dx * w + (w - 1 - dy)];
                }
            }
        }
    }
}
