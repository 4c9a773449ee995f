use crate::shared::geometry::{FrameSize, PixelRect};

/// A face rectangle plus the frame size it was measured against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceRegion {
    pub rect: PixelRect,
    pub frame_size: FrameSize,
}

/// Outcome of one detection cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectionInfo {
    pub face: Option<FaceRegion>,
}

impl DetectionInfo {
    pub fn face_found(&self) -> bool {
        self.face.is_some()
    }
}
