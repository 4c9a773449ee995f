use ndarray::ArrayView3;

/// A single camera frame: contiguous 8-bit pixels in row-major order.
///
/// Host frames arrive with 1 (gray), 3 (RGB) or 4 (RGBA) channels. The
/// pipeline's working buffers are always single-channel.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    /// Black single-channel frame.
    pub fn gray(width: u32, height: u32) -> Self {
        Self::new(vec![0u8; width as usize * height as usize], width, height, 1)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Reshapes into a single-channel buffer of the given size.
    ///
    /// Returns `true` when the buffer was reallocated, i.e. its previous
    /// contents are no longer meaningful.
    pub fn ensure_gray(&mut self, width: u32, height: u32) -> bool {
        if self.channels == 1 && self.width == width && self.height == height {
            return false;
        }
        self.data.clear();
        self.data.resize(width as usize * height as usize, 0);
        self.width = width;
        self.height = height;
        self.channels = 1;
        true
    }

    /// Copies pixels and geometry from `other`, reusing this buffer's
    /// allocation when it is large enough.
    pub fn copy_from(&mut self, other: &Frame) {
        self.assign(other.data(), other.width, other.height, other.channels);
    }

    /// Copies raw host pixels into this frame.
    pub fn assign(&mut self, data: &[u8], width: u32, height: u32, channels: u8) {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        self.data.clear();
        self.data.extend_from_slice(data);
        self.width = width;
        self.height = height;
        self.channels = channels;
    }

    /// Checks that the buffer length agrees with the declared geometry.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
