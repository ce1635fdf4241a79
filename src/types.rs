// Core types shared by the camera, the filter chain and the window.

use std::fmt;

/// RGBA8 frame, row-major, 4 bytes per pixel.
/// Visual: this is the image the window shows after the effect chain ran.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: usize,     // pixels per row
    pub height: usize,    // rows
    pub data: Vec<u8>,    // length = width * height * 4, [r, g, b, a] per pixel
}

impl PixelBuffer {
    /// Wrap existing RGBA bytes. Returns None if the length does not match.
    #[cfg(test)]
    pub fn from_rgba(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == width * height * 4).then_some(Self { width, height, data })
    }

    /// Match the given dimensions. Only reallocates when they actually change,
    /// so steady-state ticks reuse the same allocation.
    /// Returns true if a resize happened.
    pub fn ensure_size(&mut self, width: usize, height: usize) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.data = vec![0u8; width * height * 4];
        true
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Read one pixel as [r, g, b, a].
    #[cfg(test)]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }
}

/// Borrowed view of the latest decoded source frame (RGBA8).
#[derive(Clone, Copy, Debug)]
pub struct FrameRef<'a> {
    pub width: usize,
    pub height: usize,
    pub pixels: &'a [u8],
}

impl FrameRef<'_> {
    /// A frame is only usable once the source knows its dimensions.
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0 && self.pixels.len() == self.width * self.height * 4
    }
}

/// Which way the selected camera faces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Facing {
    #[default]
    Front,
    Rear,
}

impl Facing {
    pub fn flipped(self) -> Self {
        match self {
            Facing::Front => Facing::Rear,
            Facing::Rear => Facing::Front,
        }
    }
}

/// Picks the physical device that feeds the frame source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceSelector {
    pub facing: Facing,
    pub index: u32, // backend device index for this facing
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let facing = match self.facing {
            Facing::Front => "front",
            Facing::Rear => "rear",
        };
        write!(f, "{facing} camera #{}", self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_size_only_reallocates_on_change() {
        let mut buf = PixelBuffer::default();
        assert!(buf.ensure_size(2, 2));
        buf.data[0] = 7;
        assert!(!buf.ensure_size(2, 2));
        assert_eq!(buf.data[0], 7);

        assert!(buf.ensure_size(3, 1));
        assert_eq!(buf.data.len(), 12);
    }

    #[test]
    fn from_rgba_rejects_wrong_length() {
        assert!(PixelBuffer::from_rgba(2, 1, vec![0; 7]).is_none());
        let buf = PixelBuffer::from_rgba(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(buf.pixel(1, 0), [5, 6, 7, 8]);
    }

    #[test]
    fn frame_without_dimensions_is_not_usable() {
        let empty = FrameRef { width: 0, height: 0, pixels: &[] };
        assert!(!empty.has_dimensions());
        let px = [0u8; 4];
        assert!(FrameRef { width: 1, height: 1, pixels: &px }.has_dimensions());
    }
}
