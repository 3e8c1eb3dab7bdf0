//! Image buffers exchanged with a `VisionProvider`.

/// Packed 8-bit RGB image, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl RgbImage {
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// RGB triple at (row, col), if inside the image.
    pub fn pixel(&self, row: usize, col: usize) -> Option<[u8; 3]> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let i = (row * self.width + col) * 3;
        self.data.get(i..i + 3).map(|p| [p[0], p[1], p[2]])
    }
}

/// Raw depth samples as produced by the sensor, row-major.
///
/// A frame whose samples are all zero means the sensor has not produced data yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DepthImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u16>,
}

impl DepthImage {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Raw sample at (row, col), if inside the image.
    #[inline]
    pub fn sample(&self, row: usize, col: usize) -> Option<u16> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data.get(row * self.width + col).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, raw: u16) {
        if row < self.height && col < self.width {
            self.data[row * self.width + col] = raw;
        }
    }

    /// True once any sample is non-zero.
    pub fn is_populated(&self) -> bool {
        self.data.iter().any(|&v| v != 0)
    }
}
