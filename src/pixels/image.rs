//! Fixed-size grayscale image.

/// Image side length in pixels.
pub const IMAGE_SIDE: usize = 28;

/// Number of pixels in one image.
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;

/// One 28×28 grayscale image, row-major.
///
/// Only built from a complete pixel array, so a value of this type always
/// holds exactly [`IMAGE_PIXELS`] intensities.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelImage {
    pixels: Box<[u8; IMAGE_PIXELS]>,
}

impl PixelImage {
    pub fn new(pixels: [u8; IMAGE_PIXELS]) -> Self {
        Self {
            pixels: Box::new(pixels),
        }
    }

    /// An all-black image.
    pub fn blank() -> Self {
        Self::new([0; IMAGE_PIXELS])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.pixels[..]
    }

    /// Intensity at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        if row >= IMAGE_SIDE || col >= IMAGE_SIDE {
            return None;
        }
        Some(self.pixels[row * IMAGE_SIDE + col])
    }
}

impl std::fmt::Debug for PixelImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.pixels.iter().filter(|&&p| p > 0).count();
        f.debug_struct("PixelImage")
            .field("pixels", &IMAGE_PIXELS)
            .field("non_zero", &lit)
            .finish()
    }
}
