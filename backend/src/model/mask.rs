use image::{GrayImage, Luma};
use ndarray::Array2;

#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    #[error("Mask shape {height}x{width} does not match {len} values")]
    Shape {
        height: usize,
        width: usize,
        len: usize,
    },
    #[error("Mask dimensions {height}x{width} exceed the supported raster size")]
    TooLarge { height: usize, width: usize },
}

/// Fixed-shape per-pixel mask, indexed as `(row, col)`.
///
/// Any non-zero value is foreground. Values are usually `0.0`/`1.0` but the
/// grid also accepts raw probabilities. A mask may cover only part of the
/// image; `origin` is the image position of its `(0, 0)` cell.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskGrid {
    values: Array2<f32>,
    origin: (usize, usize),
}

impl MaskGrid {
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            values: Array2::zeros((height, width)),
            origin: (0, 0),
        }
    }

    /// Places the grid at `(row, col)` in image coordinates.
    pub fn with_origin(mut self, row: usize, col: usize) -> Self {
        self.origin = (row, col);
        self
    }

    pub fn origin(&self) -> (usize, usize) {
        self.origin
    }

    pub fn from_shape_vec(height: usize, width: usize, values: Vec<f32>) -> Result<Self, MaskError> {
        let len = values.len();
        let values = Array2::from_shape_vec((height, width), values)
            .map_err(|_| MaskError::Shape { height, width, len })?;
        Ok(Self {
            values,
            origin: (0, 0),
        })
    }

    pub fn from_fn<F>(height: usize, width: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f32,
    {
        Self {
            values: Array2::from_shape_fn((height, width), |(row, col)| f(row, col)),
            origin: (0, 0),
        }
    }

    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.values.get((row, col)).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) -> bool {
        match self.values.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    pub fn is_foreground(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_some_and(|v| v != 0.0)
    }

    pub fn foreground_count(&self) -> usize {
        self.values.iter().filter(|v| **v != 0.0).count()
    }

    /// Binary raster of the mask: foreground pixels become 255.
    pub fn to_binary_image(&self) -> Result<GrayImage, MaskError> {
        self.to_padded_binary_image(0)
    }

    /// Binary raster surrounded by `padding` background pixels on every side,
    /// so regions touching the grid edge still have a background neighbour.
    pub fn to_padded_binary_image(&self, padding: u32) -> Result<GrayImage, MaskError> {
        let (height, width) = (self.height(), self.width());
        let too_large = || MaskError::TooLarge { height, width };
        let w = u32::try_from(width)
            .ok()
            .and_then(|w| w.checked_add(padding.checked_mul(2)?))
            .ok_or_else(too_large)?;
        let h = u32::try_from(height)
            .ok()
            .and_then(|h| h.checked_add(padding.checked_mul(2)?))
            .ok_or_else(too_large)?;

        Ok(GrayImage::from_fn(w, h, |x, y| {
            let inside = x >= padding && y >= padding;
            if inside && self.is_foreground((y - padding) as usize, (x - padding) as usize) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        }))
    }
}
