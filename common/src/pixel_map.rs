use alloc::vec::Vec;

use crate::ConfigError;
use crate::config::MAX_PIXELS;

/// Physical LED index of logical (`row`, `col`) on a strip that snakes along
/// the rows: even rows run right to left, odd rows left to right.
pub const fn serpentine_index(row: usize, col: usize, cols: usize) -> usize {
    if row % 2 == 1 {
        cols * row + col
    } else {
        cols - col - 1 + cols * row
    }
}

/// Precomputed (row, column) -> strip index table.
///
/// Entries are stored column-major (`col * rows + row`) so that the renderer
/// walks one column as a contiguous slice. Built once, read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelMap {
    rows: usize,
    cols: usize,
    indices: Vec<u16>,
}

impl PixelMap {
    pub fn new(rows: usize, cols: usize) -> Result<Self, ConfigError> {
        if rows == 0 || cols == 0 {
            return Err(ConfigError::EmptyMatrix { rows, cols });
        }
        let pixels = rows.saturating_mul(cols);
        if pixels > MAX_PIXELS {
            return Err(ConfigError::MatrixTooLarge {
                pixels,
                max: MAX_PIXELS,
            });
        }

        let mut indices = Vec::with_capacity(pixels);
        for col in 0..cols {
            for row in 0..rows {
                indices.push(serpentine_index(row, col, cols) as u16);
            }
        }
        log::debug!("pixel map built for {rows}x{cols}");

        Ok(Self {
            rows,
            cols,
            indices,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        self.indices[col * self.rows + row] as usize
    }

    /// Strip indices of one column, top row first.
    pub fn column(&self, col: usize) -> &[u16] {
        let base = col * self.rows;
        &self.indices[base..base + self.rows]
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.indices
    }
}
