use alloc::vec;
use alloc::vec::Vec;

use smart_leds::RGB8;

use crate::ConfigError;
use crate::io::{LedTransmitter, MonotonicClock};
use crate::palette::{ColorOrder, RowPalette};
use crate::pixel_map::PixelMap;

pub const BYTES_PER_PIXEL: usize = 3;

/// Durations of one timed render, in microseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderTiming {
    pub fill_us: u64,
    pub transmit_us: u64,
    pub total_us: u64,
}

/// Writes bar graphs straight into the strip's byte buffer.
///
/// Byte offsets and wire-order colors are resolved once at construction, so a
/// frame is a pass of indexed stores into a buffer that is never reallocated.
pub struct MatrixRenderer {
    rows: usize,
    cols: usize,
    /// byte offset of every pixel, column-major, top row first
    offsets: Vec<usize>,
    row_colors: Vec<[u8; 3]>,
    peak_color: [u8; 3],
    buffer: Vec<u8>,
}

impl MatrixRenderer {
    pub fn new(
        map: &PixelMap,
        palette: &RowPalette,
        peak: RGB8,
        order: ColorOrder,
    ) -> Result<Self, ConfigError> {
        if palette.len() != map.rows() {
            return Err(ConfigError::PaletteMismatch {
                colors: palette.len(),
                rows: map.rows(),
            });
        }

        let offsets = map
            .as_slice()
            .iter()
            .map(|&index| index as usize * BYTES_PER_PIXEL)
            .collect();
        let row_colors = palette.colors().iter().map(|&c| order.bytes(c)).collect();

        Ok(Self {
            rows: map.rows(),
            cols: map.cols(),
            offsets,
            row_colors,
            peak_color: order.bytes(peak),
            buffer: vec![0; map.len() * BYTES_PER_PIXEL],
        })
    }

    /// Fills the buffer for one frame without transmitting it.
    ///
    /// Levels and peaks above the matrix height are saturated, missing
    /// columns count as zero. Peaks of 0 or 1 draw no marker.
    pub fn fill(&mut self, levels: &[u8], peaks: Option<&[u8]>) {
        let rows = self.rows;
        for col in 0..self.cols {
            let column = &self.offsets[col * rows..(col + 1) * rows];
            let level = levels.get(col).map_or(0, |&l| (l as usize).min(rows));
            let cutoff = rows - level;

            for (row, &offset) in column.iter().enumerate() {
                let bytes = if row < cutoff {
                    [0; 3]
                } else {
                    self.row_colors[row]
                };
                self.buffer[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&bytes);
            }

            let peak = peaks
                .and_then(|p| p.get(col))
                .map_or(0, |&p| (p as usize).min(rows));
            if peak > 1 {
                let offset = column[rows - peak];
                self.buffer[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&self.peak_color);
            }
        }
    }

    /// Fills and transmits one frame. Blocks for as long as the transmitter does.
    pub fn render<T: LedTransmitter>(
        &mut self,
        levels: &[u8],
        peaks: Option<&[u8]>,
        show_peaks: bool,
        tx: &mut T,
    ) -> Result<(), T::Error> {
        self.fill(levels, peaks.filter(|_| show_peaks));
        tx.transmit(&self.buffer)
    }

    /// [`Self::render`] with fill and transmit durations.
    pub fn render_timed<T: LedTransmitter, C: MonotonicClock>(
        &mut self,
        levels: &[u8],
        peaks: Option<&[u8]>,
        show_peaks: bool,
        tx: &mut T,
        clock: &C,
    ) -> Result<RenderTiming, T::Error> {
        let start = clock.now_us();
        self.fill(levels, peaks.filter(|_| show_peaks));
        let filled = clock.now_us();
        tx.transmit(&self.buffer)?;
        let done = clock.now_us();

        Ok(RenderTiming {
            fill_us: filled.saturating_sub(start),
            transmit_us: done.saturating_sub(filled),
            total_us: done.saturating_sub(start),
        })
    }

    /// Turns every pixel off and sends the blank frame.
    pub fn clear<T: LedTransmitter>(&mut self, tx: &mut T) -> Result<(), T::Error> {
        self.buffer.fill(0);
        tx.transmit(&self.buffer)
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}
