use alloc::vec::Vec;

use smart_leds::RGB8;

pub const OFF: RGB8 = RGB8 { r: 0, g: 0, b: 0 };
pub const RED: RGB8 = RGB8 { r: 32, g: 0, b: 0 };
pub const ORANGE: RGB8 = RGB8 { r: 24, g: 8, b: 0 };
pub const YELLOW: RGB8 = RGB8 { r: 24, g: 16, b: 0 };
pub const GREEN_YELLOW: RGB8 = RGB8 { r: 12, g: 20, b: 0 };
pub const GREEN: RGB8 = RGB8 { r: 0, g: 32, b: 0 };
pub const BLUE_LIGHT: RGB8 = RGB8 { r: 0, g: 16, b: 16 };

/// Peak marker, deliberately outside the bar palette.
pub const PEAK: RGB8 = RGB8 { r: 22, g: 0, b: 10 };

/// Top-to-bottom zone colors of the default palette, three rows each.
pub const SPECTRUM_ZONES: [RGB8; 6] = [RED, ORANGE, YELLOW, GREEN_YELLOW, GREEN, BLUE_LIGHT];
pub const SPECTRUM_ZONE_HEIGHT: usize = 3;

/// Byte order the LED chips expect on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorOrder {
    Rgb,
    /// WS2812
    Grb,
}

impl ColorOrder {
    pub const fn bytes(self, color: RGB8) -> [u8; 3] {
        match self {
            ColorOrder::Rgb => [color.r, color.g, color.b],
            ColorOrder::Grb => [color.g, color.r, color.b],
        }
    }
}

/// One color per matrix row, row 0 at the top.
#[derive(Clone, Debug, PartialEq)]
pub struct RowPalette {
    colors: Vec<RGB8>,
}

impl RowPalette {
    /// Splits the rows into contiguous zones of `zone_height` rows, top down.
    /// Rows past the last zone keep the last color.
    pub fn zoned(rows: usize, zone_height: usize, zones: &[RGB8]) -> Self {
        let zone_height = zone_height.max(1);
        let colors = (0..rows)
            .map(|row| {
                let zone = (row / zone_height).min(zones.len().saturating_sub(1));
                zones.get(zone).copied().unwrap_or(OFF)
            })
            .collect();
        Self { colors }
    }

    /// Red at the top through blue at the bottom.
    pub fn spectrum(rows: usize) -> Self {
        Self::zoned(rows, SPECTRUM_ZONE_HEIGHT, &SPECTRUM_ZONES)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn color(&self, row: usize) -> RGB8 {
        self.colors[row]
    }

    pub fn colors(&self) -> &[RGB8] {
        &self.colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_zones_cover_sixteen_rows() {
        let palette = RowPalette::spectrum(16);
        assert_eq!(palette.len(), 16);
        assert_eq!(palette.color(0), RED);
        assert_eq!(palette.color(2), RED);
        assert_eq!(palette.color(3), ORANGE);
        assert_eq!(palette.color(8), YELLOW);
        assert_eq!(palette.color(11), GREEN_YELLOW);
        assert_eq!(palette.color(14), GREEN);
        assert_eq!(palette.color(15), BLUE_LIGHT);
    }

    #[test]
    fn taller_matrix_keeps_last_zone() {
        let palette = RowPalette::spectrum(24);
        assert!(palette.colors()[15..].iter().all(|&c| c == BLUE_LIGHT));
    }

    #[test]
    fn grb_swaps_red_and_green() {
        assert_eq!(ColorOrder::Grb.bytes(ORANGE), [8, 24, 0]);
        assert_eq!(ColorOrder::Rgb.bytes(ORANGE), [24, 8, 0]);
        assert_eq!(ColorOrder::Grb.bytes(PEAK), [0, 22, 10]);
    }
}
