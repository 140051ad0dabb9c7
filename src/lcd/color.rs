//! Pixel color representation shared by the DMG greyscale path and the CGB
//! RGB555 palette path, plus the three color-correction strategies of spec
//! §4.4 / SPEC_FULL §11.5.

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ColorIndex {
    Zero,
    One,
    Two,
    Three,
}

impl ColorIndex {
    pub fn new(least_significant_bit: bool, most_significant_bit: bool) -> Self {
        match (most_significant_bit, least_significant_bit) {
            (true, true) => Self::Three,
            (true, false) => Self::Two,
            (false, true) => Self::One,
            (false, false) => Self::Zero,
        }
    }

    pub fn shift(self) -> u8 {
        match self {
            ColorIndex::Zero => 0,
            ColorIndex::One => 2,
            ColorIndex::Two => 4,
            ColorIndex::Three => 6,
        }
    }

    pub fn from_dmg_palette(self, palette: u8) -> DmgShade {
        match (palette >> self.shift()) & 0b11 {
            0 => DmgShade::White,
            1 => DmgShade::LightGray,
            2 => DmgShade::DarkGray,
            _ => DmgShade::Black,
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum DmgShade {
    White,
    LightGray,
    DarkGray,
    Black,
}

impl From<DmgShade> for [u8; 4] {
    fn from(c: DmgShade) -> Self {
        match c {
            DmgShade::White => [0xff, 0xff, 0xff, 0xff],
            DmgShade::LightGray => [0xaa, 0xaa, 0xaa, 0xff],
            DmgShade::DarkGray => [0x55, 0x55, 0x55, 0xff],
            DmgShade::Black => [0, 0, 0, 0xff],
        }
    }
}

/// Converts an RGB555 CGB palette entry to 8-bit-per-channel RGBA using the
/// "raw x8" strategy: `c << 3 | c >> 2`.
pub fn rgb555_raw(value: u16) -> [u8; 4] {
    let r5 = (value & 0x1f) as u16;
    let g5 = ((value >> 5) & 0x1f) as u16;
    let b5 = ((value >> 10) & 0x1f) as u16;
    let up = |c: u16| ((c << 3) | (c >> 2)) as u8;
    [up(r5), up(g5), up(b5), 0xff]
}

/// The Gambatte cross-channel-bleed color-correction formula (SPEC_FULL
/// §11.5), grounded in `age_gb_lcd_palettes.cpp::update_cgb_color`.
pub fn rgb555_gambatte(value: u16) -> [u8; 4] {
    let r5 = i32::from(value & 0x1f);
    let g5 = i32::from((value >> 5) & 0x1f);
    let b5 = i32::from((value >> 10) & 0x1f);

    let r = (r5 * 13 + g5 * 2 + b5) >> 1;
    let g = (g5 * 3 + b5) << 1;
    let b = (r5 * 3 + g5 * 2 + b5 * 11) >> 1;

    [
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
        0xff,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_dmg_shade_is_opaque_white() {
        assert_eq!(<[u8; 4]>::from(DmgShade::White), [0xff; 4]);
    }

    #[test]
    fn raw_black_is_zero() {
        assert_eq!(rgb555_raw(0), [0, 0, 0, 0xff]);
    }

    #[test]
    fn gambatte_full_white_input_stays_near_white() {
        // all five-bit channels maxed; the formula's weights top out at 248,
        // not 255 (it is a cross-channel-bleed correction, not a rescale).
        assert_eq!(rgb555_gambatte(0x7fff), [248, 248, 248, 0xff]);
    }

}
