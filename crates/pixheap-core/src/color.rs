#![forbid(unsafe_code)]

//! Packed ARGB colors and the codec palette.
//!
//! Every pixel a backend stores is a single [`Argb`] word laid out as
//! `0xAARRGGBB`. The codec only ever compares the RGB channels; alpha is
//! carried through untouched so backends that premultiply or drop alpha on
//! the way to the display still decode correctly.

use std::fmt;

/// A 32-bit color packed as `0xAARRGGBB`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Argb(pub u32);

impl Argb {
    /// Fully transparent black (all bits zero).
    pub const TRANSPARENT: Self = Self(0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    /// Opaque red.
    pub const RED: Self = Self::rgb(255, 0, 0);
    /// Opaque blue.
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    /// Opaque mid gray.
    pub const GRAY: Self = Self::rgb(128, 128, 128);

    /// Create an opaque RGB color (alpha = 255).
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::argb(255, r, g, b)
    }

    /// Create a color with explicit alpha.
    #[inline]
    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
    }

    /// Alpha channel.
    #[inline]
    pub const fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Red channel.
    #[inline]
    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Green channel.
    #[inline]
    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Blue channel.
    #[inline]
    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    /// The same color with a different alpha.
    #[inline]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self((self.0 & 0x00FF_FFFF) | ((a as u32) << 24))
    }

    /// Compare RGB channels only, ignoring alpha.
    #[inline]
    pub const fn rgb_eq(self, other: Self) -> bool {
        (self.0 & 0x00FF_FFFF) == (other.0 & 0x00FF_FFFF)
    }
}

impl fmt::Debug for Argb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Argb(0x{:08X})", self.0)
    }
}

impl From<u32> for Argb {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Argb> for u32 {
    fn from(value: Argb) -> Self {
        value.0
    }
}

/// The five reference colors that make up the on-surface format.
///
/// Changing any of these changes the persisted pixel format, so two contexts
/// can only read each other's surfaces when their palettes agree. The two
/// bit colors must differ in RGB, and neither marker nor the background may
/// alias a bit color, otherwise decoding becomes ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Palette {
    /// Pixel color for a `0` bit.
    pub bit0: Argb,
    /// Pixel color for a `1` bit.
    pub bit1: Argb,
    /// First pixel of every cell run.
    pub start_marker: Argb,
    /// Last pixel of every cell run.
    pub end_marker: Argb,
    /// Color of unallocated or freed cells.
    pub background: Argb,
}

impl Palette {
    /// Default format palette.
    pub const DEFAULT: Self = Self {
        bit0: Argb(0xFF00_0000),
        bit1: Argb(0xFFFF_FFFF),
        start_marker: Argb(0xFFFF_0000),
        end_marker: Argb(0xFF00_00FF),
        background: Argb(0xFF80_8080),
    };

    /// Color used to paint a single bit.
    #[inline]
    pub const fn bit_color(&self, bit: bool) -> Argb {
        if bit { self.bit1 } else { self.bit0 }
    }

    /// Classify a pixel as a bit value.
    ///
    /// Returns `None` when the pixel matches neither bit color.
    #[inline]
    pub const fn classify(&self, pixel: Argb) -> Option<bool> {
        if pixel.rgb_eq(self.bit1) {
            Some(true)
        } else if pixel.rgb_eq(self.bit0) {
            Some(false)
        } else {
            None
        }
    }

    /// Check that every reference color is distinguishable where it must be.
    pub fn is_unambiguous(&self) -> bool {
        let bits = [self.bit0, self.bit1];
        let others = [self.start_marker, self.end_marker, self.background];
        !self.bit0.rgb_eq(self.bit1)
            && others
                .iter()
                .all(|other| bits.iter().all(|bit| !bit.rgb_eq(*other)))
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_unpack_in_argb_order() {
        let c = Argb::argb(0x11, 0x22, 0x33, 0x44);
        assert_eq!(c.0, 0x1122_3344);
        assert_eq!((c.a(), c.r(), c.g(), c.b()), (0x11, 0x22, 0x33, 0x44));
    }

    #[test]
    fn rgb_eq_ignores_alpha() {
        assert!(Argb::WHITE.rgb_eq(Argb::WHITE.with_alpha(0)));
        assert!(!Argb::WHITE.rgb_eq(Argb::BLACK));
    }

    #[test]
    fn default_palette_matches_format_constants() {
        let p = Palette::DEFAULT;
        assert_eq!(p.bit0.0, 0xFF00_0000);
        assert_eq!(p.bit1.0, 0xFFFF_FFFF);
        assert_eq!(p.start_marker.0, 0xFFFF_0000);
        assert_eq!(p.end_marker.0, 0xFF00_00FF);
        assert_eq!(p.background.0, 0xFF80_8080);
        assert!(p.is_unambiguous());
    }

    #[test]
    fn classify_uses_rgb_only() {
        let p = Palette::DEFAULT;
        assert_eq!(p.classify(Argb::WHITE.with_alpha(7)), Some(true));
        assert_eq!(p.classify(Argb::BLACK), Some(false));
        assert_eq!(p.classify(p.background), None);
        assert_eq!(p.classify(p.start_marker), None);
    }

    #[test]
    fn palette_with_aliased_bits_is_ambiguous() {
        let p = Palette {
            bit1: Argb::BLACK.with_alpha(0),
            ..Palette::DEFAULT
        };
        assert!(!p.is_unambiguous());

        let p = Palette {
            background: Argb::WHITE,
            ..Palette::DEFAULT
        };
        assert!(!p.is_unambiguous());
    }

    #[test]
    fn debug_is_hex() {
        assert_eq!(format!("{:?}", Argb(0xFF00_00FF)), "Argb(0xFF0000FF)");
    }
}
