//! Binary angle measurement: one full turn is the whole `u32` range,
//! so every addition and subtraction wraps for free.

use std::f64::consts::TAU;
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Number of entries in one turn of the fine lookup tables.
pub const FINEANGLES: usize = 8192;
pub const FINEMASK: usize = FINEANGLES - 1;
/// `Angle >> ANGLETOFINESHIFT` yields a fine-table index.
pub const ANGLETOFINESHIFT: u32 = 19;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Angle(u32);

impl Angle {
    pub const ZERO: Angle = Angle(0);
    pub const ANG45: Angle = Angle(0x2000_0000);
    pub const ANG90: Angle = Angle(0x4000_0000);
    pub const ANG180: Angle = Angle(0x8000_0000);
    pub const ANG270: Angle = Angle(0xC000_0000);
    /// Largest representable angle, one step short of a full turn.
    pub const MAX: Angle = Angle(u32::MAX);

    #[inline(always)]
    pub const fn from_bits(bits: u32) -> Self {
        Angle(bits)
    }

    #[inline(always)]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Index into the fine sine / cosine tables.
    #[inline(always)]
    pub const fn fine(self) -> usize {
        (self.0 >> ANGLETOFINESHIFT) as usize
    }

    /// Angle of a fine-table index.
    #[inline(always)]
    pub const fn from_fine(idx: usize) -> Self {
        Angle(((idx & FINEMASK) as u32) << ANGLETOFINESHIFT)
    }

    pub fn from_degrees(deg: f32) -> Self {
        Self::from_turns(deg as f64 / 360.0)
    }

    pub fn from_radians(rad: f32) -> Self {
        Self::from_turns(rad as f64 / TAU)
    }

    pub fn to_radians(self) -> f32 {
        (self.0 as f64 / 4_294_967_296.0 * TAU) as f32
    }

    pub fn to_degrees(self) -> f32 {
        (self.0 as f64 / 4_294_967_296.0 * 360.0) as f32
    }

    fn from_turns(turns: f64) -> Self {
        let t = turns.rem_euclid(1.0);
        Angle((t * 4_294_967_296.0) as u64 as u32)
    }
}

impl fmt::Debug for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Angle({:.3}°)", self.to_degrees())
    }
}

impl Add for Angle {
    type Output = Angle;
    #[inline(always)]
    fn add(self, rhs: Angle) -> Angle {
        Angle(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Angle {
    type Output = Angle;
    #[inline(always)]
    fn sub(self, rhs: Angle) -> Angle {
        Angle(self.0.wrapping_sub(rhs.0))
    }
}

impl AddAssign for Angle {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Angle) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl SubAssign for Angle {
    #[inline(always)]
    fn sub_assign(&mut self, rhs: Angle) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}

impl Neg for Angle {
    type Output = Angle;
    #[inline(always)]
    fn neg(self) -> Angle {
        Angle(self.0.wrapping_neg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_turns_line_up() {
        assert_eq!(Angle::from_degrees(90.0), Angle::ANG90);
        assert_eq!(Angle::from_degrees(180.0), Angle::ANG180);
        assert_eq!(Angle::from_degrees(-90.0), Angle::ANG270);
        assert_eq!(Angle::from_degrees(360.0), Angle::ZERO);
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(Angle::ANG270 + Angle::ANG180, Angle::ANG90);
        assert_eq!(Angle::ZERO - Angle::ANG90, Angle::ANG270);
        assert_eq!(-Angle::ANG90, Angle::ANG270);
    }

    #[test]
    fn fine_index_covers_table() {
        assert_eq!(Angle::ZERO.fine(), 0);
        assert_eq!(Angle::ANG90.fine(), FINEANGLES / 4);
        assert_eq!(Angle::MAX.fine(), FINEANGLES - 1);
        assert_eq!(Angle::from_fine(FINEANGLES / 2), Angle::ANG180);
    }
}
