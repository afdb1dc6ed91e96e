//! 16.16 fixed-point scalar.
//!
//! * Every spatial quantity the renderer touches is a [`Fixed`].
//! * Addition / subtraction wrap instead of panicking, exactly like the
//!   32-bit registers this arithmetic was designed for.
//! * Multiplication widens to 64 bits before shifting back.
//! * Division clamps to [`Fixed::MAX`] / [`Fixed::MIN`] instead of faulting
//!   when the quotient would not fit (this includes a zero divisor).

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Shl, Shr, Sub, SubAssign};

pub const FRACBITS: u32 = 16;
pub const FRACUNIT: i32 = 1 << FRACBITS;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(FRACUNIT);
    pub const HALF: Fixed = Fixed(FRACUNIT / 2);
    pub const MAX: Fixed = Fixed(i32::MAX);
    pub const MIN: Fixed = Fixed(i32::MIN);

    #[inline(always)]
    pub const fn from_bits(bits: i32) -> Self {
        Fixed(bits)
    }

    #[inline(always)]
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Whole map units → fixed.
    #[inline(always)]
    pub const fn from_int(v: i32) -> Self {
        Fixed(v.wrapping_shl(FRACBITS))
    }

    /// Integer part, rounded towards negative infinity.
    #[inline(always)]
    pub const fn to_int(self) -> i32 {
        self.0 >> FRACBITS
    }

    /// Only used at the float boundary (camera, demo scenes).
    pub fn from_f32(v: f32) -> Self {
        Fixed((v * FRACUNIT as f32) as i32)
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32 / FRACUNIT as f32
    }

    #[inline(always)]
    pub const fn abs(self) -> Self {
        Fixed(self.0.wrapping_abs())
    }

    #[inline(always)]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Multiply by a plain integer (no fractional shift).
    #[inline(always)]
    pub const fn mul_int(self, v: i32) -> Self {
        Fixed(self.0.wrapping_mul(v))
    }

    /// Divide by a plain integer, truncating. A zero divisor yields zero.
    #[inline(always)]
    pub const fn div_int(self, v: i32) -> Self {
        if v == 0 {
            Fixed(0)
        } else {
            Fixed(self.0.wrapping_div(v))
        }
    }

    /// `(a * b) >> 16` with a 64-bit intermediate.
    #[inline(always)]
    pub const fn fixed_mul(self, rhs: Fixed) -> Fixed {
        Fixed(((self.0 as i64 * rhs.0 as i64) >> FRACBITS) as i32)
    }

    /// `(a << 16) / b`, clamped when the result would overflow.
    #[inline(always)]
    pub const fn fixed_div(self, rhs: Fixed) -> Fixed {
        if (self.0.unsigned_abs() >> 14) >= rhs.0.unsigned_abs() {
            if (self.0 ^ rhs.0) < 0 {
                Fixed::MIN
            } else {
                Fixed::MAX
            }
        } else {
            Fixed((((self.0 as i64) << FRACBITS) / rhs.0 as i64) as i32)
        }
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({:.4})", self.to_f32())
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.to_f32())
    }
}

/*──────────────────────── operator plumbing ──────────────────────────*/

impl Add for Fixed {
    type Output = Fixed;
    #[inline(always)]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    #[inline(always)]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_sub(rhs.0))
    }
}

impl AddAssign for Fixed {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Fixed) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl SubAssign for Fixed {
    #[inline(always)]
    fn sub_assign(&mut self, rhs: Fixed) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    #[inline(always)]
    fn neg(self) -> Fixed {
        Fixed(self.0.wrapping_neg())
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    #[inline(always)]
    fn mul(self, rhs: Fixed) -> Fixed {
        self.fixed_mul(rhs)
    }
}

impl Div for Fixed {
    type Output = Fixed;
    #[inline(always)]
    fn div(self, rhs: Fixed) -> Fixed {
        self.fixed_div(rhs)
    }
}

impl Shr<u32> for Fixed {
    type Output = Fixed;
    #[inline(always)]
    fn shr(self, rhs: u32) -> Fixed {
        Fixed(self.0.wrapping_shr(rhs))
    }
}

impl Shl<u32> for Fixed {
    type Output = Fixed;
    #[inline(always)]
    fn shl(self, rhs: u32) -> Fixed {
        Fixed(self.0.wrapping_shl(rhs))
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trip_and_floor() {
        assert_eq!(Fixed::from_int(7).to_int(), 7);
        assert_eq!(Fixed::from_int(-3).to_int(), -3);
        // -0.5 floors to -1
        assert_eq!((-Fixed::HALF).to_int(), -1);
    }

    #[test]
    fn mul_matches_real_product() {
        let a = Fixed::from_f32(2.5);
        let b = Fixed::from_f32(-1.5);
        assert_eq!(a * b, Fixed::from_f32(-3.75));
        assert_eq!(Fixed::ONE * Fixed::ONE, Fixed::ONE);
    }

    #[test]
    fn mul_never_faults_on_extremes() {
        let cases = [Fixed::MAX, Fixed::MIN, Fixed::ZERO, Fixed::ONE, -Fixed::ONE];
        for &a in &cases {
            for &b in &cases {
                let _ = a * b;
                let _ = a / b;
            }
        }
        assert_eq!(Fixed::MIN.abs(), Fixed::MIN); // wraps, no panic
        assert_eq!(-Fixed::MIN, Fixed::MIN);
    }

    #[test]
    fn div_clamps_on_tiny_divisor() {
        assert_eq!(Fixed::ONE / Fixed::ZERO, Fixed::MAX);
        assert_eq!(-Fixed::ONE / Fixed::ZERO, Fixed::MIN);
        assert_eq!(Fixed::from_int(1000) / Fixed::from_bits(1), Fixed::MAX);
        assert_eq!(Fixed::from_int(1000) / Fixed::from_bits(-1), Fixed::MIN);
        assert_eq!(Fixed::MIN / Fixed::MIN, Fixed::ONE);
    }

    #[test]
    fn div_matches_real_quotient() {
        assert_eq!(Fixed::from_int(3) / Fixed::from_int(2), Fixed::from_f32(1.5));
        assert_eq!(Fixed::from_int(-9) / Fixed::from_int(3), Fixed::from_int(-3));
    }

    #[test]
    fn add_sub_wrap_instead_of_panicking() {
        assert_eq!(Fixed::MAX + Fixed::from_bits(1), Fixed::MIN);
        assert_eq!(Fixed::MIN - Fixed::from_bits(1), Fixed::MAX);
    }
}
