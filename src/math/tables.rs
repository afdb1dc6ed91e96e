//! Trigonometric lookup tables.
//!
//! Built once by [`Tables::new`] and handed to the renderer; nothing here is
//! global.  Only one quarter of the sine wave and one half of the tangent
//! curve are evaluated, the rest is mirrored so the tables are exactly
//! symmetric:
//!
//! * `sin(π − x) = sin(x)`, `sin(x + π) = −sin(x)`
//! * `tan(−x) = −tan(x)`
//!
//! Every entry is sampled half a step into its bucket, which keeps the
//! tables free of exact zeros and infinities.

use std::f64::consts::TAU;

use crate::math::angle::{Angle, FINEANGLES, FINEMASK};
use crate::math::fixed::{FRACBITS, FRACUNIT, Fixed};

/// `tantoangle` covers slopes `0 ..= SLOPERANGE / SLOPERANGE`.
pub const SLOPERANGE: usize = 2048;
pub const SLOPEBITS: u32 = 11;
const DBITS: u32 = FRACBITS - SLOPEBITS;

pub struct Tables {
    /// `5/4` of a turn so cosine is a plain offset lookup.
    fine_sine: Vec<Fixed>,
    /// Half a turn, centred on zero: index `FINEANGLES / 4` is just past 0°.
    fine_tangent: Vec<Fixed>,
    tan_to_angle: Vec<Angle>,
}

impl Default for Tables {
    fn default() -> Self {
        Self::new()
    }
}

impl Tables {
    pub fn new() -> Self {
        let step = TAU / FINEANGLES as f64;
        let quarter = FINEANGLES / 4;

        // ── sine: one quarter wave, mirrored ───────────────────────────────
        let wave: Vec<i32> = (0..quarter)
            .map(|i| ((i as f64 + 0.5) * step).sin())
            .map(|s| (s * FRACUNIT as f64).round() as i32)
            .collect();

        let mut fine_sine = Vec::with_capacity(FINEANGLES + quarter);
        for i in 0..FINEANGLES {
            let j = i % quarter;
            let v = match i / quarter {
                0 => wave[j],
                1 => wave[quarter - 1 - j],
                2 => -wave[j],
                _ => -wave[quarter - 1 - j],
            };
            fine_sine.push(Fixed::from_bits(v));
        }
        for i in 0..quarter {
            let v = fine_sine[i];
            fine_sine.push(v);
        }

        // ── tangent: positive half, negated into the other half ────────────
        let half = FINEANGLES / 2;
        let mut fine_tangent = vec![Fixed::ZERO; half];
        for i in quarter..half {
            let t = ((i as f64 - quarter as f64 + 0.5) * step).tan();
            let v = (t * FRACUNIT as f64).round() as i32;
            fine_tangent[i] = Fixed::from_bits(v);
            fine_tangent[half - 1 - i] = Fixed::from_bits(-v);
        }

        // ── slope → angle for the first octant ─────────────────────────────
        let tan_to_angle = (0..=SLOPERANGE)
            .map(|i| (i as f64 / SLOPERANGE as f64).atan() / TAU)
            .map(|t| Angle::from_bits((t * 4_294_967_296.0) as u32))
            .collect();

        Self {
            fine_sine,
            fine_tangent,
            tan_to_angle,
        }
    }

    /*──────────────────────── raw lookups ──────────────────────────────*/

    #[inline(always)]
    pub fn fine_sine(&self, idx: usize) -> Fixed {
        self.fine_sine[idx & FINEMASK]
    }

    #[inline(always)]
    pub fn fine_cosine(&self, idx: usize) -> Fixed {
        self.fine_sine[(idx & FINEMASK) + FINEANGLES / 4]
    }

    /// `idx` in `0 .. FINEANGLES / 2`; out-of-range indices are clamped.
    #[inline(always)]
    pub fn fine_tangent(&self, idx: usize) -> Fixed {
        self.fine_tangent[idx.min(FINEANGLES / 2 - 1)]
    }

    #[inline(always)]
    pub fn sin(&self, a: Angle) -> Fixed {
        self.fine_sine(a.fine())
    }

    #[inline(always)]
    pub fn cos(&self, a: Angle) -> Fixed {
        self.fine_cosine(a.fine())
    }

    #[inline(always)]
    pub fn tan_to_angle(&self, slope: usize) -> Angle {
        self.tan_to_angle[slope.min(SLOPERANGE)]
    }

    /*──────────────────────── derived helpers ──────────────────────────*/

    /// Angle of the vector `(dx, dy)`, 0 = +X, counter-clockwise.
    pub fn point_to_angle(&self, dx: Fixed, dy: Fixed) -> Angle {
        if dx == Fixed::ZERO && dy == Fixed::ZERO {
            return Angle::ZERO;
        }
        // axis-aligned vectors land exactly on a right angle
        if dy == Fixed::ZERO {
            return if dx.is_negative() { Angle::ANG180 } else { Angle::ZERO };
        }
        if dx == Fixed::ZERO {
            return if dy.is_negative() { Angle::ANG270 } else { Angle::ANG90 };
        }
        let x = dx.bits().unsigned_abs();
        let y = dy.bits().unsigned_abs();
        let one = Angle::from_bits(1);

        match (dx.is_negative(), dy.is_negative(), x > y) {
            // octants 0 / 1
            (false, false, true) => self.tan_to_angle(slope_div(y, x)),
            (false, false, false) => Angle::ANG90 - one - self.tan_to_angle(slope_div(x, y)),
            // octants 7 / 6
            (false, true, true) => -self.tan_to_angle(slope_div(y, x)),
            (false, true, false) => Angle::ANG270 + self.tan_to_angle(slope_div(x, y)),
            // octants 3 / 2
            (true, false, true) => Angle::ANG180 - one - self.tan_to_angle(slope_div(y, x)),
            (true, false, false) => Angle::ANG90 + self.tan_to_angle(slope_div(x, y)),
            // octants 4 / 5
            (true, true, true) => Angle::ANG180 + self.tan_to_angle(slope_div(y, x)),
            (true, true, false) => Angle::ANG270 - one - self.tan_to_angle(slope_div(x, y)),
        }
    }

    /// Euclidean length of `(dx, dy)` without a square root.
    pub fn point_to_dist(&self, dx: Fixed, dy: Fixed) -> Fixed {
        let mut x = abs_clamped(dx);
        let mut y = abs_clamped(dy);
        if y > x {
            std::mem::swap(&mut x, &mut y);
        }
        if x == Fixed::ZERO {
            return Fixed::ZERO;
        }
        let slope = ((y / x).bits() >> DBITS) as usize;
        let angle = self.tan_to_angle(slope) + Angle::ANG90;
        x / self.sin(angle)
    }
}

/// `num / den` as an index into `tan_to_angle`, saturating at
/// `SLOPERANGE` (slopes are at most 1 by construction).
#[inline]
pub fn slope_div(num: u32, den: u32) -> usize {
    if den < 512 {
        return SLOPERANGE;
    }
    let ans = ((num as u64) << 3) / (den as u64 >> 8);
    (ans as usize).min(SLOPERANGE)
}

#[inline]
fn abs_clamped(v: Fixed) -> Fixed {
    Fixed::from_bits(v.bits().unsigned_abs().min(i32::MAX as u32) as i32)
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn sine_matches_libm_within_half_step() {
        let t = Tables::new();
        for deg in [0.0f32, 17.0, 45.0, 90.0, 133.0, 180.0, 270.0, 359.0] {
            let a = Angle::from_degrees(deg);
            assert_approx_eq!(t.sin(a).to_f32(), deg.to_radians().sin(), 2e-3);
            assert_approx_eq!(t.cos(a).to_f32(), deg.to_radians().cos(), 2e-3);
        }
    }

    #[test]
    fn quarter_wave_symmetry_is_exact() {
        let t = Tables::new();
        let q = FINEANGLES / 4;
        for i in 0..q {
            assert_eq!(t.fine_sine(i), t.fine_sine(2 * q - 1 - i));
            assert_eq!(t.fine_sine(i), -t.fine_sine(2 * q + i));
        }
        for i in 0..FINEANGLES / 2 {
            assert_eq!(t.fine_tangent(i), -t.fine_tangent(FINEANGLES / 2 - 1 - i));
        }
    }

    #[test]
    fn point_to_angle_hits_each_quadrant() {
        let t = Tables::new();
        let one = Fixed::ONE;
        let z = Fixed::ZERO;
        let deg = |dx, dy| t.point_to_angle(dx, dy).to_degrees();
        assert_approx_eq!(deg(one, z), 0.0, 0.05);
        assert_approx_eq!(deg(one, one), 45.0, 0.05);
        assert_approx_eq!(deg(z, one), 90.0, 0.05);
        assert_approx_eq!(deg(-one, one), 135.0, 0.05);
        assert_approx_eq!(deg(-one, z), 180.0, 0.05);
        assert_approx_eq!(deg(-one, -one), 225.0, 0.05);
        assert_approx_eq!(deg(z, -one), 270.0, 0.05);
        assert_approx_eq!(deg(one, -one), 315.0, 0.05);
        assert_eq!(t.point_to_angle(z, z), Angle::ZERO);
    }

    #[test]
    fn axis_aligned_vectors_are_exact() {
        let t = Tables::new();
        let d = Fixed::from_int(64);
        assert_eq!(t.point_to_angle(d, Fixed::ZERO), Angle::ZERO);
        assert_eq!(t.point_to_angle(Fixed::ZERO, d), Angle::ANG90);
        assert_eq!(t.point_to_angle(-d, Fixed::ZERO), Angle::ANG180);
        assert_eq!(t.point_to_angle(Fixed::ZERO, -d), Angle::ANG270);
    }

    #[test]
    fn point_to_dist_is_euclidean() {
        let t = Tables::new();
        let d = t.point_to_dist(Fixed::from_int(300), Fixed::from_int(400));
        assert_approx_eq!(d.to_f32(), 500.0, 0.5);
        assert_eq!(t.point_to_dist(Fixed::ZERO, Fixed::ZERO), Fixed::ZERO);
        // extreme inputs must not panic
        let _ = t.point_to_dist(Fixed::MIN, Fixed::MAX);
        let _ = t.point_to_angle(Fixed::MIN, Fixed::MIN);
    }
}
