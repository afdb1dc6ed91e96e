//! Deterministic integer arithmetic shared by the whole renderer.

pub mod angle;
pub mod fixed;
pub mod tables;

pub use angle::{ANGLETOFINESHIFT, Angle, FINEANGLES, FINEMASK};
pub use fixed::{FRACBITS, FRACUNIT, Fixed};
pub use tables::{SLOPERANGE, Tables, slope_div};

/// A directed partition line: origin plus direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Divline {
    pub x: Fixed,
    pub y: Fixed,
    pub dx: Fixed,
    pub dy: Fixed,
}

impl Divline {
    /// 0 = *front* (right of the direction), 1 = *back*.
    pub fn point_on_side(&self, x: Fixed, y: Fixed) -> usize {
        if self.dx == Fixed::ZERO {
            return if x <= self.x {
                (self.dy > Fixed::ZERO) as usize
            } else {
                (self.dy < Fixed::ZERO) as usize
            };
        }
        if self.dy == Fixed::ZERO {
            return if y <= self.y {
                (self.dx < Fixed::ZERO) as usize
            } else {
                (self.dx > Fixed::ZERO) as usize
            };
        }

        let dx = x - self.x;
        let dy = y - self.y;

        // signs alone decide when the cross-product terms differ in sign
        if (self.dy.bits() ^ self.dx.bits() ^ dx.bits() ^ dy.bits()) < 0 {
            return ((self.dy.bits() ^ dx.bits()) < 0) as usize;
        }

        let left = Fixed::from_bits(self.dy.to_int()) * dx;
        let right = dy * Fixed::from_bits(self.dx.to_int());
        if right < left { 0 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(x: i32, y: i32, dx: i32, dy: i32) -> Divline {
        Divline {
            x: Fixed::from_int(x),
            y: Fixed::from_int(y),
            dx: Fixed::from_int(dx),
            dy: Fixed::from_int(dy),
        }
    }

    #[test]
    fn right_of_direction_is_front() {
        let f = Fixed::from_int;
        // pointing north: east is front
        let north = line(0, 0, 0, 64);
        assert_eq!(north.point_on_side(f(10), f(5)), 0);
        assert_eq!(north.point_on_side(f(-10), f(5)), 1);
        // pointing east: south is front
        let east = line(0, 0, 64, 0);
        assert_eq!(east.point_on_side(f(5), f(-10)), 0);
        assert_eq!(east.point_on_side(f(5), f(10)), 1);
        // diagonal
        let diag = line(0, 0, 64, 64);
        assert_eq!(diag.point_on_side(f(10), f(0)), 0);
        assert_eq!(diag.point_on_side(f(0), f(10)), 1);
    }
}
