use glam::{Vec2, Vec3};

use crate::math::{Angle, Fixed};
use crate::renderer::ViewParams;

/// Player view-point in world space.
///
/// * Only **yaw** (heading) is simulated – Doom never tilts up/down.
/// * `z` holds eye height above floor, not absolute altitude.
///
/// Floats live only on this side of the boundary; [`Camera::view_params`]
/// converts to the fixed-point values the renderer consumes.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pos: Vec3, // x,y in map-units; z = eye height above floor
    yaw: f32,  // radians (0 = east, counter-clockwise)
    fov: f32,  // horizontal FoV (radians, typical 60–110°)
}

impl Camera {
    /// Create a new camera at `pos`, facing `yaw`, with horizontal FoV `fov`.
    pub fn new(pos: Vec3, yaw: f32, fov: f32) -> Self {
        Self { pos, yaw, fov }
    }

    /// World-space eye position: (x, y) = map units, z = eye height above floor.
    #[inline]
    pub fn pos(&self) -> Vec3 {
        self.pos
    }

    #[inline]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
    }

    /*──────────────────────── derived vectors ───────────────────────*/

    /// Unit vector pointing where the camera looks on the X-Y plane.
    #[inline(always)]
    pub fn forward(self) -> Vec2 {
        let (s, c) = self.yaw.sin_cos();
        Vec2::new(c, s) // 0 rad = +X (east), CCW positive
    }

    /// Unit vector pointing to the camera's right on the X-Y plane.
    #[inline(always)]
    pub fn right(self) -> Vec2 {
        // clockwise perpendicular: (x, y) -> (y, -x)
        let f = self.forward();
        Vec2::new(f.y, -f.x)
    }

    /*──────────────────────── movement helpers ──────────────────────*/

    /// Move by `forward` units and `side` (strafe, + right), preserving eye-height.
    pub fn step(&mut self, forward: f32, side: f32) {
        let f = self.forward();
        let r = self.right();
        self.pos.x += f.x * forward + r.x * side;
        self.pos.y += f.y * forward + r.y * side;
    }

    /// Rotate around Z-axis (positive = turn left).
    pub fn turn(&mut self, delta_yaw: f32) {
        self.yaw = (self.yaw + delta_yaw).rem_euclid(std::f32::consts::TAU);
    }

    /// Raise or lower the eye above the floor.
    pub fn set_eye_height(&mut self, z: f32) {
        self.pos.z = z;
    }

    /*───────────────────── renderer boundary ────────────────────────*/

    /// Fixed-point view for a viewer standing on a floor at `floor_z`.
    pub fn view_params(&self, floor_z: Fixed) -> ViewParams {
        ViewParams {
            x: Fixed::from_f32(self.pos.x),
            y: Fixed::from_f32(self.pos.y),
            z: floor_z + Fixed::from_f32(self.pos.z),
            angle: Angle::from_radians(self.yaw),
            fov: Angle::from_radians(self.fov),
            fixed_colormap: None,
        }
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
