//! Screen ↔ view-angle mapping and the distance / lighting tables that
//! depend on resolution and field of view.

use log::debug;

use crate::math::{ANGLETOFINESHIFT, Angle, FINEANGLES, FRACUNIT, Fixed, Tables};
use crate::renderer::ViewParams;
use crate::world::NUMCOLORMAPS;

pub const LIGHTLEVELS: usize = 16;
pub const LIGHTSEGSHIFT: u32 = 4;
pub const MAXLIGHTSCALE: usize = 48;
pub const LIGHTSCALESHIFT: u32 = 12;
pub const MAXLIGHTZ: usize = 128;
pub const LIGHTZSHIFT: u32 = 20;
const DISTMAP: i32 = 2;
/// Light falloff is tuned for this many columns.
const LIGHT_BASE_WIDTH: i32 = 320;

/// 1024 sky columns per turn.
pub const ANGLETOSKYSHIFT: u32 = 22;
pub const SKY_TEXTURE_MID: Fixed = Fixed::from_int(100);

/// `finetangent` beyond ±2 is treated as off-screen.
const TAN_LIMIT: i32 = 2 * FRACUNIT;

const MIN_FOV_FINE: usize = FINEANGLES / 12; // 30°
const MAX_FOV_FINE: usize = FINEANGLES / 3; // 120°

/// Everything derived from (width, height, field of view).
///
/// Rebuilt only when one of those changes.  The column ↔ angle mapping is
/// public so an overhead map can share the exact same projection.
pub struct Projection {
    width: usize,
    height: usize,
    fov: Angle,

    center_x: i32,
    center_y: i32,
    center_x_frac: Fixed,
    center_y_frac: Fixed,
    /// Focal length in pixels.
    projection: Fixed,

    /// Fine angle (relative to view, offset by 90°) → screen column.
    view_angle_to_x: Vec<i32>,
    /// Screen column (`0 ..= width`) → angle relative to the view direction.
    x_to_view_angle: Vec<Angle>,
    clip_angle: Angle,

    y_slope: Vec<Fixed>,
    dist_scale: Vec<Fixed>,
    sky_iscale: Fixed,

    scale_light: Vec<[u8; MAXLIGHTSCALE]>,
    z_light: Vec<[u8; MAXLIGHTZ]>,
}

impl Projection {
    pub fn new(width: usize, height: usize, fov: Angle, tables: &Tables) -> Self {
        let fov_fine = fov.fine().clamp(MIN_FOV_FINE, MAX_FOV_FINE);
        let fov = Angle::from_fine(fov_fine);
        let w = width as i32;

        let center_x = w / 2;
        let center_y = height as i32 / 2;
        let center_x_frac = Fixed::from_int(center_x);
        let center_y_frac = Fixed::from_int(center_y);

        // focal length that maps the fov edges onto the screen edges
        let edge_tan = tables.fine_tangent(FINEANGLES / 4 + fov_fine / 2);
        let projection = center_x_frac / edge_tan;

        let mut view_angle_to_x: Vec<i32> = (0..FINEANGLES / 2)
            .map(|i| {
                let t = tables.fine_tangent(i).bits();
                let x = if t > TAN_LIMIT {
                    -1
                } else if t < -TAN_LIMIT {
                    w + 1
                } else {
                    let t = Fixed::from_bits(t) * projection;
                    ((center_x_frac - t).bits() + FRACUNIT - 1) >> 16
                };
                x.clamp(-1, w + 1)
            })
            .collect();

        // the first angle that maps at or left of each column
        let last = view_angle_to_x.len() - 1;
        let x_to_view_angle: Vec<Angle> = (0..=w)
            .map(|x| {
                let i = view_angle_to_x.iter().position(|&vx| vx <= x).unwrap_or(last);
                Angle::from_fine(i) - Angle::ANG90
            })
            .collect();

        for t in view_angle_to_x.iter_mut() {
            if *t == -1 {
                *t = 0;
            } else if *t == w + 1 {
                *t = w;
            }
        }
        let clip_angle = x_to_view_angle[0];

        let y_slope = (0..height as i32)
            .map(|y| {
                let dy = Fixed::from_int(y - center_y) + Fixed::HALF;
                projection / dy.abs()
            })
            .collect();

        let dist_scale = x_to_view_angle[..width]
            .iter()
            .map(|&a| Fixed::ONE / tables.cos(a).abs())
            .collect();

        let sky_iscale = Fixed::from_bits(FRACUNIT * LIGHT_BASE_WIDTH / w.max(1));
        let (scale_light, z_light) = light_tables(width);

        debug!(
            "projection {}x{} fov {:.1}° focal {} clip {:.1}°",
            width,
            height,
            fov.to_degrees(),
            projection,
            clip_angle.to_degrees()
        );

        Self {
            width,
            height,
            fov,
            center_x,
            center_y,
            center_x_frac,
            center_y_frac,
            projection,
            view_angle_to_x,
            x_to_view_angle,
            clip_angle,
            y_slope,
            dist_scale,
            sky_iscale,
            scale_light,
            z_light,
        }
    }

    /// True if `(width, height, fov)` would produce this exact projection.
    pub fn matches(&self, width: usize, height: usize, fov: Angle) -> bool {
        let fine = fov.fine().clamp(MIN_FOV_FINE, MAX_FOV_FINE);
        self.width == width && self.height == height && self.fov == Angle::from_fine(fine)
    }

    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    /// Effective field of view after clamping.
    pub fn fov(&self) -> Angle {
        self.fov
    }
    pub fn center_x(&self) -> i32 {
        self.center_x
    }
    pub fn center_y(&self) -> i32 {
        self.center_y
    }
    pub fn center_x_frac(&self) -> Fixed {
        self.center_x_frac
    }
    pub fn center_y_frac(&self) -> Fixed {
        self.center_y_frac
    }
    pub fn projection(&self) -> Fixed {
        self.projection
    }
    /// Half the visible angle; anything further off-axis is outside the view.
    pub fn clip_angle(&self) -> Angle {
        self.clip_angle
    }

    /// View-relative angle of the left edge of column `x` (`0 ..= width`).
    #[inline]
    pub fn x_to_view_angle(&self, x: usize) -> Angle {
        self.x_to_view_angle[x.min(self.width)]
    }

    /// The whole column → angle mapping.
    pub fn x_to_view_angles(&self) -> &[Angle] {
        &self.x_to_view_angle
    }

    /// Column for a view-relative angle within `±clip_angle`.
    #[inline]
    pub fn view_angle_to_x(&self, relative: Angle) -> i32 {
        let fine = (relative + Angle::ANG90).fine();
        self.view_angle_to_x[fine.min(FINEANGLES / 2 - 1)]
    }

    #[inline]
    pub(super) fn y_slope(&self, y: usize) -> Fixed {
        self.y_slope[y]
    }

    #[inline]
    pub(super) fn dist_scale(&self, x: usize) -> Fixed {
        self.dist_scale[x]
    }

    pub(super) fn sky_iscale(&self) -> Fixed {
        self.sky_iscale
    }

    /// Colormap by wall / sprite scale for a light level.
    #[inline]
    pub(super) fn scale_light(&self, level: usize) -> &[u8; MAXLIGHTSCALE] {
        &self.scale_light[level.min(LIGHTLEVELS - 1)]
    }

    /// Colormap by plane distance for a light level.
    #[inline]
    pub(super) fn z_light(&self, level: usize) -> &[u8; MAXLIGHTZ] {
        &self.z_light[level.min(LIGHTLEVELS - 1)]
    }

    /// Sky texture column seen through screen column `x`.
    #[inline]
    pub fn sky_column(&self, view_angle: Angle, x: usize) -> i32 {
        ((view_angle + self.x_to_view_angle(x)).bits() >> ANGLETOSKYSHIFT) as i32
    }
}

/// Sector light plus contrast, as a `scale_light` / `z_light` row.
#[inline]
pub(super) fn light_level(light: u8, contrast: i32) -> usize {
    ((light >> LIGHTSEGSHIFT) as i32 + contrast).clamp(0, LIGHTLEVELS as i32 - 1) as usize
}

/// Index into a `scale_light` row for a wall or sprite scale.
#[inline]
pub(super) fn scale_index(scale: Fixed) -> usize {
    ((scale.bits() >> LIGHTSCALESHIFT).max(0) as usize).min(MAXLIGHTSCALE - 1)
}

fn light_tables(width: usize) -> (Vec<[u8; MAXLIGHTSCALE]>, Vec<[u8; MAXLIGHTZ]>) {
    let mut scale_light = vec![[0u8; MAXLIGHTSCALE]; LIGHTLEVELS];
    let mut z_light = vec![[0u8; MAXLIGHTZ]; LIGHTLEVELS];
    let to_map = |level: i32| level.clamp(0, NUMCOLORMAPS as i32 - 1) as u8;
    let w = (width as i32).max(1);

    for i in 0..LIGHTLEVELS {
        let start = ((LIGHTLEVELS - 1 - i) * 2 * NUMCOLORMAPS / LIGHTLEVELS) as i32;
        for (j, slot) in z_light[i].iter_mut().enumerate() {
            let dist = Fixed::from_bits(((j + 1) << LIGHTZSHIFT) as i32);
            let scale = (Fixed::from_int(LIGHT_BASE_WIDTH / 2) / dist).bits() >> LIGHTSCALESHIFT;
            *slot = to_map(start - scale / DISTMAP);
        }
        for (j, slot) in scale_light[i].iter_mut().enumerate() {
            *slot = to_map(start - j as i32 * LIGHT_BASE_WIDTH / w / DISTMAP);
        }
    }
    (scale_light, z_light)
}

/// Per-frame viewer state, derived from [`ViewParams`].
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct View {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub angle: Angle,
    pub sin: Fixed,
    pub cos: Fixed,
    /// World step per screen column for planes, before distance.
    pub base_x_scale: Fixed,
    pub base_y_scale: Fixed,
    pub fixed_colormap: Option<u8>,
}

impl View {
    pub fn new(params: &ViewParams, proj: &Projection, tables: &Tables) -> Self {
        let left = params.angle - Angle::ANG90;
        Self {
            x: params.x,
            y: params.y,
            z: params.z,
            angle: params.angle,
            sin: tables.sin(params.angle),
            cos: tables.cos(params.angle),
            base_x_scale: tables.cos(left) / proj.projection,
            base_y_scale: -(tables.sin(left) / proj.projection),
            fixed_colormap: params.fixed_colormap,
        }
    }

    /// Angle from the viewer to a map point.
    #[inline]
    pub fn angle_to(&self, tables: &Tables, x: Fixed, y: Fixed) -> Angle {
        tables.point_to_angle(x - self.x, y - self.y)
    }

    /// Fine angle of screen column `x` in world space.
    #[inline]
    pub fn column_fine(&self, proj: &Projection, x: usize) -> usize {
        ((self.angle + proj.x_to_view_angle(x)).bits() >> ANGLETOFINESHIFT) as usize
    }
}
