//! Visplanes: the floor / ceiling regions uncovered by walls, collected
//! per column during the wall pass and rasterised as horizontal spans
//! afterwards.

use std::collections::HashMap;

use crate::math::Fixed;
use crate::renderer::software::{
    Software,
    draw::{ColumnJob, ColumnKind, Effects, SpanJob, draw_column, draw_span},
    projection::{LIGHTZSHIFT, MAXLIGHTZ, SKY_TEXTURE_MID, light_level},
};
use crate::world::{FlatId, PLACEHOLDER, ResourceBank};

pub type VisplaneId = u16;

/// Column not touched by the plane.
pub(super) const UNUSED: i16 = i16::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PlaneKey {
    height: Fixed,
    pic: FlatId,
    light: u8,
}

#[derive(Clone, Debug)]
pub struct VisPlane {
    pub height: Fixed,
    pub pic: FlatId,
    pub light: u8,

    /// Inclusive horizontal range that the plane touches.
    pub min_x: i32,
    pub max_x: i32,

    /// Rows `top[x] ..= bottom[x]` are still uncovered after the walls.
    pub top: Vec<i16>,
    pub bottom: Vec<i16>,
}

impl VisPlane {
    fn reset(&mut self, key: PlaneKey, min_x: i32, max_x: i32) {
        self.height = key.height;
        self.pic = key.pic;
        self.light = key.light;
        self.min_x = min_x;
        self.max_x = max_x;
        self.top.fill(UNUSED);
        self.bottom.fill(-1);
    }

    /// `(top, bottom)` of column `x`; empty outside the plane.
    #[inline]
    fn column(&self, x: i32) -> (i32, i32) {
        if x < self.min_x || x > self.max_x {
            return (UNUSED as i32, -1);
        }
        (self.top[x as usize] as i32, self.bottom[x as usize] as i32)
    }

    #[inline]
    pub fn mark(&mut self, x: i32, top: i32, bottom: i32) {
        self.top[x as usize] = top as i16;
        self.bottom[x as usize] = bottom as i16;
    }
}

#[derive(Clone, Copy)]
struct RowCache {
    height: Fixed,
    distance: Fixed,
    xstep: Fixed,
    ystep: Fixed,
}

/// Pool of planes for one frame.  Storage is recycled between frames.
#[derive(Default)]
pub struct PlaneMap {
    planes: Vec<VisPlane>,
    active: usize,
    lookup: HashMap<PlaneKey, VisplaneId>,
    width: usize,

    /* span rasteriser scratch */
    span_start: Vec<i32>,
    rows: Vec<Option<RowCache>>,
}

impl PlaneMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            planes: Vec::new(),
            active: 0,
            lookup: HashMap::new(),
            width,
            span_start: vec![0; height],
            rows: vec![None; height],
        }
    }

    pub fn clear(&mut self) {
        self.active = 0;
        self.lookup.clear();
        self.rows.fill(None);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.active
    }

    #[inline]
    pub fn get(&self, id: VisplaneId) -> &VisPlane {
        &self.planes[id as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: VisplaneId) -> &mut VisPlane {
        &mut self.planes[id as usize]
    }

    fn alloc(&mut self, key: PlaneKey, min_x: i32, max_x: i32) -> VisplaneId {
        let id = self.active;
        if id == self.planes.len() {
            self.planes.push(VisPlane {
                height: key.height,
                pic: key.pic,
                light: key.light,
                min_x,
                max_x,
                top: vec![UNUSED; self.width],
                bottom: vec![-1; self.width],
            });
        } else {
            self.planes[id].reset(key, min_x, max_x);
        }
        self.active += 1;
        let id = id as VisplaneId;
        self.lookup.insert(key, id);
        id
    }

    /// The newest plane with this key, or a fresh empty one.  Sky planes
    /// must already be folded to height 0, light 0 by the caller.
    pub fn find(&mut self, height: Fixed, pic: FlatId, light: u8) -> VisplaneId {
        let key = PlaneKey { height, pic, light };
        match self.lookup.get(&key) {
            Some(&id) => id,
            None => self.alloc(key, self.width as i32, -1),
        }
    }

    /// Make `id` cover `start ..= stop`.  If any column in the overlap is
    /// already marked, a new plane with the same key takes over.
    pub fn check(&mut self, id: VisplaneId, start: i32, stop: i32) -> VisplaneId {
        let pl = &mut self.planes[id as usize];
        let (intrl, unionl) = if start < pl.min_x {
            (pl.min_x, start)
        } else {
            (start, pl.min_x)
        };
        let (intrh, unionh) = if stop > pl.max_x {
            (pl.max_x, stop)
        } else {
            (stop, pl.max_x)
        };

        if (intrl..=intrh).all(|x| pl.top[x as usize] == UNUSED) {
            pl.min_x = unionl;
            pl.max_x = unionh;
            return id;
        }

        let key = PlaneKey {
            height: pl.height,
            pic: pl.pic,
            light: pl.light,
        };
        self.alloc(key, start, stop)
    }
}

/*──────────────────────── rasterisation ───────────────────────────*/

impl Software {
    /// Canonical plane for a sector surface.
    pub(super) fn find_plane(
        &mut self,
        height: Fixed,
        pic: FlatId,
        light: u8,
        bank: &ResourceBank,
    ) -> VisplaneId {
        if bank.is_sky(pic) {
            self.planes.find(Fixed::ZERO, pic, 0)
        } else {
            self.planes.find(height, pic, light)
        }
    }

    pub(super) fn draw_planes(&mut self, bank: &ResourceBank) {
        let Software {
            planes,
            fb,
            proj,
            view,
            tables,
            fuzz_pos,
            ..
        } = self;
        let PlaneMap {
            planes: list,
            active,
            span_start,
            rows,
            ..
        } = planes;
        let colormaps = bank.colormaps();
        let center_y = proj.center_y();

        for pl in &list[..*active] {
            if pl.min_x > pl.max_x {
                continue;
            }

            /* sky: texture columns indexed by view angle, never lit */
            if bank.is_sky(pl.pic) {
                let tex = bank.texture_or_missing(bank.sky_texture().unwrap_or(PLACEHOLDER));
                let (colormap, kind) = match view.fixed_colormap {
                    Some(m) => (&colormaps[m as usize], ColumnKind::Opaque),
                    None => (&colormaps[0], ColumnKind::Sky),
                };
                let mut fx = Effects {
                    tranmap: None,
                    fuzz_map: &colormaps[0],
                    fuzz_pos: &mut *fuzz_pos,
                };
                for x in pl.min_x..=pl.max_x {
                    let (top, bottom) = pl.column(x);
                    if top > bottom {
                        continue;
                    }
                    let job = ColumnJob {
                        x,
                        yl: top,
                        yh: bottom,
                        iscale: proj.sky_iscale(),
                        texturemid: SKY_TEXTURE_MID,
                        source: tex.column(proj.sky_column(view.angle, x as usize)),
                        tiled: false,
                        colormap,
                        kind,
                    };
                    draw_column(fb, center_y, &job, &mut fx);
                }
                continue;
            }

            /* flat: turn column extents into row spans */
            let flat = bank.flat_or_missing(pl.pic);
            let plane_height = (pl.height - view.z).abs();
            let zlight = proj.z_light(light_level(pl.light, 0));

            let mut map_plane = |y: i32, x1: i32, x2: i32| {
                let row = y as usize;
                let cache = match rows[row] {
                    Some(c) if c.height == plane_height => c,
                    _ => {
                        let distance = plane_height * proj.y_slope(row);
                        let c = RowCache {
                            height: plane_height,
                            distance,
                            xstep: distance * view.base_x_scale,
                            ystep: distance * view.base_y_scale,
                        };
                        rows[row] = Some(c);
                        c
                    }
                };
                let length = cache.distance * proj.dist_scale(x1 as usize);
                let angle = view.column_fine(proj, x1 as usize);
                let colormap = match view.fixed_colormap {
                    Some(m) => &colormaps[m as usize],
                    None => {
                        let z = (cache.distance.bits() >> LIGHTZSHIFT).clamp(0, MAXLIGHTZ as i32 - 1);
                        &colormaps[zlight[z as usize] as usize]
                    }
                };
                let span = SpanJob {
                    y,
                    x1,
                    x2,
                    xfrac: view.x + tables.fine_cosine(angle) * length,
                    yfrac: -view.y - tables.fine_sine(angle) * length,
                    xstep: cache.xstep,
                    ystep: cache.ystep,
                    source: flat.pixels(),
                    colormap,
                };
                draw_span(fb, &span);
            };

            for x in pl.min_x..=pl.max_x + 1 {
                let (mut t1, mut b1) = pl.column(x - 1);
                let (mut t2, mut b2) = pl.column(x);

                // close the rows that end at x - 1
                while t1 < t2 && t1 <= b1 {
                    map_plane(t1, span_start[t1 as usize], x - 1);
                    t1 += 1;
                }
                while b1 > b2 && b1 >= t1 {
                    map_plane(b1, span_start[b1 as usize], x - 1);
                    b1 -= 1;
                }
                // open the rows that start at x
                while t2 < t1 && t2 <= b2 {
                    span_start[t2 as usize] = x;
                    t2 += 1;
                }
                while b2 > b1 && b2 >= t2 {
                    span_start[b2 as usize] = x;
                    b2 -= 1;
                }
            }
        }
    }
}
