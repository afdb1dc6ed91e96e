//! Wall rasteriser: one visible column range of one seg at a time.
//!
//! Heights are tracked in 20.12 fixed point (`HEIGHTBITS`) so a wall's
//! screen edges can be stepped across the range without overflow.

use crate::math::{ANGLETOFINESHIFT, Angle, FRACBITS, Fixed};
use crate::renderer::software::{
    Software,
    draw::{ColumnJob, ColumnKind, Effects, draw_column},
    projection::{light_level, scale_index},
    renderer::Scene,
    sprites::{DrawSeg, SilClip, Silhouette},
};
use crate::world::{LinedefFlags, PLACEHOLDER, SegmentId, Texture};

const HEIGHTBITS: u32 = 12;
const HEIGHTUNIT: i32 = 1 << HEIGHTBITS;

/// Walls nearer than this would need a scale beyond the clamp.
pub(super) const MAX_SCALE: Fixed = Fixed::from_int(64);
/// Walls farther than this are not worth drawing.
pub(super) const MIN_SCALE: Fixed = Fixed::from_bits(256);

/// `|a|` reading the angle as a signed turn, capped at 90°.
#[inline]
fn abs_capped(a: Angle) -> Angle {
    Angle::from_bits((a.bits() as i32).unsigned_abs()).min(Angle::ANG90)
}

/// Per-range state that steps column by column.
struct WallRun<'a> {
    scale: Fixed,
    scale_step: Fixed,

    center_angle: Angle,
    offset: Fixed,
    distance: Fixed,
    light: usize,

    mid: Option<&'a Texture>,
    top: Option<&'a Texture>,
    bottom: Option<&'a Texture>,
    mid_texmid: Fixed,
    top_texmid: Fixed,
    bottom_texmid: Fixed,
    textured: bool,
    masked: Option<usize>,

    mark_floor: bool,
    mark_ceiling: bool,

    top_frac: Fixed,
    top_step: Fixed,
    bottom_frac: Fixed,
    bottom_step: Fixed,
    pix_high: Fixed,
    pix_high_step: Fixed,
    pix_low: Fixed,
    pix_low_step: Fixed,
}

impl Software {
    /// Scale of the wall seen through screen angle `vis_angle`, unclamped.
    fn raw_scale(&self, vis_angle: Angle, normal: Angle, distance: Fixed) -> Fixed {
        let anglea = Angle::ANG90 + (vis_angle - self.view.angle);
        let angleb = Angle::ANG90 + (vis_angle - normal);
        let num = self.proj.projection() * self.tables.sin(angleb);
        let den = distance * self.tables.sin(anglea);
        if den > num >> 16 {
            num / den
        } else {
            MAX_SCALE
        }
    }

    /// Rasterise columns `start ..= stop` of seg `id` and record a
    /// [`DrawSeg`] for the sprite pass.
    pub(super) fn store_wall_range(
        &mut self,
        scene: &Scene,
        id: SegmentId,
        rw_angle1: Angle,
        start: i32,
        stop: i32,
    ) {
        let w = self.fb.width() as i32;
        let (start, stop) = (start.max(0), stop.min(w - 1));
        if start > stop {
            return;
        }
        self.stats.wall_ranges += 1;

        let (level, bank) = (scene.level, scene.bank);
        let seg = &level.segs()[id as usize];
        let line = &level.linedefs()[seg.linedef as usize];
        let side = &level.sidedefs()[seg.sidedef as usize];
        let front = &level.sectors()[seg.front_sector as usize];
        let back = seg.back_sector.map(|s| &level.sectors()[s as usize]);
        let v1 = level.vertices()[seg.v1 as usize];
        let v2 = level.vertices()[seg.v2 as usize];
        let view = self.view;

        /* distance and scale ------------------------------------------------*/
        let normal = seg.angle + Angle::ANG90;
        let offset_angle = abs_capped(normal - rw_angle1);
        let hyp = self.tables.point_to_dist(v1.x - view.x, v1.y - view.y);
        let distance = hyp * self.tables.sin(Angle::ANG90 - offset_angle);

        let raw1 = self.raw_scale(view.angle + self.proj.x_to_view_angle(start as usize), normal, distance);
        let raw2 = if stop > start {
            self.raw_scale(view.angle + self.proj.x_to_view_angle(stop as usize), normal, distance)
        } else {
            raw1
        };
        if raw1 < MIN_SCALE && raw2 < MIN_SCALE {
            self.stats.degenerate_ranges += 1;
            return;
        }
        let scale1 = raw1.clamp(MIN_SCALE, MAX_SCALE);
        let scale2 = raw2.clamp(MIN_SCALE, MAX_SCALE);
        let scale_step = if stop > start {
            (scale2 - scale1).div_int(stop - start)
        } else {
            Fixed::ZERO
        };

        let mut ds = DrawSeg {
            seg: id,
            x1: start,
            x2: stop,
            scale1,
            scale2,
            scale_step,
            silhouette: Silhouette::empty(),
            bsil_height: Fixed::MIN,
            tsil_height: Fixed::MAX,
            top_clip: SilClip::None,
            bottom_clip: SilClip::None,
            masked_cols: None,
        };

        /* textures and silhouettes -------------------------------------------*/
        let mut world_top = front.ceiling_height - view.z;
        let world_bottom = front.floor_height - view.z;
        let mut world_high = Fixed::ZERO;
        let mut world_low = Fixed::ZERO;

        let mut run = WallRun {
            scale: scale1,
            scale_step,
            center_angle: Angle::ZERO,
            offset: Fixed::ZERO,
            distance,
            light: 0,
            mid: None,
            top: None,
            bottom: None,
            mid_texmid: Fixed::ZERO,
            top_texmid: Fixed::ZERO,
            bottom_texmid: Fixed::ZERO,
            textured: false,
            masked: None,
            mark_floor: false,
            mark_ceiling: false,
            top_frac: Fixed::ZERO,
            top_step: Fixed::ZERO,
            bottom_frac: Fixed::ZERO,
            bottom_step: Fixed::ZERO,
            pix_high: Fixed::ZERO,
            pix_high_step: Fixed::ZERO,
            pix_low: Fixed::ZERO,
            pix_low_step: Fixed::ZERO,
        };

        match back {
            None => {
                // single sided: one texture, nothing behind
                let mid = bank.texture_or_missing(side.middle.unwrap_or(PLACEHOLDER));
                run.mid = Some(mid);
                run.mark_floor = true;
                run.mark_ceiling = true;
                let texmid = if line.flags.contains(LinedefFlags::LOWER_UNPEGGED) {
                    front.floor_height + Fixed::from_int(mid.height as i32) - view.z
                } else {
                    world_top
                };
                run.mid_texmid = texmid + side.row_offset;
                ds.silhouette = Silhouette::SOLID;
                ds.top_clip = SilClip::Solid;
                ds.bottom_clip = SilClip::Solid;
                ds.bsil_height = Fixed::MAX;
                ds.tsil_height = Fixed::MIN;
            }
            Some(back) => {
                if front.floor_height > back.floor_height {
                    ds.silhouette |= Silhouette::BOTTOM;
                    ds.bsil_height = front.floor_height;
                } else if back.floor_height > view.z {
                    ds.silhouette |= Silhouette::BOTTOM;
                    ds.bsil_height = Fixed::MAX;
                }
                if front.ceiling_height < back.ceiling_height {
                    ds.silhouette |= Silhouette::TOP;
                    ds.tsil_height = front.ceiling_height;
                } else if back.ceiling_height < view.z {
                    ds.silhouette |= Silhouette::TOP;
                    ds.tsil_height = Fixed::MIN;
                }
                let closed = back.ceiling_height <= front.floor_height
                    || back.floor_height >= front.ceiling_height;
                if back.ceiling_height <= front.floor_height {
                    ds.bottom_clip = SilClip::Solid;
                    ds.bsil_height = Fixed::MAX;
                    ds.silhouette |= Silhouette::BOTTOM;
                }
                if back.floor_height >= front.ceiling_height {
                    ds.top_clip = SilClip::Solid;
                    ds.tsil_height = Fixed::MIN;
                    ds.silhouette |= Silhouette::TOP;
                }

                world_high = back.ceiling_height - view.z;
                world_low = back.floor_height - view.z;

                // both ceilings are sky: the upper wall would hide the sky
                if bank.is_sky(front.ceiling_pic) && bank.is_sky(back.ceiling_pic) {
                    world_top = world_high;
                }

                run.mark_floor = world_low != world_bottom
                    || back.floor_pic != front.floor_pic
                    || back.light != front.light;
                run.mark_ceiling = world_high != world_top
                    || back.ceiling_pic != front.ceiling_pic
                    || back.light != front.light;
                if closed {
                    run.mark_floor = true;
                    run.mark_ceiling = true;
                }

                if world_high < world_top {
                    if let Some(upper) = side.upper.map(|t| bank.texture_or_missing(t)) {
                        run.top = Some(upper);
                        let texmid = if line.flags.contains(LinedefFlags::UPPER_UNPEGGED) {
                            world_top
                        } else {
                            back.ceiling_height + Fixed::from_int(upper.height as i32) - view.z
                        };
                        run.top_texmid = texmid + side.row_offset;
                    }
                }
                if world_low > world_bottom {
                    if let Some(lower) = side.lower.map(|t| bank.texture_or_missing(t)) {
                        run.bottom = Some(lower);
                        let texmid = if line.flags.contains(LinedefFlags::LOWER_UNPEGGED) {
                            world_top
                        } else {
                            world_low
                        };
                        run.bottom_texmid = texmid + side.row_offset;
                    }
                }

                // see-through middle: drawn later, back to front with sprites
                if side.middle.is_some() {
                    let base = self.openings.alloc((stop - start + 1) as usize);
                    run.masked = Some(base);
                    ds.masked_cols = Some(base);
                }
            }
        }

        run.textured = run.mid.is_some() || run.top.is_some() || run.bottom.is_some() || run.masked.is_some();

        if run.textured {
            let rel = normal - rw_angle1;
            let mut offset = hyp * self.tables.sin(abs_capped(rel));
            if rel < Angle::ANG180 {
                offset = -offset;
            }
            run.offset = offset + side.texture_offset + seg.offset;
            run.center_angle = Angle::ANG90 + view.angle - normal;

            // axis-aligned walls get a little fake contrast
            let contrast = if v1.y == v2.y {
                -1
            } else if v1.x == v2.x {
                1
            } else {
                0
            };
            run.light = light_level(front.light, contrast);
        }

        /* nothing to mark on the far side of a plane ------------------------*/
        if front.floor_height >= view.z || self.floor_plane.is_none() {
            run.mark_floor = false;
        }
        if (front.ceiling_height <= view.z && !bank.is_sky(front.ceiling_pic)) || self.ceiling_plane.is_none() {
            run.mark_ceiling = false;
        }

        /* screen edges in 20.12 ----------------------------------------------*/
        let center = self.proj.center_y_frac() >> 4;
        let world_top = world_top >> 4;
        let world_bottom = world_bottom >> 4;
        run.top_step = -(scale_step * world_top);
        run.top_frac = center - world_top * scale1;
        run.bottom_step = -(scale_step * world_bottom);
        run.bottom_frac = center - world_bottom * scale1;

        if back.is_some() {
            let world_high = world_high >> 4;
            let world_low = world_low >> 4;
            if world_high < world_top {
                run.pix_high = center - world_high * scale1;
                run.pix_high_step = -(scale_step * world_high);
            }
            if world_low > world_bottom {
                run.pix_low = center - world_low * scale1;
                run.pix_low_step = -(scale_step * world_low);
            }
        }

        /* claim plane columns -------------------------------------------------*/
        if run.mark_ceiling {
            if let Some(id) = self.ceiling_plane {
                self.ceiling_plane = Some(self.planes.check(id, start, stop));
            }
        }
        if run.mark_floor {
            if let Some(id) = self.floor_plane {
                self.floor_plane = Some(self.planes.check(id, start, stop));
            }
        }

        self.render_seg_loop(scene, &mut run, start, stop);

        /* save what the sprite pass needs ------------------------------------*/
        if (ds.silhouette.contains(Silhouette::TOP) || run.masked.is_some()) && ds.top_clip == SilClip::None {
            let base = self.openings.alloc((stop - start + 1) as usize);
            for x in start..=stop {
                self.openings[base + (x - start) as usize] = self.clip.top(x);
            }
            ds.top_clip = SilClip::Saved(base);
        }
        if (ds.silhouette.contains(Silhouette::BOTTOM) || run.masked.is_some()) && ds.bottom_clip == SilClip::None {
            let base = self.openings.alloc((stop - start + 1) as usize);
            for x in start..=stop {
                self.openings[base + (x - start) as usize] = self.clip.bottom(x);
            }
            ds.bottom_clip = SilClip::Saved(base);
        }
        if run.masked.is_some() && !ds.silhouette.contains(Silhouette::TOP) {
            ds.silhouette |= Silhouette::TOP;
            ds.tsil_height = Fixed::MIN;
        }
        if run.masked.is_some() && !ds.silhouette.contains(Silhouette::BOTTOM) {
            ds.silhouette |= Silhouette::BOTTOM;
            ds.bsil_height = Fixed::MAX;
        }
        self.drawsegs.push(ds);
    }

    fn render_seg_loop<'a>(&mut self, scene: &Scene, run: &mut WallRun<'a>, start: i32, stop: i32) {
        let bank = scene.bank;
        let colormaps = bank.colormaps();
        let center_y = self.proj.center_y();
        let lights = self.proj.scale_light(run.light);

        for x in start..=stop {
            let ceil_clip = self.clip.top(x);
            let floor_clip = self.clip.bottom(x);

            /* visible wall extent, and the ceiling above it */
            let yl = ((run.top_frac.bits() + HEIGHTUNIT - 1) >> HEIGHTBITS).max(ceil_clip + 1);
            if run.mark_ceiling {
                let top = ceil_clip + 1;
                let bottom = (yl - 1).min(floor_clip - 1);
                if top <= bottom {
                    if let Some(id) = self.ceiling_plane {
                        self.planes.get_mut(id).mark(x, top, bottom);
                    }
                }
            }

            let yh = (run.bottom_frac.bits() >> HEIGHTBITS).min(floor_clip - 1);
            if run.mark_floor {
                let top = (yh + 1).max(ceil_clip + 1);
                let bottom = floor_clip - 1;
                if top <= bottom {
                    if let Some(id) = self.floor_plane {
                        self.planes.get_mut(id).mark(x, top, bottom);
                    }
                }
            }

            /* texture column and light */
            let mut column = 0;
            let mut iscale = Fixed::ONE;
            let mut colormap = &colormaps[0];
            if run.textured {
                let fine = (run.center_angle + self.proj.x_to_view_angle(x as usize)).bits() >> ANGLETOFINESHIFT;
                let along = run.offset - self.tables.fine_tangent(fine as usize) * run.distance;
                column = along.bits() >> FRACBITS;
                colormap = match self.view.fixed_colormap {
                    Some(m) => &colormaps[m as usize],
                    None => &colormaps[lights[scale_index(run.scale)] as usize],
                };
                iscale = Fixed::from_bits((u32::MAX / run.scale.bits().max(1) as u32) as i32);
            }

            let mut fx = Effects {
                tranmap: None,
                fuzz_map: &colormaps[0],
                fuzz_pos: &mut self.fuzz_pos,
            };
            let job = |yl: i32, yh: i32, tex: &'a Texture, texturemid: Fixed| ColumnJob {
                x,
                yl,
                yh,
                iscale,
                texturemid,
                source: tex.column(column),
                tiled: true,
                colormap,
                kind: ColumnKind::Opaque,
            };

            if let Some(mid) = run.mid {
                // single sided: draw and close the column
                if yl <= yh {
                    draw_column(&mut self.fb, center_y, &job(yl, yh, mid, run.mid_texmid), &mut fx);
                }
                self.clip.close(x);
            } else {
                if let Some(top) = run.top {
                    let mid = (run.pix_high.bits() >> HEIGHTBITS).min(floor_clip - 1);
                    run.pix_high += run.pix_high_step;
                    if mid >= yl {
                        draw_column(&mut self.fb, center_y, &job(yl, mid, top, run.top_texmid), &mut fx);
                        self.clip.raise_top(x, mid);
                    } else {
                        self.clip.raise_top(x, yl - 1);
                    }
                } else if run.mark_ceiling {
                    self.clip.raise_top(x, yl - 1);
                }

                if let Some(bottom) = run.bottom {
                    let mid = ((run.pix_low.bits() + HEIGHTUNIT - 1) >> HEIGHTBITS).max(ceil_clip + 1);
                    run.pix_low += run.pix_low_step;
                    if mid <= yh {
                        draw_column(&mut self.fb, center_y, &job(mid, yh, bottom, run.bottom_texmid), &mut fx);
                        self.clip.lower_bottom(x, mid);
                    } else {
                        self.clip.lower_bottom(x, yh + 1);
                    }
                } else if run.mark_floor {
                    self.clip.lower_bottom(x, yh + 1);
                }

                if let Some(base) = run.masked {
                    self.openings[base + (x - start) as usize] = column;
                }
            }

            run.scale += run.scale_step;
            run.top_frac += run.top_step;
            run.bottom_frac += run.bottom_step;
        }
    }
}
