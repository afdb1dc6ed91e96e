//! Things and see-through walls: projected while the BSP walk runs, then
//! composited back to front once every wall and plane is down.

use std::cmp::Reverse;
use std::ops::{Index, IndexMut};

use bitflags::bitflags;
use log::warn;

use crate::math::{FRACBITS, FRACUNIT, Fixed};
use crate::renderer::FrameBuffer;
use crate::renderer::SpriteDesc;
use crate::renderer::software::{
    Software,
    draw::{ColumnJob, ColumnKind, Effects, draw_column},
    projection::{light_level, scale_index},
    renderer::Scene,
};
use crate::world::{LinedefFlags, PLACEHOLDER, PatchId, Post, SectorId, SegmentId};

/// Things nearer than this are not drawn.
const MINZ: Fixed = Fixed::from_int(4);

/// Colormap the fuzz effect darkens through.
const FUZZ_COLORMAP: usize = 6;

/// Marks a masked column that has already been drawn.
const DRAWN: i32 = i32::MAX;

/// Not yet clipped by any drawseg.
const UNCLIPPED: i32 = -2;

/// Per-frame pool for saved clip rows and masked texture columns.
#[derive(Default)]
pub struct Openings {
    data: Vec<i32>,
    cursor: usize,
}

impl Openings {
    /// Reserve `len` consecutive slots and return the first index.
    pub fn alloc(&mut self, len: usize) -> usize {
        let start = self.cursor;
        self.cursor += len;

        if self.cursor > self.data.len() {
            self.data.resize(self.cursor.next_power_of_two(), 0);
        }
        start
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Row limit of `clip` at offset `i` into its drawseg; `solid` when the
    /// seg clips the whole column.
    #[inline]
    fn resolve(&self, clip: SilClip, solid: i32, i: usize) -> Option<i32> {
        match clip {
            SilClip::None => None,
            SilClip::Solid => Some(solid),
            SilClip::Saved(base) => Some(self.data[base + i]),
        }
    }
}

impl Index<usize> for Openings {
    type Output = i32;
    fn index(&self, i: usize) -> &i32 {
        &self.data[i]
    }
}

impl IndexMut<usize> for Openings {
    fn index_mut(&mut self, i: usize) -> &mut i32 {
        &mut self.data[i]
    }
}

bitflags! {
    /// Which edges of a drawseg occlude things behind it.
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Silhouette: u8 {
        const BOTTOM = 0x01;
        const TOP    = 0x02;
        const SOLID  = 0x03;
    }
}

/// Where a drawseg's clip rows live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SilClip {
    #[default]
    None,
    /// Every row of every column is hidden.
    Solid,
    /// One row per column, starting at this index into [`Openings`].
    Saved(usize),
}

/// A drawn wall range, kept for clipping things and for the masked pass.
#[derive(Clone, Copy, Debug)]
pub struct DrawSeg {
    pub seg: SegmentId,
    pub x1: i32,
    pub x2: i32,

    pub scale1: Fixed,
    pub scale2: Fixed,
    pub scale_step: Fixed,

    pub silhouette: Silhouette,
    /// Do not clip things whose feet are at or above this.
    pub bsil_height: Fixed,
    /// Do not clip things whose head is at or below this.
    pub tsil_height: Fixed,

    pub top_clip: SilClip,
    pub bottom_clip: SilClip,
    /// Texture column per screen column of the see-through middle.
    pub masked_cols: Option<usize>,
}

/// A projected thing.
#[derive(Clone, Copy, Debug)]
pub struct VisSprite {
    pub id: u32,
    pub x1: i32,
    pub x2: i32,

    /// World position, for the side test against segs.
    pub gx: Fixed,
    pub gy: Fixed,
    /// Feet and head height.
    pub gz: Fixed,
    pub gzt: Fixed,

    /// Distance along the view direction.
    pub depth: Fixed,
    pub scale: Fixed,
    /// Texture columns per screen column; negative when mirrored.
    pub xiscale: Fixed,
    pub start_frac: Fixed,
    pub texturemid: Fixed,

    pub patch: PatchId,
    pub colormap: usize,
    pub kind: ColumnKind,
}

/// Far to near; equal depths in id order.
pub(super) fn sort_vissprites(sprites: &mut [VisSprite]) {
    sprites.sort_unstable_by_key(|s| (Reverse(s.depth), s.id));
}

/// One patch column's worth of posts, placed on screen.
struct MaskedColumn<'a> {
    x: i32,
    top_screen: Fixed,
    scale: Fixed,
    iscale: Fixed,
    texturemid: Fixed,
    colormap: &'a [u8; 256],
    kind: ColumnKind,
    /// Rows strictly between these are open.
    ceiling_clip: i32,
    floor_clip: i32,
}

fn draw_masked_column<'p>(
    fb: &mut FrameBuffer,
    center_y: i32,
    posts: impl Iterator<Item = Post<'p>>,
    col: &MaskedColumn,
    fx: &mut Effects,
) {
    for post in posts {
        let top = col.top_screen + col.scale.mul_int(post.top_delta);
        let bottom = top + col.scale.mul_int(post.pixels.len() as i32);

        let yl = ((top.bits() + FRACUNIT - 1) >> FRACBITS).max(col.ceiling_clip + 1);
        let yh = ((bottom.bits() - 1) >> FRACBITS).min(col.floor_clip - 1);
        if yl > yh {
            continue;
        }
        let job = ColumnJob {
            x: col.x,
            yl,
            yh,
            iscale: col.iscale,
            texturemid: col.texturemid - Fixed::from_int(post.top_delta),
            source: post.pixels,
            tiled: false,
            colormap: col.colormap,
            kind: col.kind,
        };
        draw_column(fb, center_y, &job, fx);
    }
}

impl Software {
    /// Project the things of `sector`, once per frame.
    pub(super) fn add_sprites(&mut self, scene: &Scene, sector: SectorId) {
        let s = sector as usize;
        match self.sector_seen.get_mut(s) {
            Some(seen) if !*seen => *seen = true,
            _ => return,
        }
        let light = light_level(scene.level.sectors()[s].light, 0);
        for k in 0..self.sprite_buckets[s].len() {
            let i = self.sprite_buckets[s][k];
            self.project_sprite(scene, &scene.sprites[i], light);
        }
    }

    fn project_sprite(&mut self, scene: &Scene, thing: &SpriteDesc, light: usize) {
        let view = self.view;
        let tr_x = thing.x - view.x;
        let tr_y = thing.y - view.y;

        let tz = tr_x * view.cos + tr_y * view.sin;
        if tz < MINZ {
            return;
        }
        let xscale = self.proj.projection() / tz;

        let tx = tr_x * view.sin - tr_y * view.cos;
        // |tx| > 4 * tz, widened: tz << 2 wraps past 8192 units
        if i64::from(tx.bits()).abs() > i64::from(tz.bits()) << 2 {
            return;
        }

        let def = scene.bank.sprite_or_missing(thing.sprite);
        let Some(frame) = def.frames.get(thing.frame as usize) else {
            warn!("sprite {} has no frame {}", def.name, thing.frame);
            return;
        };
        let rot = if frame.rotate {
            let ang = view.angle_to(&self.tables, thing.x, thing.y);
            ((ang - thing.angle).bits().wrapping_add(0x9000_0000) >> 29) as usize
        } else {
            0
        };
        let (patch_id, flip) = (frame.patches[rot], frame.flip[rot]);
        let patch = scene.bank.patch_or_missing(patch_id);

        /* horizontal extent */
        let w = self.fb.width() as i32;
        let center = self.proj.center_x_frac();
        let left = tx - Fixed::from_int(patch.left_offset());
        let x1 = (center + left * xscale).bits() >> FRACBITS;
        if x1 >= w {
            return;
        }
        let right = left + Fixed::from_int(patch.width() as i32);
        let x2 = ((center + right * xscale).bits() >> FRACBITS) - 1;
        if x2 < 0 || x2 < x1 {
            return;
        }

        let gzt = thing.z + Fixed::from_int(patch.top_offset());
        let iscale = Fixed::ONE / xscale;
        let (mut start_frac, xiscale) = if flip {
            (Fixed::from_int(patch.width() as i32) - Fixed::from_bits(1), -iscale)
        } else {
            (Fixed::ZERO, iscale)
        };
        let vis_x1 = x1.max(0);
        if vis_x1 > x1 {
            start_frac += xiscale.mul_int(vis_x1 - x1);
        }

        let kind = if thing.translucent {
            ColumnKind::Translucent
        } else {
            ColumnKind::Opaque
        };
        let colormap = match (view.fixed_colormap, thing.fullbright) {
            (Some(m), _) => m as usize,
            (None, true) => 0,
            (None, false) => self.proj.scale_light(light)[scale_index(xscale)] as usize,
        };

        self.vissprites.push(VisSprite {
            id: thing.id,
            x1: vis_x1,
            x2: x2.min(w - 1),
            gx: thing.x,
            gy: thing.y,
            gz: thing.z,
            gzt,
            depth: tz,
            scale: xscale,
            xiscale,
            start_frac,
            texturemid: gzt - view.z,
            patch: patch_id,
            colormap,
            kind,
        });
        self.stats.sprites += 1;
    }

    /// Things far to near, then whatever see-through walls are left.
    pub(super) fn draw_masked(&mut self, scene: &Scene) {
        sort_vissprites(&mut self.vissprites);
        for i in 0..self.vissprites.len() {
            let spr = self.vissprites[i];
            self.draw_sprite(scene, &spr);
        }

        for d in (0..self.drawsegs.len()).rev() {
            let ds = self.drawsegs[d];
            if ds.masked_cols.is_some() {
                self.render_masked_seg_range(scene, d, ds.x1, ds.x2);
            }
        }
    }

    fn draw_sprite(&mut self, scene: &Scene, spr: &VisSprite) {
        let (x1, x2) = (spr.x1, spr.x2);
        if x1 > x2 {
            return;
        }
        let span = x1 as usize..=x2 as usize;
        self.sprite_top[span.clone()].fill(UNCLIPPED);
        self.sprite_bottom[span.clone()].fill(UNCLIPPED);

        /* nearest drawsegs first: the first clip to reach a column wins */
        for d in (0..self.drawsegs.len()).rev() {
            let ds = self.drawsegs[d];
            if ds.x1 > x2 || ds.x2 < x1 || (ds.silhouette.is_empty() && ds.masked_cols.is_none()) {
                continue;
            }
            let r1 = ds.x1.max(x1);
            let r2 = ds.x2.min(x2);

            let (low, high) = if ds.scale1 > ds.scale2 {
                (ds.scale2, ds.scale1)
            } else {
                (ds.scale1, ds.scale2)
            };
            let behind = high < spr.scale
                || (low < spr.scale
                    && scene
                        .level
                        .seg_line(&scene.level.segs()[ds.seg as usize])
                        .point_on_side(spr.gx, spr.gy)
                        == 0);
            if behind {
                // the wall is further back, its see-through part goes first
                if ds.masked_cols.is_some() {
                    self.render_masked_seg_range(scene, d, r1, r2);
                }
                continue;
            }

            let mut sil = ds.silhouette;
            if spr.gz >= ds.bsil_height {
                sil.remove(Silhouette::BOTTOM);
            }
            if spr.gzt <= ds.tsil_height {
                sil.remove(Silhouette::TOP);
            }
            let h = self.fb.height() as i32;
            for x in r1..=r2 {
                let (i, o) = (x as usize, (x - ds.x1) as usize);
                if sil.contains(Silhouette::BOTTOM) && self.sprite_bottom[i] == UNCLIPPED {
                    if let Some(y) = self.openings.resolve(ds.bottom_clip, -1, o) {
                        self.sprite_bottom[i] = y;
                    }
                }
                if sil.contains(Silhouette::TOP) && self.sprite_top[i] == UNCLIPPED {
                    if let Some(y) = self.openings.resolve(ds.top_clip, h, o) {
                        self.sprite_top[i] = y;
                    }
                }
            }
        }

        /* unclipped columns are open top to bottom */
        let h = self.fb.height() as i32;
        for b in &mut self.sprite_bottom[span.clone()] {
            if *b == UNCLIPPED {
                *b = h;
            }
        }
        for t in &mut self.sprite_top[span] {
            if *t == UNCLIPPED {
                *t = -1;
            }
        }

        self.draw_vissprite(scene, spr);
    }

    fn draw_vissprite(&mut self, scene: &Scene, spr: &VisSprite) {
        let bank = scene.bank;
        let colormaps = bank.colormaps();
        let patch = bank.patch_or_missing(spr.patch);
        let center_y = self.proj.center_y();
        let top_screen = self.proj.center_y_frac() - spr.texturemid * spr.scale;

        let Software {
            fb,
            fuzz_pos,
            sprite_top,
            sprite_bottom,
            ..
        } = self;
        let mut fx = Effects {
            tranmap: bank.tranmap(),
            fuzz_map: &colormaps[FUZZ_COLORMAP],
            fuzz_pos,
        };

        let mut frac = spr.start_frac;
        for x in spr.x1..=spr.x2 {
            let col = frac.bits() >> FRACBITS;
            frac += spr.xiscale;
            if col < 0 {
                continue;
            }
            let column = MaskedColumn {
                x,
                top_screen,
                scale: spr.scale,
                iscale: spr.xiscale.abs(),
                texturemid: spr.texturemid,
                colormap: &colormaps[spr.colormap],
                kind: spr.kind,
                ceiling_clip: sprite_top[x as usize],
                floor_clip: sprite_bottom[x as usize],
            };
            draw_masked_column(fb, center_y, patch.posts(col as usize), &column, &mut fx);
        }
    }

    /// Draw columns `x1 ..= x2` of drawseg `d`'s see-through middle that
    /// have not been drawn yet.
    fn render_masked_seg_range(&mut self, scene: &Scene, d: usize, x1: i32, x2: i32) {
        let ds = self.drawsegs[d];
        let Some(base) = ds.masked_cols else {
            return;
        };
        let (level, bank) = (scene.level, scene.bank);
        let seg = &level.segs()[ds.seg as usize];
        let Some(back) = seg.back_sector.map(|s| &level.sectors()[s as usize]) else {
            return;
        };
        let front = &level.sectors()[seg.front_sector as usize];
        let side = &level.sidedefs()[seg.sidedef as usize];
        let line = &level.linedefs()[seg.linedef as usize];
        let tex = bank.texture_or_missing(side.middle.unwrap_or(PLACEHOLDER));

        let v1 = level.vertices()[seg.v1 as usize];
        let v2 = level.vertices()[seg.v2 as usize];
        let contrast = if v1.y == v2.y {
            -1
        } else if v1.x == v2.x {
            1
        } else {
            0
        };
        let colormaps = bank.colormaps();
        let lights = *self.proj.scale_light(light_level(front.light, contrast));
        let view = self.view;

        let texturemid = side.row_offset
            + if line.flags.contains(LinedefFlags::LOWER_UNPEGGED) {
                front.floor_height.max(back.floor_height) + Fixed::from_int(tex.height as i32) - view.z
            } else {
                front.ceiling_height.min(back.ceiling_height) - view.z
            };

        let center_y = self.proj.center_y();
        let center_y_frac = self.proj.center_y_frac();
        let h = self.fb.height() as i32;
        let mut scale = ds.scale1 + ds.scale_step.mul_int(x1 - ds.x1);

        let Software {
            fb,
            fuzz_pos,
            openings,
            ..
        } = self;
        let mut fx = Effects {
            tranmap: None,
            fuzz_map: &colormaps[FUZZ_COLORMAP],
            fuzz_pos,
        };

        for x in x1..=x2 {
            let o = (x - ds.x1) as usize;
            let col = openings[base + o];
            if col != DRAWN {
                let colormap = match view.fixed_colormap {
                    Some(m) => &colormaps[m as usize],
                    None => &colormaps[lights[scale_index(scale)] as usize],
                };
                let column = MaskedColumn {
                    x,
                    top_screen: center_y_frac - texturemid * scale,
                    scale,
                    iscale: Fixed::from_bits((u32::MAX / scale.bits().max(1) as u32) as i32),
                    texturemid,
                    colormap,
                    kind: ColumnKind::Opaque,
                    ceiling_clip: openings.resolve(ds.top_clip, h, o).unwrap_or(-1),
                    floor_clip: openings.resolve(ds.bottom_clip, -1, o).unwrap_or(h),
                };
                let posts = tex.patch().posts(tex.column_index(col));
                draw_masked_column(fb, center_y, posts, &column, &mut fx);
                openings[base + o] = DRAWN;
            }
            scale += ds.scale_step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::math::{Angle, Tables};
    use crate::renderer::{RendererExt, ViewParams};
    use crate::world::{ResourceMode, demo};

    fn software(w: usize, h: usize) -> Software {
        let config = RenderConfig {
            width: w,
            height: h,
            ..RenderConfig::default()
        };
        Software::new(&config, Tables::new())
    }

    fn view(x: i32, y: i32, degrees: f32) -> ViewParams {
        ViewParams {
            x: Fixed::from_int(x),
            y: Fixed::from_int(y),
            z: Fixed::from_int(64),
            angle: Angle::from_degrees(degrees),
            fov: Angle::ANG90,
            fixed_colormap: None,
        }
    }

    fn ball(bank: &crate::world::ResourceBank, id: u32, x: i32, y: i32) -> SpriteDesc {
        SpriteDesc {
            id,
            x: Fixed::from_int(x),
            y: Fixed::from_int(y),
            z: Fixed::ZERO,
            angle: Angle::ZERO,
            sprite: bank.sprite_id("BALL").unwrap(),
            frame: 0,
            translucent: false,
            fullbright: false,
        }
    }

    fn vis(id: u32, depth: i32) -> VisSprite {
        VisSprite {
            id,
            x1: 0,
            x2: 0,
            gx: Fixed::ZERO,
            gy: Fixed::ZERO,
            gz: Fixed::ZERO,
            gzt: Fixed::ZERO,
            depth: Fixed::from_int(depth),
            scale: Fixed::from_int(160) / Fixed::from_int(depth),
            xiscale: Fixed::ONE,
            start_frac: Fixed::ZERO,
            texturemid: Fixed::ZERO,
            patch: 0,
            colormap: 0,
            kind: ColumnKind::Opaque,
        }
    }

    #[test]
    fn openings_hand_out_consecutive_slots() {
        let mut op = Openings::default();
        let a = op.alloc(3);
        let b = op.alloc(5);
        assert_eq!((a, b), (0, 3));
        op[b + 4] = 7;
        assert_eq!(op[7], 7);
        op.reset();
        assert_eq!(op.alloc(1), 0);
        assert_eq!(op.resolve(SilClip::Solid, 9, 0), Some(9));
        assert_eq!(op.resolve(SilClip::None, 9, 0), None);
    }

    #[test]
    fn far_sprites_first_ties_by_id() {
        let mut v = vec![vis(5, 100), vis(2, 300), vis(9, 100), vis(1, 100)];
        sort_vissprites(&mut v);
        let order: Vec<u32> = v.iter().map(|s| s.id).collect();
        assert_eq!(order, [2, 1, 5, 9]);
    }

    #[test]
    fn distant_things_project_and_sort_by_depth() {
        let bank = demo::demo_bank(ResourceMode::Strict).unwrap();
        let level = demo::square_room(&bank, &Tables::new(), 12_000).unwrap();
        let mut sw = software(320, 200);
        let things = [
            ball(&bank, 1, 9000, 0),
            ball(&bank, 2, 8000, 0),
            // one unit behind id 2: same scale, but farther
            ball(&bank, 9, 8001, 0),
        ];
        sw.render_frame(&view(0, 0, 0.0), &level, &bank, &things, |_| ());
        assert_eq!(sw.stats().sprites, 3);

        let order: Vec<u32> = sw.vissprites.iter().map(|s| s.id).collect();
        assert_eq!(order, [1, 9, 2]);
        assert_eq!(sw.vissprites[1].scale, sw.vissprites[2].scale);
    }

    #[test]
    fn things_behind_or_beside_the_viewer_are_rejected() {
        let bank = demo::demo_bank(ResourceMode::Strict).unwrap();
        let level = demo::square_room(&bank, &Tables::new(), 128).unwrap();
        let mut sw = software(160, 100);
        let things = [
            ball(&bank, 1, -60, 0), // behind
            ball(&bank, 2, 2, 0),   // inside the near limit
            ball(&bank, 3, 10, 60), // far outside the view cone
            ball(&bank, 4, 60, 10), // in view
        ];
        sw.render_frame(&view(0, 0, 0.0), &level, &bank, &things, |_| ());
        assert_eq!(sw.stats().sprites, 1);
        assert_eq!(sw.vissprites[0].id, 4);
    }

    #[test]
    fn solid_wall_hides_things_behind_it() {
        let bank = demo::demo_bank(ResourceMode::Strict).unwrap();
        let level = demo::square_room(&bank, &Tables::new(), 128).unwrap();
        let mut sw = software(160, 100);
        let mut px = Vec::new();
        // outside the room, straight ahead
        let things = [ball(&bank, 1, 300, 0)];
        sw.render_frame(&view(0, 0, 0.0), &level, &bank, &things, |fb| px = fb.pixels().to_vec());
        assert_eq!(sw.stats().sprites, 1);
        assert!(!px.iter().any(|p| demo::BALL.contains(p)));
    }

    #[test]
    fn grate_shows_the_room_beyond() {
        let bank = demo::demo_bank(ResourceMode::Strict).unwrap();
        let level = demo::room_chain(&bank, &Tables::new(), 5).unwrap();
        let (w, h) = (160, 100);
        let mut sw = software(w, h);
        let mut px = Vec::new();
        // room 3, facing the grated opening into room 4
        sw.render_frame(&view(800, 128, 0.0), &level, &bank, &[], |fb| px = fb.pixels().to_vec());

        // grate texel rows 36..40 at this height: between the bars
        let row = &px[46 * w..47 * w];
        assert!(row.iter().any(|p| demo::GRATE.contains(p)));
        assert!(row.iter().any(|p| demo::STONE.contains(p)));

        // every masked column was consumed by the masked pass
        let ds = sw.drawsegs.iter().find(|ds| ds.masked_cols.is_some()).unwrap();
        let base = ds.masked_cols.unwrap();
        assert!((0..=(ds.x2 - ds.x1) as usize).all(|o| sw.openings[base + o] == DRAWN));
    }
}
