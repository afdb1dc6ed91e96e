use log::trace;
use smallvec::SmallVec;

use crate::{
    config::RenderConfig,
    math::{Angle, Tables},
    renderer::software::{
        bsp::Walker,
        planes::{PlaneMap, VisplaneId},
        projection::{Projection, View},
        sprites::{DrawSeg, Openings, VisSprite},
    },
    renderer::{FrameBuffer, Renderer, SpriteDesc, ViewParams},
    world::{Level, ResourceBank},
};

/// What one frame draws from.  Everything is read-only while rendering.
#[derive(Clone, Copy)]
pub(super) struct Scene<'a> {
    pub level: &'a Level,
    pub bank: &'a ResourceBank,
    pub sprites: &'a [SpriteDesc],
}

/// Per-column vertical window that is still open.  Rows
/// `ceiling[x] + 1 ..= floor[x] - 1` may be drawn.
///
/// Writes only ever narrow the window and are clamped to `-1 ..= height`.
/// A window with no rows left snaps to closed (`height`, `-1`).
#[derive(Default, Debug)]
pub(super) struct ClipWindows {
    ceiling: Vec<i16>,
    floor: Vec<i16>,
    height: i16,
}

impl ClipWindows {
    pub fn new(width: usize, height: usize) -> Self {
        let height = height.min(i16::MAX as usize - 1) as i16;
        Self {
            ceiling: vec![-1; width],
            floor: vec![height; width],
            height,
        }
    }

    pub fn reset(&mut self) {
        self.ceiling.fill(-1);
        self.floor.fill(self.height);
    }

    #[inline]
    pub fn top(&self, x: i32) -> i32 {
        self.ceiling[x as usize] as i32
    }

    #[inline]
    pub fn bottom(&self, x: i32) -> i32 {
        self.floor[x as usize] as i32
    }

    /// Narrow the window from above: row `y` and everything over it is taken.
    #[inline]
    pub fn raise_top(&mut self, x: i32, y: i32) {
        let y = y.clamp(-1, self.height as i32) as i16;
        let c = &mut self.ceiling[x as usize];
        *c = (*c).max(y);
        self.close_if_empty(x);
    }

    /// Narrow the window from below: row `y` and everything under it is taken.
    #[inline]
    pub fn lower_bottom(&mut self, x: i32, y: i32) {
        let y = y.clamp(-1, self.height as i32) as i16;
        let f = &mut self.floor[x as usize];
        *f = (*f).min(y);
        self.close_if_empty(x);
    }

    #[inline]
    fn close_if_empty(&mut self, x: i32) {
        let i = x as usize;
        if self.ceiling[i] + 1 >= self.floor[i] {
            self.close(x);
        }
    }

    /// True once nothing further back can show through column `x`.
    #[cfg(test)]
    pub fn is_closed(&self, x: i32) -> bool {
        self.ceiling[x as usize] == self.height && self.floor[x as usize] == -1
    }

    /// Nothing further back shows through column `x`.
    #[inline]
    pub fn close(&mut self, x: i32) {
        self.ceiling[x as usize] = self.height;
        self.floor[x as usize] = -1;
    }

    pub fn ceiling(&self) -> &[i16] {
        &self.ceiling
    }

    pub fn floor(&self) -> &[i16] {
        &self.floor
    }
}

/// Inclusive run of fully occluded columns.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct ClipRange {
    pub first: i32,
    pub last: i32,
}

/// Counters for the last rendered frame.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct FrameStats {
    pub subsectors: usize,
    /// Visible wall ranges handed to the wall rasteriser.
    pub wall_ranges: usize,
    /// Ranges skipped because their scale collapsed.
    pub degenerate_ranges: usize,
    pub visplanes: usize,
    pub sprites: usize,
}

/// Doom-style column/span renderer.
///
/// Owns the trigonometric tables, the projection for the current
/// resolution and field of view, the frame buffer and every per-frame
/// scratch structure.  Nothing survives from one frame to the next except
/// allocations.
pub struct Software {
    pub(super) tables: Tables,
    pub(super) proj: Projection,
    pub(super) fb: FrameBuffer,
    pub(super) view: View,

    /* occlusion */
    pub(super) clip: ClipWindows,
    pub(super) solid_segs: SmallVec<[ClipRange; 32]>,

    /* floors and ceilings */
    pub(super) planes: PlaneMap,
    pub(super) floor_plane: Option<VisplaneId>,
    pub(super) ceiling_plane: Option<VisplaneId>,

    /* walls kept for sprite clipping */
    pub(super) drawsegs: Vec<DrawSeg>,
    pub(super) openings: Openings,

    /* sprites */
    pub(super) vissprites: Vec<VisSprite>,
    pub(super) sprite_buckets: Vec<SmallVec<[usize; 4]>>,
    pub(super) sector_seen: Vec<bool>,
    pub(super) sprite_top: Vec<i32>,
    pub(super) sprite_bottom: Vec<i32>,

    pub(super) fuzz_pos: usize,
    pub(super) stats: FrameStats,
}

impl Software {
    pub fn new(config: &RenderConfig, tables: Tables) -> Self {
        let (w, h) = (config.width, config.height);
        let proj = Projection::new(w, h, Angle::from_degrees(config.fov_degrees), &tables);
        Self {
            tables,
            proj,
            fb: FrameBuffer::new(w, h),
            view: View::default(),
            clip: ClipWindows::new(w, h),
            solid_segs: SmallVec::new(),
            planes: PlaneMap::new(w, h),
            floor_plane: None,
            ceiling_plane: None,
            drawsegs: Vec::new(),
            openings: Openings::default(),
            vissprites: Vec::new(),
            sprite_buckets: Vec::new(),
            sector_seen: Vec::new(),
            sprite_top: vec![0; w],
            sprite_bottom: vec![0; w],
            fuzz_pos: 0,
            stats: FrameStats::default(),
        }
    }

    /// Column ↔ angle mapping of the current frame.
    pub fn projection(&self) -> &Projection {
        &self.proj
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.fb
    }

    /// Change resolution; takes effect from the next frame.
    pub fn resize(&mut self, width: usize, height: usize) {
        if width == self.fb.width() && height == self.fb.height() {
            return;
        }
        let fov = self.proj.fov();
        self.proj = Projection::new(width, height, fov, &self.tables);
        self.fb = FrameBuffer::new(width, height);
        self.clip = ClipWindows::new(width, height);
        self.planes = PlaneMap::new(width, height);
        self.sprite_top = vec![0; width];
        self.sprite_bottom = vec![0; width];
    }

    /// Group sprites by the sector under their origin; a sector's sprites
    /// are projected the first time one of its subsectors is drawn.
    fn bucket_sprites(&mut self, scene: &Scene) {
        let sectors = scene.level.sectors().len();
        self.sector_seen.clear();
        self.sector_seen.resize(sectors, false);
        self.sprite_buckets.iter_mut().for_each(|b| b.clear());
        self.sprite_buckets.resize_with(sectors, SmallVec::new);

        for (i, s) in scene.sprites.iter().enumerate() {
            let sector = scene.level.sector_at(s.x, s.y) as usize;
            self.sprite_buckets[sector].push(i);
        }
    }
}

/*──────────────────────── Renderer trait impl ────────────────────────*/
impl Renderer for Software {
    fn begin_frame(&mut self, view: &ViewParams) {
        let (w, h) = (self.fb.width(), self.fb.height());
        if !self.proj.matches(w, h, view.fov) {
            self.proj = Projection::new(w, h, view.fov, &self.tables);
        }
        self.view = View::new(view, &self.proj, &self.tables);

        self.fb.clear(0);
        self.clip.reset();
        self.init_solid_segs();
        self.planes.clear();
        self.floor_plane = None;
        self.ceiling_plane = None;
        self.drawsegs.clear();
        self.openings.reset();
        self.vissprites.clear();
        self.fuzz_pos = 0;
        self.stats = FrameStats::default();
    }

    fn draw_level(&mut self, level: &Level, bank: &ResourceBank, sprites: &[SpriteDesc]) {
        let scene = Scene {
            level,
            bank,
            sprites,
        };
        self.bucket_sprites(&scene);

        let (x, y) = (self.view.x, self.view.y);
        level.walk(x, y, &mut Walker { sw: self, scene });

        self.draw_planes(bank);
        self.draw_masked(&scene);

        self.stats.visplanes = self.planes.len();
        trace!("frame: {:?}", self.stats);
    }

    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&FrameBuffer),
    {
        submit(&self.fb);
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;
    use crate::renderer::RendererExt;
    use crate::world::{
        ResourceMode,
        demo::{self, BALL, BRICK, CEIL, FLOOR},
    };

    /* tiny helpers ---------------------------------------------------*/
    fn renderer(w: usize, h: usize) -> Software {
        let config = RenderConfig {
            width: w,
            height: h,
            ..RenderConfig::default()
        };
        Software::new(&config, Tables::new())
    }

    fn view(x: i32, y: i32, z: i32, degrees: f32) -> ViewParams {
        ViewParams {
            x: Fixed::from_int(x),
            y: Fixed::from_int(y),
            z: Fixed::from_int(z),
            angle: Angle::from_degrees(degrees),
            fov: Angle::ANG90,
            fixed_colormap: None,
        }
    }

    fn render(sw: &mut Software, v: &ViewParams, level: &Level, bank: &ResourceBank, sprites: &[SpriteDesc]) -> Vec<u8> {
        let mut out = Vec::new();
        sw.render_frame(v, level, bank, sprites, |fb| out = fb.pixels().to_vec());
        out
    }

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    enum Px {
        Ceil,
        Wall,
        Floor,
        Other,
    }

    fn classify(p: u8) -> Px {
        if CEIL.contains(&p) {
            Px::Ceil
        } else if BRICK.contains(&p) {
            Px::Wall
        } else if FLOOR.contains(&p) {
            Px::Floor
        } else {
            Px::Other
        }
    }

    /// `(ceiling rows, wall rows, floor rows)` of a column that must read
    /// ceiling, then wall, then floor from top to bottom.
    fn column_bands(px: &[u8], w: usize, h: usize, x: usize) -> (usize, usize, usize) {
        let col: Vec<Px> = (0..h).map(|y| classify(px[y * w + x])).collect();
        let c = col.iter().take_while(|&&p| p == Px::Ceil).count();
        let m = col[c..].iter().take_while(|&&p| p == Px::Wall).count();
        let f = col[c + m..].iter().take_while(|&&p| p == Px::Floor).count();
        assert_eq!(c + m + f, h, "column {x} is not ceiling/wall/floor: {col:?}");
        (c, m, f)
    }

    fn square_scene() -> (ResourceBank, Level) {
        let bank = demo::demo_bank(ResourceMode::Strict).unwrap();
        let level = demo::square_room(&bank, &Tables::new(), 128).unwrap();
        (bank, level)
    }

    /* properties ------------------------------------------------------*/

    #[test]
    fn square_room_facing_a_wall_is_flat_and_level() {
        let (bank, level) = square_scene();
        let (w, h) = (160, 100);
        let mut sw = renderer(w, h);
        let px = render(&mut sw, &view(0, 0, 64, 0.0), &level, &bank, &[]);

        let bands: Vec<_> = (0..w).map(|x| column_bands(&px, w, h, x)).collect();
        let (c0, m0, _) = bands[w / 2];
        assert!(m0 > 0);
        for &(c, m, f) in &bands {
            // perpendicular wall: the same band in every column
            assert!(c.abs_diff(c0) <= 1 && m.abs_diff(m0) <= 2);
            // eye halfway up: as much ceiling as floor
            assert!(c.abs_diff(f) <= 2, "ceiling {c} floor {f}");
        }
        assert_eq!(sw.stats().subsectors, 1);
        assert!(sw.stats().wall_ranges >= 1);
        assert_eq!(sw.stats().degenerate_ranges, 0);
    }

    #[test]
    fn square_room_looking_into_a_corner_is_symmetric() {
        let (bank, level) = square_scene();
        let (w, h) = (160, 100);
        let mut sw = renderer(w, h);
        let px = render(&mut sw, &view(0, 0, 64, 45.0), &level, &bank, &[]);

        let heights: Vec<usize> = (0..w).map(|x| column_bands(&px, w, h, x).1).collect();
        for x in 0..w {
            let mirror = heights[w - 1 - x];
            assert!(heights[x].abs_diff(mirror) <= 2, "x={x}: {} vs {mirror}", heights[x]);
        }
        // the corner is the farthest point, so the wall is shortest mid-screen
        assert!(heights[w / 2] < heights[0]);
        assert!(heights[w / 2] < heights[w - 1]);
    }

    #[test]
    fn rendering_is_idempotent() {
        let bank = demo::demo_bank(ResourceMode::Strict).unwrap();
        let t = Tables::new();
        let level = demo::room_chain(&bank, &t, 6).unwrap();
        let sprites = demo::chain_sprites(&bank, &level, 6, 3);
        let mut sw = renderer(200, 120);
        let v = view(40, 128, 41, 10.0);

        let first = render(&mut sw, &v, &level, &bank, &sprites);
        let stats = sw.stats();
        let second = render(&mut sw, &v, &level, &bank, &sprites);
        assert_eq!(first, second);
        assert_eq!(stats, sw.stats());

        // a fresh renderer agrees too
        let mut other = renderer(200, 120);
        assert_eq!(first, render(&mut other, &v, &level, &bank, &sprites));
    }

    #[test]
    fn clip_windows_stay_in_bounds() {
        let bank = demo::demo_bank(ResourceMode::Strict).unwrap();
        let t = Tables::new();
        let level = demo::room_chain(&bank, &t, 5).unwrap();
        let (w, h) = (120, 80);
        let mut sw = renderer(w, h);
        for (x, deg) in [(20, 0.0), (300, 170.0), (600, 30.0), (1000, 200.0)] {
            sw.render_frame(&view(x, 100, 50, deg), &level, &bank, &[], |_| ());
            for x in 0..w {
                let (top, bottom) = (sw.clip.ceiling()[x], sw.clip.floor()[x]);
                assert!((-1..=h as i16).contains(&top));
                assert!((-1..=h as i16).contains(&bottom));
                // either rows are still open, or the column is shut
                assert!(top + 1 < bottom || sw.clip.is_closed(x as i32), "x={x}: {top} {bottom}");
            }
            // the solid-seg list stays sorted and disjoint
            for pair in sw.solid_segs.windows(2) {
                assert!(pair[0].last + 1 < pair[1].first);
            }
        }
    }

    #[test]
    fn sector_changes_between_frames_show_up() {
        let (bank, mut level) = square_scene();
        let (w, h) = (160, 100);
        let mut sw = renderer(w, h);
        let v = view(0, 0, 64, 0.0);
        let before = render(&mut sw, &v, &level, &bank, &[]);
        let (_, _, floor_rows) = column_bands(&before, w, h, w / 2);

        // a lift rises halfway to the eye
        level.sector_mut(0).unwrap().floor_height = Fixed::from_int(32);
        let raised = render(&mut sw, &v, &level, &bank, &[]);
        let (_, _, raised_rows) = column_bands(&raised, w, h, w / 2);
        assert!(raised_rows > floor_rows, "{raised_rows} vs {floor_rows}");

        level.sector_mut(0).unwrap().floor_height = Fixed::ZERO;
        assert_eq!(render(&mut sw, &v, &level, &bank, &[]), before);

        // light only shows once the palette derives real colormaps
        let mut lit = demo::demo_bank(ResourceMode::Strict).unwrap();
        lit.set_palette(demo::demo_palette());
        let bright = render(&mut sw, &v, &level, &lit, &[]);
        level.sector_mut(0).unwrap().light = 48;
        assert_ne!(render(&mut sw, &v, &level, &lit, &[]), bright);
        level.sector_mut(0).unwrap().light = 160;
        assert_eq!(render(&mut sw, &v, &level, &lit, &[]), bright);

        assert!(level.sector_mut(9).is_none());
    }

    #[test]
    fn clip_windows_only_narrow() {
        let h = 50;
        let mut clip = ClipWindows::new(8, h);
        let mut seed = 0x2545_f491_u32;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };
        for _ in 0..400 {
            let x = (next() % 8) as i32;
            let y = (next() % 70) as i32 - 10;
            let before = (clip.top(x), clip.bottom(x));
            if next() % 2 == 0 {
                clip.raise_top(x, y);
            } else {
                clip.lower_bottom(x, y);
            }
            let (top, bottom) = (clip.top(x), clip.bottom(x));
            assert!(top >= before.0 && bottom <= before.1, "{before:?} -> {top} {bottom}");
            assert!((-1..=h as i32).contains(&top) && (-1..=h as i32).contains(&bottom));
            assert!(top + 1 < bottom || clip.is_closed(x));
        }

        // a window squeezed to nothing reads as closed
        clip.reset();
        clip.raise_top(3, 20);
        clip.lower_bottom(3, 21);
        assert!(clip.is_closed(3));
        assert!(!clip.is_closed(4));
    }

    #[test]
    fn every_subsector_in_view_is_visited_once() {
        let bank = demo::demo_bank(ResourceMode::Strict).unwrap();
        let t = Tables::new();
        let level = demo::room_chain(&bank, &t, 4).unwrap();
        let mut sw = renderer(160, 100);
        // looking down the whole chain from the west end
        sw.render_frame(&view(16, 128, 41, 0.0), &level, &bank, &[], |_| ());
        assert_eq!(sw.stats().subsectors, 4);
        // looking at the west wall: the rest of the chain is culled
        sw.render_frame(&view(200, 128, 41, 180.0), &level, &bank, &[], |_| ());
        assert_eq!(sw.stats().subsectors, 1);
    }

    fn thing(id: u32, sprite: u16, x: i32, z: i32) -> SpriteDesc {
        SpriteDesc {
            id,
            x: Fixed::from_int(x),
            y: Fixed::ZERO,
            z: Fixed::from_int(z),
            angle: Angle::ZERO,
            sprite,
            frame: 0,
            translucent: false,
            fullbright: false,
        }
    }

    #[test]
    fn nearer_sprite_covers_farther_one() {
        let (bank, level) = square_scene();
        let ball = bank.sprite_id("BALL").unwrap();
        let arrow = bank.sprite_id("ARRW").unwrap();
        let (w, h) = (160, 100);
        let mut sw = renderer(w, h);
        let v = view(-100, 0, 64, 0.0);
        let probe = 88 * w + 80;

        // the arrow alone shows at the probe
        let far = thing(1, arrow, 0, 0);
        let px = render(&mut sw, &v, &level, &bank, &[far]);
        assert!(demo::ARROW.contains(&px[probe]), "probe {}", px[probe]);

        // the ball in front hides it, whatever the input order
        let near = thing(2, ball, -60, 37);
        let both = render(&mut sw, &v, &level, &bank, &[near, far]);
        let swapped = render(&mut sw, &v, &level, &bank, &[far, near]);
        assert_eq!(both, swapped);
        assert!(BALL.contains(&both[probe]), "probe {}", both[probe]);
        assert_eq!(sw.stats().sprites, 2);
    }

    #[test]
    fn equal_depth_sprites_are_drawn_in_id_order() {
        let (bank, level) = square_scene();
        let ball = bank.sprite_id("BALL").unwrap();
        let arrow = bank.sprite_id("ARRW").unwrap();
        let mut sw = renderer(160, 100);
        let v = view(-100, 0, 64, 0.0);
        let probe = 83 * 160 + 80;

        let a = render(&mut sw, &v, &level, &bank, &[thing(7, ball, 0, 20), thing(3, arrow, 0, 0)]);
        let b = render(&mut sw, &v, &level, &bank, &[thing(3, arrow, 0, 0), thing(7, ball, 0, 20)]);
        assert_eq!(a, b);
        // the higher id is drawn last
        assert!(BALL.contains(&a[probe]), "probe {}", a[probe]);

        let c = render(&mut sw, &v, &level, &bank, &[thing(7, arrow, 0, 0), thing(3, ball, 0, 20)]);
        assert!(demo::ARROW.contains(&c[probe]), "probe {}", c[probe]);
    }

    #[test]
    fn projection_follows_field_of_view_and_resize() {
        let (bank, level) = square_scene();
        let mut sw = renderer(160, 100);
        let mut v = view(0, 0, 64, 0.0);
        v.fov = Angle::from_degrees(60.0);
        sw.render_frame(&v, &level, &bank, &[], |fb| assert_eq!(fb.width(), 160));
        assert!((sw.projection().fov().to_degrees() - 60.0).abs() < 0.1);

        sw.resize(64, 40);
        sw.render_frame(&v, &level, &bank, &[], |fb| {
            assert_eq!((fb.width(), fb.height()), (64, 40));
        });
        assert_eq!(sw.projection().width(), 64);
    }
}
