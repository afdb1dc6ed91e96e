//! Front end of the wall pass: bounding-box culling, seg classification
//! and the solid-seg occlusion list.

use crate::math::Angle;
use crate::renderer::software::{
    Software,
    renderer::{ClipRange, Scene},
};
use crate::world::{BBox, BspVisitor, SegmentId, SubsectorId};

/// Bounding-box corners to test, by viewer position relative to the box
/// (`top, bottom, left, right` indices, see [`BBox::coord`]).
const CHECKCOORD: [[usize; 4]; 11] = [
    [3, 0, 2, 1],
    [3, 0, 2, 0],
    [3, 1, 2, 0],
    [0; 4],
    [2, 0, 2, 1],
    [0; 4],
    [3, 1, 3, 0],
    [0; 4],
    [2, 0, 3, 1],
    [2, 1, 3, 1],
    [2, 1, 3, 0],
];

/// Feeds [`Level::walk`](crate::world::Level::walk) into the renderer.
pub(super) struct Walker<'s, 'a> {
    pub sw: &'s mut Software,
    pub scene: Scene<'a>,
}

impl BspVisitor for Walker<'_, '_> {
    fn check_bbox(&mut self, bbox: &BBox) -> bool {
        self.sw.check_bbox(bbox)
    }

    fn visit_subsector(&mut self, id: SubsectorId) {
        self.sw.render_subsector(&self.scene, id);
    }
}

impl Software {
    pub(super) fn init_solid_segs(&mut self) {
        let w = self.fb.width() as i32;
        self.solid_segs.clear();
        // two sentinels so the scans never run off either end
        self.solid_segs.push(ClipRange {
            first: -0x7fff_ffff,
            last: -1,
        });
        self.solid_segs.push(ClipRange {
            first: w,
            last: 0x7fff_ffff,
        });
    }

    /// Clip a pair of view-relative angles to the field of view.  `None`
    /// when the whole span lies outside it.
    fn clip_to_view(&self, mut angle1: Angle, mut angle2: Angle) -> Option<(Angle, Angle)> {
        let clip = self.proj.clip_angle();
        let clip2 = clip + clip;
        let span = angle1 - angle2;

        let tspan = angle1 + clip;
        if tspan > clip2 {
            if tspan - clip2 >= span {
                return None;
            }
            angle1 = clip;
        }
        let tspan = clip - angle2;
        if tspan > clip2 {
            if tspan - clip2 >= span {
                return None;
            }
            angle2 = -clip;
        }
        Some((angle1, angle2))
    }

    /// True if any part of `bbox` may be visible.
    pub(super) fn check_bbox(&self, bbox: &BBox) -> bool {
        let (vx, vy) = (self.view.x, self.view.y);
        let boxx = if vx <= bbox.left {
            0
        } else if vx < bbox.right {
            1
        } else {
            2
        };
        let boxy = if vy >= bbox.top {
            0
        } else if vy > bbox.bottom {
            1
        } else {
            2
        };
        let boxpos = boxy * 4 + boxx;
        // viewer inside
        if boxpos == 5 {
            return true;
        }

        let [a, b, c, d] = CHECKCOORD[boxpos];
        let angle1 = self.view.angle_to(&self.tables, bbox.coord(a), bbox.coord(b)) - self.view.angle;
        let angle2 = self.view.angle_to(&self.tables, bbox.coord(c), bbox.coord(d)) - self.view.angle;

        // the box spans more than half the view circle
        if angle1 - angle2 >= Angle::ANG180 {
            return true;
        }
        let Some((angle1, angle2)) = self.clip_to_view(angle1, angle2) else {
            return false;
        };

        let sx1 = self.proj.view_angle_to_x(angle1);
        let sx2 = self.proj.view_angle_to_x(angle2);
        if sx1 == sx2 {
            return false;
        }
        let sx2 = sx2 - 1;

        let mut start = 0;
        while self.solid_segs[start].last < sx2 {
            start += 1;
        }
        !(sx1 >= self.solid_segs[start].first && sx2 <= self.solid_segs[start].last)
    }

    pub(super) fn render_subsector(&mut self, scene: &Scene, id: SubsectorId) {
        let (level, bank) = (scene.level, scene.bank);
        let ss = &level.subsectors()[id as usize];
        let sector = &level.sectors()[ss.sector as usize];
        self.stats.subsectors += 1;

        self.floor_plane = (sector.floor_height < self.view.z).then(|| {
            self.find_plane(sector.floor_height, sector.floor_pic, sector.light, bank)
        });
        self.ceiling_plane = (sector.ceiling_height > self.view.z || bank.is_sky(sector.ceiling_pic))
            .then(|| self.find_plane(sector.ceiling_height, sector.ceiling_pic, sector.light, bank));

        self.add_sprites(scene, ss.sector);

        for seg in ss.seg_range() {
            self.add_line(scene, seg as SegmentId);
        }
    }

    /// Classify a seg and hand its visible columns to the clipper.
    fn add_line(&mut self, scene: &Scene, id: SegmentId) {
        let level = scene.level;
        let seg = &level.segs()[id as usize];
        let v1 = level.vertices()[seg.v1 as usize];
        let v2 = level.vertices()[seg.v2 as usize];

        let angle1 = self.view.angle_to(&self.tables, v1.x, v1.y);
        let angle2 = self.view.angle_to(&self.tables, v2.x, v2.y);

        // back side, or degenerate
        if angle1 - angle2 >= Angle::ANG180 {
            return;
        }
        let rw_angle1 = angle1;

        let Some((angle1, angle2)) =
            self.clip_to_view(angle1 - self.view.angle, angle2 - self.view.angle)
        else {
            return;
        };
        let x1 = self.proj.view_angle_to_x(angle1);
        let x2 = self.proj.view_angle_to_x(angle2);
        // too thin to cover a column centre
        if x1 == x2 {
            return;
        }

        let front = &level.sectors()[seg.front_sector as usize];
        let Some(back) = seg.back_sector.map(|s| &level.sectors()[s as usize]) else {
            self.clip_solid(scene, id, rw_angle1, x1, x2 - 1);
            return;
        };

        // closed door
        if back.ceiling_height <= front.floor_height || back.floor_height >= front.ceiling_height {
            self.clip_solid(scene, id, rw_angle1, x1, x2 - 1);
            return;
        }

        // window
        if back.ceiling_height != front.ceiling_height || back.floor_height != front.floor_height {
            self.clip_pass(scene, id, rw_angle1, x1, x2 - 1);
            return;
        }

        // an invisible trigger line: identical on both sides, nothing to draw
        let side = &level.sidedefs()[seg.sidedef as usize];
        if back.ceiling_pic == front.ceiling_pic
            && back.floor_pic == front.floor_pic
            && back.light == front.light
            && side.middle.is_none()
        {
            return;
        }
        self.clip_pass(scene, id, rw_angle1, x1, x2 - 1);
    }

    /// Draw the parts of `first ..= last` not yet occluded and mark the
    /// range occluded.
    pub(super) fn clip_solid(
        &mut self,
        scene: &Scene,
        id: SegmentId,
        rw_angle1: Angle,
        first: i32,
        last: i32,
    ) {
        let mut start = 0;
        while self.solid_segs[start].last < first - 1 {
            start += 1;
        }

        if first < self.solid_segs[start].first {
            if last < self.solid_segs[start].first - 1 {
                // entirely visible: a new range
                self.store_wall_range(scene, id, rw_angle1, first, last);
                self.solid_segs.insert(start, ClipRange { first, last });
                return;
            }
            // visible fragment left of `start`
            let stop = self.solid_segs[start].first - 1;
            self.store_wall_range(scene, id, rw_angle1, first, stop);
            self.solid_segs[start].first = first;
        }

        // already covered
        if last <= self.solid_segs[start].last {
            return;
        }

        let mut next = start;
        let mut merged = false;
        while last >= self.solid_segs[next + 1].first - 1 {
            // the gap between next and next + 1
            let (a, b) = (self.solid_segs[next].last + 1, self.solid_segs[next + 1].first - 1);
            self.store_wall_range(scene, id, rw_angle1, a, b);
            next += 1;
            if last <= self.solid_segs[next].last {
                self.solid_segs[start].last = self.solid_segs[next].last;
                merged = true;
                break;
            }
        }
        if !merged {
            let a = self.solid_segs[next].last + 1;
            self.store_wall_range(scene, id, rw_angle1, a, last);
            self.solid_segs[start].last = last;
        }

        // remove the ranges swallowed by `start`
        if next != start {
            self.solid_segs.drain(start + 1..=next);
        }
    }

    /// Draw the parts of `first ..= last` not yet occluded, leaving the
    /// occlusion list alone (windows, see-through lines).
    pub(super) fn clip_pass(
        &mut self,
        scene: &Scene,
        id: SegmentId,
        rw_angle1: Angle,
        first: i32,
        last: i32,
    ) {
        let mut start = 0;
        while self.solid_segs[start].last < first - 1 {
            start += 1;
        }

        if first < self.solid_segs[start].first {
            if last < self.solid_segs[start].first - 1 {
                self.store_wall_range(scene, id, rw_angle1, first, last);
                return;
            }
            let stop = self.solid_segs[start].first - 1;
            self.store_wall_range(scene, id, rw_angle1, first, stop);
        }

        if last <= self.solid_segs[start].last {
            return;
        }

        while last >= self.solid_segs[start + 1].first - 1 {
            let (a, b) = (self.solid_segs[start].last + 1, self.solid_segs[start + 1].first - 1);
            self.store_wall_range(scene, id, rw_angle1, a, b);
            start += 1;
            if last <= self.solid_segs[start].last {
                return;
            }
        }
        let a = self.solid_segs[start].last + 1;
        self.store_wall_range(scene, id, rw_angle1, a, last);
    }
}
