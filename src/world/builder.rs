use crate::math::{Divline, Fixed, Tables};
use crate::world::bsp::LoadError;
use crate::world::geometry::{
    BBox, Child, Level, Linedef, LinedefFlags, LinedefId, Node, NodeId, Sector, SectorId, Seg,
    SegmentId, Side, Sidedef, SidedefId, Subsector, SubsectorId, Vertex, VertexId,
};

/// Seg as handed over by the node builder, resolved in [`LevelBuilder::build`].
#[derive(Clone, Debug)]
struct PendingSeg {
    linedef: LinedefId,
    side: Side,
    /// `None` = the whole linedef, oriented by `side`.
    ends: Option<(VertexId, VertexId)>,
    offset: Fixed,
}

/// Incremental hand-over point for the level-loading collaborator.
///
/// Ids are handed out in insertion order.  Nothing is checked until
/// [`LevelBuilder::build`], which resolves seg angles / sectors and then
/// validates the finished tables.
#[derive(Debug, Default)]
pub struct LevelBuilder {
    name: String,
    vertices: Vec<Vertex>,
    linedefs: Vec<Linedef>,
    sidedefs: Vec<Sidedef>,
    sectors: Vec<Sector>,
    segs: Vec<PendingSeg>,
    subsectors: Vec<(SegmentId, u16)>,
    nodes: Vec<Node>,
}

impl LevelBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn vertex(&mut self, x: Fixed, y: Fixed) -> VertexId {
        self.vertices.push(Vertex { x, y });
        (self.vertices.len() - 1) as VertexId
    }

    pub fn sector(&mut self, sector: Sector) -> SectorId {
        self.sectors.push(sector);
        (self.sectors.len() - 1) as SectorId
    }

    pub fn sidedef(&mut self, sidedef: Sidedef) -> SidedefId {
        self.sidedefs.push(sidedef);
        (self.sidedefs.len() - 1) as SidedefId
    }

    pub fn linedef(
        &mut self,
        v1: VertexId,
        v2: VertexId,
        flags: LinedefFlags,
        front: SidedefId,
        back: Option<SidedefId>,
    ) -> LinedefId {
        self.linedefs.push(Linedef {
            v1,
            v2,
            flags,
            front,
            back,
        });
        (self.linedefs.len() - 1) as LinedefId
    }

    /// One seg covering the whole of `linedef`, seen from `side`.
    pub fn seg(&mut self, linedef: LinedefId, side: Side) -> SegmentId {
        self.segs.push(PendingSeg {
            linedef,
            side,
            ends: None,
            offset: Fixed::ZERO,
        });
        (self.segs.len() - 1) as SegmentId
    }

    /// A split piece of `linedef` from `v1` to `v2`, `offset` units along it.
    pub fn seg_raw(
        &mut self,
        v1: VertexId,
        v2: VertexId,
        linedef: LinedefId,
        side: Side,
        offset: Fixed,
    ) -> SegmentId {
        self.segs.push(PendingSeg {
            linedef,
            side,
            ends: Some((v1, v2)),
            offset,
        });
        (self.segs.len() - 1) as SegmentId
    }

    /// `count` consecutive segs starting at `first_seg`.  The sector is taken
    /// from the first seg.
    pub fn subsector(&mut self, first_seg: SegmentId, count: u16) -> SubsectorId {
        self.subsectors.push((first_seg, count));
        (self.subsectors.len() - 1) as SubsectorId
    }

    /// Nodes must be added children first; the last node is the root.
    pub fn node(&mut self, line: Divline, bbox: [BBox; 2], child: [Child; 2]) -> NodeId {
        self.nodes.push(Node { line, bbox, child });
        (self.nodes.len() - 1) as NodeId
    }

    pub fn build(self, tables: &Tables) -> Result<Level, LoadError> {
        let mut segs = Vec::with_capacity(self.segs.len());
        for (i, p) in self.segs.iter().enumerate() {
            segs.push(self.resolve_seg(i, p, tables)?);
        }

        let mut subsectors = Vec::with_capacity(self.subsectors.len());
        for (i, &(first_seg, seg_count)) in self.subsectors.iter().enumerate() {
            let sector = match segs.get(first_seg as usize) {
                Some(seg) => seg.front_sector,
                None if seg_count == 0 => 0,
                None => {
                    return Err(bad("subsector", i, "seg", first_seg as usize, segs.len()));
                }
            };
            subsectors.push(Subsector {
                first_seg,
                seg_count,
                sector,
            });
        }

        let level = Level {
            name: self.name,
            vertices: self.vertices,
            linedefs: self.linedefs,
            sidedefs: self.sidedefs,
            sectors: self.sectors,
            segs,
            subsectors,
            nodes: self.nodes,
        };
        level.validate()?;
        Ok(level)
    }

    fn resolve_seg(&self, i: usize, p: &PendingSeg, tables: &Tables) -> Result<Seg, LoadError> {
        let ld = self
            .linedefs
            .get(p.linedef as usize)
            .ok_or_else(|| bad("seg", i, "linedef", p.linedef as usize, self.linedefs.len()))?;

        let (sidedef, other) = match p.side {
            Side::Front => (ld.front, ld.back),
            Side::Back => match ld.back {
                Some(back) => (back, Some(ld.front)),
                None => {
                    return Err(LoadError::MissingBackSide {
                        seg: i,
                        linedef: p.linedef as usize,
                    });
                }
            },
        };
        let sector_of = |sd: SidedefId| {
            self.sidedefs
                .get(sd as usize)
                .map(|s| s.sector)
                .ok_or_else(|| bad("seg", i, "sidedef", sd as usize, self.sidedefs.len()))
        };
        let front_sector = sector_of(sidedef)?;
        let back_sector = other.map(sector_of).transpose()?;

        let (v1, v2) = p.ends.unwrap_or(match p.side {
            Side::Front => (ld.v1, ld.v2),
            Side::Back => (ld.v2, ld.v1),
        });
        let vertex = |v: VertexId| {
            self.vertices
                .get(v as usize)
                .copied()
                .ok_or_else(|| bad("seg", i, "vertex", v as usize, self.vertices.len()))
        };
        let (a, b) = (vertex(v1)?, vertex(v2)?);

        Ok(Seg {
            v1,
            v2,
            angle: tables.point_to_angle(b.x - a.x, b.y - a.y),
            offset: p.offset,
            linedef: p.linedef,
            side: p.side,
            sidedef,
            front_sector,
            back_sector,
        })
    }
}

fn bad(owner: &'static str, owner_id: usize, kind: &'static str, index: usize, len: usize) -> LoadError {
    LoadError::BadIndex {
        owner,
        owner_id,
        kind,
        index,
        len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Angle;

    fn sector() -> Sector {
        Sector {
            floor_height: Fixed::ZERO,
            ceiling_height: Fixed::from_int(128),
            floor_pic: 0,
            ceiling_pic: 0,
            light: 160,
            tag: 0,
        }
    }

    fn sidedef(sector: SectorId) -> Sidedef {
        Sidedef {
            texture_offset: Fixed::ZERO,
            row_offset: Fixed::ZERO,
            upper: None,
            lower: None,
            middle: None,
            sector,
        }
    }

    #[test]
    fn back_segs_run_reversed_and_see_both_sectors() {
        let t = Tables::new();
        let mut b = LevelBuilder::new("T");
        let a = b.vertex(Fixed::ZERO, Fixed::ZERO);
        let c = b.vertex(Fixed::from_int(64), Fixed::ZERO);
        let s0 = b.sector(sector());
        let s1 = b.sector(sector());
        let front = b.sidedef(sidedef(s0));
        let back = b.sidedef(sidedef(s1));
        let ld = b.linedef(a, c, LinedefFlags::TWO_SIDED, front, Some(back));
        b.seg(ld, Side::Front);
        b.seg(ld, Side::Back);
        b.subsector(0, 1);
        b.subsector(1, 1);
        let line = Divline {
            x: Fixed::ZERO,
            y: Fixed::ZERO,
            dx: Fixed::from_int(64),
            dy: Fixed::ZERO,
        };
        b.node(line, [BBox::default(); 2], [Child::Subsector(0), Child::Subsector(1)]);

        let level = b.build(&t).unwrap();
        let (f, k) = (&level.segs()[0], &level.segs()[1]);
        assert_eq!(f.angle, Angle::ZERO);
        assert_eq!(k.angle, Angle::ANG180);
        assert_eq!((k.v1, k.v2), (c, a));
        assert_eq!((f.front_sector, f.back_sector), (s0, Some(s1)));
        assert_eq!((k.front_sector, k.back_sector), (s1, Some(s0)));
        assert_eq!(level.subsectors()[1].sector, s1);
    }

    #[test]
    fn back_seg_of_one_sided_line_is_fatal() {
        let t = Tables::new();
        let mut b = LevelBuilder::new("T");
        let a = b.vertex(Fixed::ZERO, Fixed::ZERO);
        let c = b.vertex(Fixed::ONE, Fixed::ZERO);
        let s = b.sector(sector());
        let sd = b.sidedef(sidedef(s));
        let ld = b.linedef(a, c, LinedefFlags::BLOCKING, sd, None);
        b.seg(ld, Side::Back);
        b.subsector(0, 1);
        assert_eq!(
            b.build(&t).unwrap_err(),
            LoadError::MissingBackSide { seg: 0, linedef: 0 }
        );
    }

    #[test]
    fn dangling_references_are_fatal() {
        let t = Tables::new();
        let mut b = LevelBuilder::new("T");
        let a = b.vertex(Fixed::ZERO, Fixed::ZERO);
        let s = b.sector(sector());
        let sd = b.sidedef(sidedef(s));
        let ld = b.linedef(a, 7, LinedefFlags::BLOCKING, sd, None);
        b.seg(ld, Side::Front);
        b.subsector(0, 1);
        assert!(matches!(
            b.build(&t),
            Err(LoadError::BadIndex { kind: "vertex", index: 7, .. })
        ));

        let mut b = LevelBuilder::new("T");
        b.subsector(3, 2);
        assert!(matches!(
            b.build(&t),
            Err(LoadError::BadIndex { owner: "subsector", kind: "seg", .. })
        ));
    }
}
