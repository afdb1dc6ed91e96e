use bitflags::bitflags;

use crate::math::{Angle, Divline, Fixed};
use crate::world::texture::{FlatId, TextureId};

pub type VertexId = u16;
pub type LinedefId = u16;
pub type SidedefId = u16;
pub type SectorId = u16;
pub type SegmentId = u16;
pub type SubsectorId = u16;
pub type NodeId = u16;

/// Runtime snapshot of one map.
///
/// Built once through [`LevelBuilder`](crate::world::LevelBuilder), which
/// validates every cross reference.  Afterwards only sector heights and
/// light may change (via [`Level::sector_mut`]); everything else is frozen,
/// which is what lets the renderer index the tables without re-checking.
#[derive(Debug)]
pub struct Level {
    pub(crate) name: String,
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) linedefs: Vec<Linedef>,
    pub(crate) sidedefs: Vec<Sidedef>,
    pub(crate) sectors: Vec<Sector>,
    pub(crate) segs: Vec<Seg>,
    pub(crate) subsectors: Vec<Subsector>,
    pub(crate) nodes: Vec<Node>,
}

impl Level {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }
    pub fn linedefs(&self) -> &[Linedef] {
        &self.linedefs
    }
    pub fn sidedefs(&self) -> &[Sidedef] {
        &self.sidedefs
    }
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }
    pub fn segs(&self) -> &[Seg] {
        &self.segs
    }
    pub fn subsectors(&self) -> &[Subsector] {
        &self.subsectors
    }
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Mutable access for the simulation between frames (doors, lifts,
    /// flickering lights).  Returns `None` for an unknown id.
    pub fn sector_mut(&mut self, id: SectorId) -> Option<&mut Sector> {
        self.sectors.get_mut(id as usize)
    }

    /// Partition line of a seg, oriented `v1 → v2`.
    #[inline]
    pub fn seg_line(&self, seg: &Seg) -> Divline {
        let v1 = self.vertices[seg.v1 as usize];
        let v2 = self.vertices[seg.v2 as usize];
        Divline {
            x: v1.x,
            y: v1.y,
            dx: v2.x - v1.x,
            dy: v2.y - v1.y,
        }
    }
}

/*----------------------- simple primitives --------------------------*/

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Vertex {
    pub x: Fixed,
    pub y: Fixed,
}

/*--------------------------- linedefs -------------------------------*/

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct LinedefFlags: u16 {
        const BLOCKING        = 0x0001;
        const BLOCK_MONSTERS  = 0x0002;
        const TWO_SIDED       = 0x0004;
        /// Upper texture hangs from the front ceiling instead of the back one.
        const UPPER_UNPEGGED  = 0x0008;
        /// Lower and middle textures stand on the floor.
        const LOWER_UNPEGGED  = 0x0010;
        const SECRET          = 0x0020;
        const BLOCK_SOUND     = 0x0040;
        const DONT_DRAW       = 0x0080;
        const MAPPED          = 0x0100;
    }
}

#[derive(Clone, Debug)]
pub struct Linedef {
    pub v1: VertexId,
    pub v2: VertexId,
    pub flags: LinedefFlags,
    pub front: SidedefId,
    pub back: Option<SidedefId>,
}

/*--------------------------- sidedefs -------------------------------*/

#[derive(Clone, Debug)]
pub struct Sidedef {
    pub texture_offset: Fixed,
    pub row_offset: Fixed,
    pub upper: Option<TextureId>,
    pub lower: Option<TextureId>,
    pub middle: Option<TextureId>,
    pub sector: SectorId,
}

/*---------------------------- sectors -------------------------------*/

#[derive(Clone, Debug, PartialEq)]
pub struct Sector {
    pub floor_height: Fixed,
    pub ceiling_height: Fixed,
    pub floor_pic: FlatId,
    pub ceiling_pic: FlatId,
    /// 0 (black) ..= 255 (full bright).
    pub light: u8,
    pub tag: u16,
}

/*------------------------------ segs --------------------------------*/

/// Which side of its linedef a seg runs along.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
}

/// A (piece of a) linedef as seen from one side, produced by the node
/// builder.  Sector references are resolved at build time.
#[derive(Clone, Debug)]
pub struct Seg {
    pub v1: VertexId,
    pub v2: VertexId,
    pub angle: Angle,
    /// Distance along the linedef from its start to `v1`.
    pub offset: Fixed,
    pub linedef: LinedefId,
    pub side: Side,
    pub sidedef: SidedefId,
    pub front_sector: SectorId,
    pub back_sector: Option<SectorId>,
}

/*-------------------------- BSP records -----------------------------*/

#[derive(Clone, Debug)]
pub struct Subsector {
    pub first_seg: SegmentId,
    pub seg_count: u16,
    pub sector: SectorId,
}

impl Subsector {
    #[inline]
    pub fn seg_range(&self) -> std::ops::Range<usize> {
        let first = self.first_seg as usize;
        first..first + self.seg_count as usize
    }
}

/// Axis-aligned bounding box in map space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BBox {
    pub top: Fixed,
    pub bottom: Fixed,
    pub left: Fixed,
    pub right: Fixed,
}

impl BBox {
    /// An inverted box that any [`BBox::add_point`] will snap to.
    pub const EMPTY: BBox = BBox {
        top: Fixed::MIN,
        bottom: Fixed::MAX,
        left: Fixed::MAX,
        right: Fixed::MIN,
    };

    pub fn add_point(&mut self, x: Fixed, y: Fixed) {
        self.left = self.left.min(x);
        self.right = self.right.max(x);
        self.bottom = self.bottom.min(y);
        self.top = self.top.max(y);
    }

    pub fn contains(&self, x: Fixed, y: Fixed) -> bool {
        x >= self.left && x <= self.right && y >= self.bottom && y <= self.top
    }

    /// Coordinates in the classic `top, bottom, left, right` order.
    #[inline]
    pub fn coord(&self, i: usize) -> Fixed {
        match i {
            0 => self.top,
            1 => self.bottom,
            2 => self.left,
            _ => self.right,
        }
    }
}

/// Child slot of a BSP node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Child {
    Node(NodeId),
    Subsector(SubsectorId),
}

impl Child {
    pub const SUBSECTOR_BIT: u16 = 0x8000;
    pub const CHILD_MASK: u16 = 0x7FFF;

    /// Decode the packed on-disk form (high bit = subsector).
    pub fn from_raw(raw: u16) -> Self {
        if raw & Self::SUBSECTOR_BIT != 0 {
            Child::Subsector(raw & Self::CHILD_MASK)
        } else {
            Child::Node(raw)
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub line: Divline,
    /// `[front, back]`, same order as `child`.
    pub bbox: [BBox; 2],
    pub child: [Child; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_child_decoding() {
        assert_eq!(Child::from_raw(0x8003), Child::Subsector(3));
        assert_eq!(Child::from_raw(0x0003), Child::Node(3));
    }

    #[test]
    fn bbox_grows_to_points() {
        let mut bb = BBox::EMPTY;
        bb.add_point(Fixed::from_int(-5), Fixed::from_int(10));
        bb.add_point(Fixed::from_int(7), Fixed::from_int(-2));
        assert_eq!(bb.left, Fixed::from_int(-5));
        assert_eq!(bb.right, Fixed::from_int(7));
        assert_eq!(bb.top, Fixed::from_int(10));
        assert_eq!(bb.bottom, Fixed::from_int(-2));
        assert!(bb.contains(Fixed::ZERO, Fixed::ZERO));
        assert!(!bb.contains(Fixed::from_int(8), Fixed::ZERO));
    }
}
