use log::info;

use crate::math::Fixed;
use crate::world::geometry::{BBox, Child, Level, NodeId, SectorId, Side, SubsectorId};

/// Malformed geometry, detected once before the first frame.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("{owner} {owner_id} references {kind} {index}, but only {len} exist")]
    BadIndex {
        owner: &'static str,
        owner_id: usize,
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error("too many {0} for 16-bit ids")]
    TooMany(&'static str),

    #[error("level has no subsectors")]
    NoSubsectors,

    #[error("subsector {0} has no segs")]
    EmptySubsector(SubsectorId),

    #[error("seg {seg} runs along the back of linedef {linedef}, which is one-sided")]
    MissingBackSide { seg: usize, linedef: usize },

    #[error("seg {seg} belongs to sector {found}, but its subsector is in sector {expected}")]
    MixedSectors {
        seg: usize,
        expected: SectorId,
        found: SectorId,
    },

    #[error("a level without nodes needs exactly one subsector, found {0}")]
    MissingNodes(usize),

    #[error("node {0} is reached twice while walking the tree")]
    Cycle(NodeId),

    #[error("subsector {0} is referenced by more than one node")]
    SharedSubsector(SubsectorId),

    #[error("node {0} is not reachable from the root")]
    OrphanNode(NodeId),

    #[error("subsector {0} is not reachable from the root")]
    OrphanSubsector(SubsectorId),
}

/// Callbacks for [`Level::walk`].
pub trait BspVisitor {
    /// Return `false` to skip the subtree bounded by `bbox`.
    fn check_bbox(&mut self, _bbox: &BBox) -> bool {
        true
    }

    fn visit_subsector(&mut self, id: SubsectorId);
}

// ──────────────────────────────────────────────────────────────────────────
//                       Level – public helpers
// ──────────────────────────────────────────────────────────────────────────
impl Level {
    /// The BSP root: the last node, or the single subsector of a node-less map.
    #[inline]
    pub fn root(&self) -> Child {
        match self.nodes.len() {
            0 => Child::Subsector(0),
            n => Child::Node((n - 1) as NodeId),
        }
    }

    /// Walk the tree front-to-back as seen from `(x, y)`.
    ///
    /// At every node the child on the viewer's side is visited first; each
    /// child is only entered if the visitor accepts its bounding box.
    pub fn walk<V: BspVisitor>(&self, x: Fixed, y: Fixed, visitor: &mut V) {
        self.walk_child(self.root(), x, y, visitor);
    }

    fn walk_child<V: BspVisitor>(&self, child: Child, x: Fixed, y: Fixed, visitor: &mut V) {
        let id = match child {
            Child::Subsector(ss) => {
                visitor.visit_subsector(ss);
                return;
            }
            Child::Node(id) => id,
        };

        let node = &self.nodes[id as usize];
        let near = node.line.point_on_side(x, y);
        let far = near ^ 1;

        // Near side first …
        if visitor.check_bbox(&node.bbox[near]) {
            self.walk_child(node.child[near], x, y, visitor);
        }
        // … far side only if its bounding box might be visible.
        if visitor.check_bbox(&node.bbox[far]) {
            self.walk_child(node.child[far], x, y, visitor);
        }
    }

    /// Subsector containing `(x, y)`.
    pub fn point_in_subsector(&self, x: Fixed, y: Fixed) -> SubsectorId {
        let mut child = self.root();
        loop {
            match child {
                Child::Subsector(ss) => return ss,
                Child::Node(id) => {
                    let node = &self.nodes[id as usize];
                    child = node.child[node.line.point_on_side(x, y)];
                }
            }
        }
    }

    pub fn sector_at(&self, x: Fixed, y: Fixed) -> SectorId {
        self.subsectors[self.point_in_subsector(x, y) as usize].sector
    }

    pub fn floor_height_at(&self, x: Fixed, y: Fixed) -> Fixed {
        self.sectors[self.sector_at(x, y) as usize].floor_height
    }

    /*──────────────────────── validation ───────────────────────────────*/

    /// Check every cross reference and the tree shape.  Runs once, from
    /// [`LevelBuilder::build`](crate::world::LevelBuilder::build).
    pub(crate) fn validate(&self) -> Result<(), LoadError> {
        self.validate_tables()?;
        self.validate_tree()?;
        info!(
            "level `{}` validated: {} sectors, {} segs, {} subsectors, {} nodes",
            self.name,
            self.sectors.len(),
            self.segs.len(),
            self.subsectors.len(),
            self.nodes.len()
        );
        Ok(())
    }

    fn validate_tables(&self) -> Result<(), LoadError> {
        for (len, kind) in [
            (self.vertices.len(), "vertices"),
            (self.linedefs.len(), "linedefs"),
            (self.sidedefs.len(), "sidedefs"),
            (self.sectors.len(), "sectors"),
            (self.segs.len(), "segs"),
            (self.nodes.len(), "nodes"),
        ] {
            if len > u16::MAX as usize {
                return Err(LoadError::TooMany(kind));
            }
        }
        // subsector ids share their space with the child tag bit
        if self.subsectors.len() > Child::CHILD_MASK as usize {
            return Err(LoadError::TooMany("subsectors"));
        }

        for (i, sd) in self.sidedefs.iter().enumerate() {
            check("sidedef", i, "sector", sd.sector as usize, self.sectors.len())?;
        }

        for (i, ld) in self.linedefs.iter().enumerate() {
            check("linedef", i, "vertex", ld.v1 as usize, self.vertices.len())?;
            check("linedef", i, "vertex", ld.v2 as usize, self.vertices.len())?;
            check("linedef", i, "sidedef", ld.front as usize, self.sidedefs.len())?;
            if let Some(back) = ld.back {
                check("linedef", i, "sidedef", back as usize, self.sidedefs.len())?;
            }
        }

        for (i, seg) in self.segs.iter().enumerate() {
            check("seg", i, "vertex", seg.v1 as usize, self.vertices.len())?;
            check("seg", i, "vertex", seg.v2 as usize, self.vertices.len())?;
            check("seg", i, "linedef", seg.linedef as usize, self.linedefs.len())?;
            check("seg", i, "sidedef", seg.sidedef as usize, self.sidedefs.len())?;
            check("seg", i, "sector", seg.front_sector as usize, self.sectors.len())?;
            if let Some(back) = seg.back_sector {
                check("seg", i, "sector", back as usize, self.sectors.len())?;
            }
            let ld = &self.linedefs[seg.linedef as usize];
            if seg.side == Side::Back && ld.back.is_none() {
                return Err(LoadError::MissingBackSide {
                    seg: i,
                    linedef: seg.linedef as usize,
                });
            }
        }

        if self.subsectors.is_empty() {
            return Err(LoadError::NoSubsectors);
        }
        for (i, ss) in self.subsectors.iter().enumerate() {
            if ss.seg_count == 0 {
                return Err(LoadError::EmptySubsector(i as SubsectorId));
            }
            check("subsector", i, "sector", ss.sector as usize, self.sectors.len())?;
            let last = ss.first_seg as usize + ss.seg_count as usize - 1;
            check("subsector", i, "seg", last, self.segs.len())?;
            for seg_id in ss.seg_range() {
                let found = self.segs[seg_id].front_sector;
                if found != ss.sector {
                    return Err(LoadError::MixedSectors {
                        seg: seg_id,
                        expected: ss.sector,
                        found,
                    });
                }
            }
        }

        for (i, node) in self.nodes.iter().enumerate() {
            for child in node.child {
                match child {
                    Child::Node(n) => check("node", i, "node", n as usize, self.nodes.len())?,
                    Child::Subsector(s) => {
                        check("node", i, "subsector", s as usize, self.subsectors.len())?
                    }
                }
            }
        }
        Ok(())
    }

    /// Strict binary tree: every node and subsector reachable from the root
    /// exactly once.  Iterative so a hostile depth cannot blow the stack.
    fn validate_tree(&self) -> Result<(), LoadError> {
        if self.nodes.is_empty() {
            return match self.subsectors.len() {
                1 => Ok(()),
                n => Err(LoadError::MissingNodes(n)),
            };
        }

        let mut node_seen = vec![false; self.nodes.len()];
        let mut ss_seen = vec![false; self.subsectors.len()];
        let mut stack = vec![self.root()];

        while let Some(child) = stack.pop() {
            match child {
                Child::Node(id) => {
                    let seen = &mut node_seen[id as usize];
                    if *seen {
                        return Err(LoadError::Cycle(id));
                    }
                    *seen = true;
                    stack.extend(self.nodes[id as usize].child);
                }
                Child::Subsector(id) => {
                    let seen = &mut ss_seen[id as usize];
                    if *seen {
                        return Err(LoadError::SharedSubsector(id));
                    }
                    *seen = true;
                }
            }
        }

        if let Some(i) = node_seen.iter().position(|s| !s) {
            return Err(LoadError::OrphanNode(i as NodeId));
        }
        if let Some(i) = ss_seen.iter().position(|s| !s) {
            return Err(LoadError::OrphanSubsector(i as SubsectorId));
        }
        Ok(())
    }
}

#[inline]
fn check(
    owner: &'static str,
    owner_id: usize,
    kind: &'static str,
    index: usize,
    len: usize,
) -> Result<(), LoadError> {
    if index < len {
        Ok(())
    } else {
        Err(LoadError::BadIndex {
            owner,
            owner_id,
            kind,
            index,
            len,
        })
    }
}

// ──────────────────────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Tables;
    use crate::world::{demo, geometry::Node, texture::ResourceMode};

    struct Collect(Vec<SubsectorId>);
    impl BspVisitor for Collect {
        fn visit_subsector(&mut self, id: SubsectorId) {
            self.0.push(id);
        }
    }

    fn chain(n: usize) -> Level {
        let tables = Tables::new();
        let bank = demo::demo_bank(ResourceMode::Strict).unwrap();
        demo::room_chain(&bank, &tables, n).unwrap()
    }

    #[test]
    fn full_walk_visits_every_subsector_once() {
        let level = chain(7);
        for x in [-10, 40, 300, 700, 1500, 1800, 2000] {
            let (x, y) = (Fixed::from_int(x), Fixed::from_int(128));
            let mut c = Collect(Vec::new());
            level.walk(x, y, &mut c);
            let mut sorted = c.0.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..7).collect::<Vec<_>>(), "from x={x}");
        }
    }

    #[test]
    fn walk_starts_with_the_viewer_subsector() {
        let level = chain(5);
        for room in 0..5 {
            let x = Fixed::from_int(256 * room + 100);
            let y = Fixed::from_int(128);
            let mut c = Collect(Vec::new());
            level.walk(x, y, &mut c);
            assert_eq!(c.0[0], level.point_in_subsector(x, y));
            assert_eq!(c.0[0] as i32, room);
        }
    }

    #[test]
    fn rejected_bbox_prunes_subtree() {
        struct Nothing(usize);
        impl BspVisitor for Nothing {
            fn check_bbox(&mut self, _: &BBox) -> bool {
                false
            }
            fn visit_subsector(&mut self, _: SubsectorId) {
                self.0 += 1;
            }
        }
        let level = chain(4);
        let mut v = Nothing(0);
        level.walk(Fixed::ZERO, Fixed::ZERO, &mut v);
        assert_eq!(v.0, 0);
    }

    #[test]
    fn bad_child_index_is_fatal() {
        let mut level = chain(3);
        let last = level.nodes.len() - 1;
        level.nodes[last].child[1] = Child::Node(99);
        assert!(matches!(
            level.validate(),
            Err(LoadError::BadIndex { kind: "node", index: 99, .. })
        ));
    }

    #[test]
    fn cycle_is_fatal() {
        let mut level = chain(3);
        let root = (level.nodes.len() - 1) as NodeId;
        // point a leaf slot of the first node back at the root
        level.nodes[0].child[0] = Child::Node(root);
        assert_eq!(level.validate(), Err(LoadError::Cycle(root)));
    }

    #[test]
    fn shared_and_orphan_subsectors_are_fatal() {
        let mut level = chain(2);
        let root = level.nodes.len() - 1;
        level.nodes[root].child[1] = Child::Subsector(0);
        assert_eq!(level.validate(), Err(LoadError::SharedSubsector(0)));

        let mut level = chain(2);
        level.nodes.push(Node {
            line: level.nodes[0].line,
            bbox: level.nodes[0].bbox,
            child: [Child::Node(0), Child::Subsector(1)],
        });
        // the old root is now reached through the new one, subsector 1 twice
        assert_eq!(level.validate(), Err(LoadError::SharedSubsector(1)));
    }

    #[test]
    fn orphan_node_is_fatal() {
        let mut level = chain(2);
        let extra = level.nodes[0].clone();
        level.nodes.insert(0, extra);
        // the real root is still last, the copy in slot 0 hangs loose
        assert_eq!(level.validate(), Err(LoadError::OrphanNode(0)));
    }

    #[test]
    fn nodeless_level_needs_one_subsector() {
        let tables = Tables::new();
        let bank = demo::demo_bank(ResourceMode::Strict).unwrap();
        let room = demo::square_room(&bank, &tables, 128).unwrap();
        assert_eq!(room.root(), Child::Subsector(0));
        assert!(room.validate().is_ok());

        let mut two = chain(2);
        two.nodes.clear();
        assert_eq!(two.validate(), Err(LoadError::MissingNodes(2)));
    }
}
