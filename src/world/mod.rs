mod builder;
mod bsp;
mod camera;
pub mod demo;
mod geometry;
mod patch;
mod texture;

pub use geometry::{
    BBox, Child, Level, Linedef, LinedefFlags, LinedefId, Node, NodeId, Sector, SectorId, Seg,
    SegmentId, Side, Sidedef, SidedefId, Subsector, SubsectorId, Vertex, VertexId,
};

pub use builder::LevelBuilder;

pub use bsp::{BspVisitor, LoadError};

pub use camera::Camera;

pub use patch::{Patch, Post};

pub use texture::{
    Colormaps, FLAT_SIZE, Flat, FlatId, INVERSE_COLORMAP, NO_TEXTURE, NUMCOLORMAPS, PLACEHOLDER,
    Palette, PatchId, ResourceBank, ResourceError, ResourceMode, SpriteDef, SpriteFrame, SpriteId,
    Texture, TextureId, TranMap,
};
