//! ---------------------------------------------------------------------------
//! Classic software (CPU) column renderer
//!
//! * Walks the BSP front to back; solid walls close columns, so nothing is
//!   ever overdrawn and no Z-buffer is needed.
//! * Floors and ceilings are collected as visplanes while the walls are
//!   drawn and rasterised as horizontal spans afterwards.
//! * Things and see-through walls are composited last, back to front,
//!   clipped against the silhouettes the walls left behind.
//!
//! All arithmetic is 16.16 fixed point with table trigonometry, so a given
//! scene renders to the same bytes on every platform.
//! ---------------------------------------------------------------------------

mod bsp;
mod draw;
mod planes;
mod projection;
mod renderer;
mod sprites;
mod walls;

pub use draw::ColumnKind;
pub use planes::{VisPlane, VisplaneId};
pub use projection::Projection;
pub use renderer::{ClipRange, FrameStats, Software};
pub use sprites::{DrawSeg, SilClip, Silhouette, VisSprite};
