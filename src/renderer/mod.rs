//! Rendering abstraction layer.
//!
//! *The rest of the engine never touches a pixel buffer directly.*
//! Once per tick it hands the renderer a [`ViewParams`], the level, the
//! resource bank and the visible [`SpriteDesc`]s; the finished
//! [`FrameBuffer`] is loaned back through a closure.
//!
//! * Back-ends implement [`Renderer`]; [`software::Software`] is the classic
//!   column/span rasteriser.
//! * A helper blanket‐impl [`RendererExt`] adds `render_frame` so call-sites
//!   stay short and the per-frame sequence cannot be reordered.

use crate::math::{Angle, Fixed};
use crate::world::{Level, Palette, ResourceBank, SpriteId};

pub mod software;

/// Camera state supplied once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewParams {
    pub x: Fixed,
    pub y: Fixed,
    /// Absolute eye height.
    pub z: Fixed,
    pub angle: Angle,
    /// Horizontal field of view.
    pub fov: Angle,
    /// Force one colormap for everything (e.g. the inverted map).
    pub fixed_colormap: Option<u8>,
}

/// One dynamic entity to composite, produced by the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpriteDesc {
    /// Stable entity id, breaks depth ties.
    pub id: u32,
    pub x: Fixed,
    pub y: Fixed,
    /// Height of the sprite's feet.
    pub z: Fixed,
    /// Facing, used to pick a rotation.
    pub angle: Angle,
    pub sprite: SpriteId,
    pub frame: u16,
    pub translucent: bool,
    /// Ignore sector light.
    pub fullbright: bool,
}

/// Indexed-colour frame with precomputed row / column offsets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    row_ofs: Vec<usize>,
    col_ofs: Vec<usize>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
            row_ofs: (0..height).map(|y| y * width).collect(),
            col_ofs: (0..width).collect(),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major palette indices.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn offset(&self, x: usize, y: usize) -> usize {
        self.row_ofs[y] + self.col_ofs[x]
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[self.offset(x, y)]
    }

    #[inline(always)]
    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn clear(&mut self, index: u8) {
        self.pixels.fill(index);
    }

    /// Expand through `palette` into `out` (`0x00RRGGBB`, same layout).
    pub fn to_rgb(&self, palette: &Palette, out: &mut [u32]) {
        for (dst, &idx) in out.iter_mut().zip(&self.pixels) {
            *dst = palette[idx as usize];
        }
    }
}

/// A renderer that owns its frame buffer for the duration of a frame.
///
/// `end_frame` hands the finished buffer to a user-supplied closure, which
/// is where the presentation collaborator takes over.
pub trait Renderer {
    /// Configure the projection for this view and reset all per-frame state.
    fn begin_frame(&mut self, view: &ViewParams);

    /// Traverse, rasterise walls and planes, then composite sprites.
    fn draw_level(&mut self, level: &Level, bank: &ResourceBank, sprites: &[SpriteDesc]);

    /// Finish the frame and **loan** the finished buffer to `submit`.
    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&FrameBuffer);
}

/// Convenience blanket-impl with a one-liner `render_frame` adaptor.
pub trait RendererExt: Renderer {
    fn render_frame<F>(
        &mut self,
        view: &ViewParams,
        level: &Level,
        bank: &ResourceBank,
        sprites: &[SpriteDesc],
        submit: F,
    ) where
        F: FnOnce(&FrameBuffer),
    {
        self.begin_frame(view);
        self.draw_level(level, bank, sprites);
        self.end_frame(submit);
    }
}
impl<T: Renderer + ?Sized> RendererExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_row_major() {
        let fb = FrameBuffer::new(7, 3);
        assert_eq!(fb.offset(0, 0), 0);
        assert_eq!(fb.offset(6, 0), 6);
        assert_eq!(fb.offset(2, 2), 16);
        assert_eq!(fb.pixels().len(), 21);
    }

    #[test]
    fn rgb_expansion_uses_palette() {
        let mut fb = FrameBuffer::new(2, 1);
        fb.pixels_mut()[1] = 3;
        let mut pal = Palette::default();
        pal[3] = 0x00_12_34_56;
        let mut out = [0u32; 2];
        fb.to_rgb(&pal, &mut out);
        assert_eq!(out, [0, 0x00_12_34_56]);
    }
}
