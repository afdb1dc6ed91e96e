//! The inner loops: one vertical column, one horizontal span.

use crate::math::{FRACBITS, Fixed};
use crate::renderer::FrameBuffer;
use crate::world::TranMap;

/// How a column's texels reach the frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Colormapped texel replaces the pixel.
    Opaque,
    /// Unlit texel, source clamped at its last row.
    Sky,
    /// Colormapped texel blended 50/50 with the pixel.
    Translucent,
    /// Pixel darkened with a jittered neighbour; the texel only shapes it.
    Fuzz,
}

/// One column worth of work.  `yl ..= yh` must already be clipped.
pub(super) struct ColumnJob<'a> {
    pub x: i32,
    pub yl: i32,
    pub yh: i32,
    /// Texels per pixel.
    pub iscale: Fixed,
    /// Texel row at the centre line.
    pub texturemid: Fixed,
    pub source: &'a [u8],
    /// Wrap the source vertically instead of clamping at its ends.
    pub tiled: bool,
    pub colormap: &'a [u8; 256],
    pub kind: ColumnKind,
}

/// Read-only tables and state shared by the special column kinds.
pub(super) struct Effects<'a> {
    pub tranmap: Option<&'a TranMap>,
    pub fuzz_map: &'a [u8; 256],
    pub fuzz_pos: &'a mut usize,
}

const FUZZ: [i8; 50] = [
    1, -1, 1, -1, 1, 1, -1, //
    1, 1, -1, 1, 1, 1, -1, //
    1, 1, 1, -1, -1, -1, -1, //
    1, -1, -1, 1, 1, 1, 1, -1, //
    1, -1, 1, 1, -1, -1, 1, //
    1, -1, -1, -1, -1, 1, 1, //
    1, 1, -1, 1, 1, -1, 1,
];

#[inline(always)]
fn texel(source: &[u8], row: i32, tiled: bool) -> u8 {
    let len = source.len() as i32;
    let i = if tiled {
        row.rem_euclid(len)
    } else {
        row.clamp(0, len - 1)
    };
    source[i as usize]
}

pub(super) fn draw_column(fb: &mut FrameBuffer, center_y: i32, job: &ColumnJob, fx: &mut Effects) {
    let h = fb.height() as i32;
    let (mut yl, mut yh) = (job.yl.max(0), job.yh.min(h - 1));
    if job.x < 0 || job.x >= fb.width() as i32 || job.source.is_empty() {
        return;
    }
    if job.kind == ColumnKind::Fuzz {
        // keep the neighbour reads on screen
        yl = yl.max(1);
        yh = yh.min(h - 2);
    }
    if yl > yh {
        return;
    }

    let x = job.x as usize;
    let mut frac = job.texturemid + job.iscale.mul_int(yl - center_y);
    let kind = job.kind;
    let tranmap = fx.tranmap;

    for y in yl..=yh {
        let ofs = fb.offset(x, y as usize);
        let src = texel(job.source, frac.bits() >> FRACBITS, job.tiled);
        let px = match (kind, tranmap) {
            (ColumnKind::Opaque, _) => job.colormap[src as usize],
            (ColumnKind::Sky, _) => src,
            (ColumnKind::Translucent, Some(tm)) => {
                tm.blend(job.colormap[src as usize], fb.pixels()[ofs])
            }
            (ColumnKind::Translucent, None) | (ColumnKind::Fuzz, _) => {
                let dy = FUZZ[*fx.fuzz_pos] as i32;
                *fx.fuzz_pos = (*fx.fuzz_pos + 1) % FUZZ.len();
                let near = fb.pixels()[fb.offset(x, (y + dy) as usize)];
                fx.fuzz_map[near as usize]
            }
        };
        fb.pixels_mut()[ofs] = px;
        frac += job.iscale;
    }
}

/// One row of a floor or ceiling.
pub(super) struct SpanJob<'a> {
    pub y: i32,
    pub x1: i32,
    pub x2: i32,
    pub xfrac: Fixed,
    pub yfrac: Fixed,
    pub xstep: Fixed,
    pub ystep: Fixed,
    /// 64×64 row-major flat.
    pub source: &'a [u8],
    pub colormap: &'a [u8; 256],
}

pub(super) fn draw_span(fb: &mut FrameBuffer, job: &SpanJob) {
    let w = fb.width() as i32;
    if job.y < 0 || job.y >= fb.height() as i32 || job.source.len() < 64 * 64 {
        return;
    }
    let (x1, x2) = (job.x1.max(0), job.x2.min(w - 1));
    if x1 > x2 {
        return;
    }
    let mut xfrac = job.xfrac + job.xstep.mul_int(x1 - job.x1);
    let mut yfrac = job.yfrac + job.ystep.mul_int(x1 - job.x1);
    let row = fb.offset(0, job.y as usize);

    for x in x1..=x2 {
        // 64×64: six bits of each coordinate's integer part
        let spot = ((yfrac.bits() >> 10) & 0xFC0) + ((xfrac.bits() >> FRACBITS) & 63);
        let px = job.colormap[job.source[spot as usize] as usize];
        fb.pixels_mut()[row + x as usize] = px;
        xfrac += job.xstep;
        yfrac += job.ystep;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> [u8; 256] {
        let mut m = [0u8; 256];
        for (i, v) in m.iter_mut().enumerate() {
            *v = i as u8;
        }
        m
    }

    fn job<'a>(source: &'a [u8], map: &'a [u8; 256], kind: ColumnKind) -> ColumnJob<'a> {
        ColumnJob {
            x: 1,
            yl: 0,
            yh: 7,
            iscale: Fixed::ONE,
            texturemid: Fixed::from_int(4),
            source,
            tiled: true,
            colormap: map,
            kind,
        }
    }

    #[test]
    fn opaque_column_steps_one_texel_per_pixel() {
        let map = identity();
        let src: Vec<u8> = (10..18).collect();
        let mut fb = FrameBuffer::new(3, 8);
        let mut pos = 0;
        let mut fx = Effects {
            tranmap: None,
            fuzz_map: &map,
            fuzz_pos: &mut pos,
        };
        draw_column(&mut fb, 4, &job(&src, &map, ColumnKind::Opaque), &mut fx);
        // row 4 (centre) samples texel 4
        let col: Vec<u8> = (0..8).map(|y| fb.pixel(1, y)).collect();
        assert_eq!(col, (10..18).collect::<Vec<_>>());
        assert_eq!(fb.pixel(0, 3), 0);
    }

    #[test]
    fn clamped_source_repeats_its_edges() {
        let map = identity();
        let src = [1u8, 2];
        let mut fb = FrameBuffer::new(3, 8);
        let mut pos = 0;
        let mut fx = Effects {
            tranmap: None,
            fuzz_map: &map,
            fuzz_pos: &mut pos,
        };
        let mut j = job(&src, &map, ColumnKind::Sky);
        j.tiled = false;
        j.texturemid = Fixed::ZERO;
        draw_column(&mut fb, 4, &j, &mut fx);
        assert_eq!(fb.pixel(1, 0), 1);
        assert_eq!(fb.pixel(1, 5), 2);
        assert_eq!(fb.pixel(1, 7), 2);
    }

    #[test]
    fn fuzz_stays_on_screen_and_advances() {
        let map = [9u8; 256];
        let src = [1u8; 8];
        let mut fb = FrameBuffer::new(3, 8);
        let mut pos = 0;
        let mut fx = Effects {
            tranmap: None,
            fuzz_map: &map,
            fuzz_pos: &mut pos,
        };
        draw_column(&mut fb, 4, &job(&src, &map, ColumnKind::Fuzz), &mut fx);
        assert_eq!(fb.pixel(1, 0), 0);
        assert_eq!(fb.pixel(1, 7), 0);
        assert!((1..7).all(|y| fb.pixel(1, y) == 9));
        assert_eq!(pos, 6);
    }

    #[test]
    fn span_wraps_the_flat() {
        let map = identity();
        let flat: Vec<u8> = (0..64 * 64).map(|i| (i % 64) as u8).collect();
        let mut fb = FrameBuffer::new(80, 2);
        let span = SpanJob {
            y: 1,
            x1: 0,
            x2: 79,
            xfrac: Fixed::from_int(60),
            yfrac: Fixed::ZERO,
            xstep: Fixed::ONE,
            ystep: Fixed::ZERO,
            source: &flat,
            colormap: &map,
        };
        draw_span(&mut fb, &span);
        assert_eq!(fb.pixel(0, 1), 60);
        assert_eq!(fb.pixel(4, 1), 0);
        assert_eq!(fb.pixel(79, 1), (60 + 79) % 64);
        assert_eq!(fb.pixel(5, 0), 0);
    }
}
