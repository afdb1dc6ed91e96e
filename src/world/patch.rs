//! Column-major, run-length encoded picture ("patch").
//!
//! Layout (all little-endian), identical to the classic lump format so a
//! resource collaborator can hand us raw bytes:
//!
//! ```text
//! u16 width, u16 height, i16 left_offset, i16 top_offset
//! u32 column_offset[width]          // absolute byte offsets
//! per column: { u8 top_delta, u8 length, u8 pad, u8 pixels[length], u8 pad }*
//!             u8 0xFF               // end of column
//! ```
//!
//! Only opaque runs ("posts") are stored; everything else is transparent.

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::world::texture::ResourceError;

const HEADER_LEN: usize = 8;
const END_OF_COLUMN: u8 = 0xFF;

/// One opaque run inside a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Post<'a> {
    pub top_delta: i32,
    pub pixels: &'a [u8],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patch {
    name: String,
    width: usize,
    height: usize,
    left_offset: i32,
    top_offset: i32,
    column_ofs: Vec<usize>,
    data: Vec<u8>,
}

impl Patch {
    /// Decode a patch lump, rejecting anything that would index out of
    /// bounds later.
    pub fn from_lump(name: &str, lump: &[u8]) -> Result<Self, ResourceError> {
        let bad = |reason: &str| ResourceError::Malformed {
            kind: "patch",
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if lump.len() < HEADER_LEN {
            return Err(bad("truncated header"));
        }
        let mut rd = Cursor::new(lump);
        let (width, height, left, top) =
            read_header(&mut rd).map_err(|_| bad("truncated header"))?;
        let (width, height) = (width as usize, height as usize);
        if width == 0 || height == 0 {
            return Err(bad("zero-sized picture"));
        }
        if lump.len() < HEADER_LEN + 4 * width {
            return Err(bad("truncated column table"));
        }

        let mut column_ofs = Vec::with_capacity(width);
        for _ in 0..width {
            let ofs = rd
                .read_u32::<LittleEndian>()
                .map_err(|_| bad("truncated column table"))? as usize;
            Self::check_column(lump, ofs).map_err(|r| bad(r))?;
            column_ofs.push(ofs);
        }

        Ok(Self {
            name: name.to_string(),
            width,
            height,
            left_offset: left as i32,
            top_offset: top as i32,
            column_ofs,
            data: lump.to_vec(),
        })
    }

    /// Encode a row-major indexed image.  `transparent` pixels become gaps.
    pub fn from_pixels(
        name: &str,
        width: usize,
        height: usize,
        offsets: (i32, i32),
        pixels: &[u8],
        transparent: Option<u8>,
    ) -> Result<Self, ResourceError> {
        let bad = |reason: &str| ResourceError::Malformed {
            kind: "patch",
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if width == 0 || height == 0 || width > u16::MAX as usize {
            return Err(bad("unsupported size"));
        }
        // top_delta is a byte and 0xFF terminates a column
        if height >= END_OF_COLUMN as usize {
            return Err(bad("taller than 254 pixels"));
        }
        if pixels.len() != width * height {
            return Err(bad("pixel count does not match size"));
        }

        let mut body: Vec<u8> = Vec::new();
        let mut column_ofs = Vec::with_capacity(width);
        let body_start = HEADER_LEN + 4 * width;

        for x in 0..width {
            column_ofs.push(body_start + body.len());
            let mut y = 0;
            while y < height {
                let opaque = |y: usize| Some(pixels[y * width + x]) != transparent;
                if !opaque(y) {
                    y += 1;
                    continue;
                }
                let start = y;
                while y < height && opaque(y) {
                    y += 1;
                }
                body.push(start as u8);
                body.push((y - start) as u8);
                body.push(0);
                body.extend((start..y).map(|r| pixels[r * width + x]));
                body.push(0);
            }
            body.push(END_OF_COLUMN);
        }

        let mut lump = Vec::with_capacity(body_start + body.len());
        write_lump(&mut lump, (width, height), offsets, &column_ofs, &body)
            .map_err(|_| bad("encoding failed"))?;

        Self::from_lump(name, &lump)
    }

    fn check_column(lump: &[u8], mut ofs: usize) -> Result<(), &'static str> {
        loop {
            let top = *lump.get(ofs).ok_or("column runs past end of lump")?;
            if top == END_OF_COLUMN {
                return Ok(());
            }
            let len = *lump.get(ofs + 1).ok_or("post header truncated")? as usize;
            // pad, pixels, pad
            if ofs + 3 + len >= lump.len() {
                return Err("post runs past end of lump");
            }
            ofs += len + 4;
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    pub fn left_offset(&self) -> i32 {
        self.left_offset
    }
    pub fn top_offset(&self) -> i32 {
        self.top_offset
    }

    /// Posts of column `col`; an out-of-range column is empty.
    pub fn posts(&self, col: usize) -> Posts<'_> {
        Posts {
            data: &self.data,
            ofs: self.column_ofs.get(col).copied(),
        }
    }
}

fn read_header(rd: &mut Cursor<&[u8]>) -> std::io::Result<(u16, u16, i16, i16)> {
    Ok((
        rd.read_u16::<LittleEndian>()?,
        rd.read_u16::<LittleEndian>()?,
        rd.read_i16::<LittleEndian>()?,
        rd.read_i16::<LittleEndian>()?,
    ))
}

fn write_lump(
    out: &mut Vec<u8>,
    (width, height): (usize, usize),
    (left, top): (i32, i32),
    column_ofs: &[usize],
    body: &[u8],
) -> std::io::Result<()> {
    out.write_u16::<LittleEndian>(width as u16)?;
    out.write_u16::<LittleEndian>(height as u16)?;
    out.write_i16::<LittleEndian>(left as i16)?;
    out.write_i16::<LittleEndian>(top as i16)?;
    for ofs in column_ofs {
        out.write_u32::<LittleEndian>(*ofs as u32)?;
    }
    out.write_all(body)
}

pub struct Posts<'a> {
    data: &'a [u8],
    ofs: Option<usize>,
}

impl<'a> Iterator for Posts<'a> {
    type Item = Post<'a>;

    fn next(&mut self) -> Option<Post<'a>> {
        let ofs = self.ofs?;
        let top = *self.data.get(ofs)?;
        if top == END_OF_COLUMN {
            self.ofs = None;
            return None;
        }
        let len = *self.data.get(ofs + 1)? as usize;
        let pixels = self.data.get(ofs + 3..ofs + 3 + len)?;
        self.ofs = Some(ofs + len + 4);
        Some(Post {
            top_delta: top as i32,
            pixels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_skips_transparent_runs() {
        // 2 × 4, column 0 has a hole in the middle, column 1 is empty
        #[rustfmt::skip]
        let px = [
            5, 0,
            0, 0,
            7, 0,
            8, 0,
        ];
        let p = Patch::from_pixels("P", 2, 4, (1, 3), &px, Some(0)).unwrap();
        assert_eq!((p.width(), p.height()), (2, 4));
        assert_eq!((p.left_offset(), p.top_offset()), (1, 3));

        let posts: Vec<_> = p.posts(0).collect();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0], Post { top_delta: 0, pixels: &[5] });
        assert_eq!(posts[1], Post { top_delta: 2, pixels: &[7, 8] });
        assert_eq!(p.posts(1).count(), 0);
        assert_eq!(p.posts(9).count(), 0);
    }

    #[test]
    fn truncated_lumps_are_rejected() {
        assert!(Patch::from_lump("X", &[1, 0]).is_err());

        // valid header, column table points past the end
        let mut lump = vec![1, 0, 1, 0, 0, 0, 0, 0];
        lump.extend_from_slice(&200u32.to_le_bytes());
        assert!(matches!(
            Patch::from_lump("X", &lump),
            Err(ResourceError::Malformed { kind: "patch", .. })
        ));

        // post claims 50 pixels but the lump ends early
        let mut lump = vec![1, 0, 1, 0, 0, 0, 0, 0];
        lump.extend_from_slice(&12u32.to_le_bytes());
        lump.extend_from_slice(&[0, 50, 0, 1, 2, 3]);
        assert!(Patch::from_lump("X", &lump).is_err());
    }

    #[test]
    fn tall_pictures_are_refused() {
        let px = vec![1u8; 300];
        assert!(Patch::from_pixels("T", 1, 300, (0, 0), &px, None).is_err());
    }
}
