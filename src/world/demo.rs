//! Procedurally generated sample content.
//!
//! The viewer binaries and the test-suite both need a palette, a handful of
//! pictures and a few maps.  Everything here is built through the same public
//! hand-over points a real loader would use ([`ResourceBank`] inserts and
//! [`LevelBuilder`]), so the scenes go through full validation.
//!
//! Index ranges used by the pictures, so a rendered frame can be classified
//! pixel by pixel while colormaps are the identity:
//!
//! | range      | picture            |
//! |------------|--------------------|
//! | `32..=47`  | `BRICK` wall       |
//! | `48..=63`  | `STONE` wall       |
//! | `64..=79`  | `FLOOR` flat       |
//! | `80..=95`  | `CEIL` flat        |
//! | `96..=111` | `SKY1` / `F_SKY1`  |
//! | `112..=127`| `BALL` sprite      |
//! | `129..=133`| `ARRW` rotations   |
//! | `144..=147`| `GRATE` (masked)   |

use std::ops::RangeInclusive;

use crate::math::{Angle, Divline, Fixed, Tables};
use crate::renderer::SpriteDesc;
use crate::world::bsp::LoadError;
use crate::world::builder::LevelBuilder;
use crate::world::geometry::{BBox, Child, Level, LinedefFlags, Sector, Side, Sidedef};
use crate::world::patch::Patch;
use crate::world::texture::{
    FLAT_SIZE, Flat, FlatId, Palette, ResourceBank, ResourceError, ResourceMode, SpriteDef, SpriteFrame,
    Texture, TextureId,
};

pub const BRICK: RangeInclusive<u8> = 32..=47;
pub const STONE: RangeInclusive<u8> = 48..=63;
pub const FLOOR: RangeInclusive<u8> = 64..=79;
pub const CEIL: RangeInclusive<u8> = 80..=95;
pub const SKY: RangeInclusive<u8> = 96..=111;
pub const BALL: RangeInclusive<u8> = 112..=127;
pub const ARROW: RangeInclusive<u8> = 129..=133;
pub const GRATE: RangeInclusive<u8> = 144..=147;

/// Palette index never stored in a patch.
pub const TRANSPARENT: u8 = 255;

/// Room size used by [`room_chain`].
pub const ROOM: i32 = 256;

/// Sixteen 16-entry ramps, bright to dark.
pub fn demo_palette() -> Palette {
    const BASE: [(u32, u32, u32); 16] = [
        (255, 255, 255),
        (255, 255, 255),
        (200, 72, 56),   // brick
        (168, 168, 160), // stone
        (152, 112, 64),  // floor
        (120, 120, 150), // ceiling
        (96, 150, 255),  // sky
        (64, 220, 80),   // ball
        (255, 200, 40),  // arrow
        (200, 200, 60),  // grate
        (255, 0, 255),
        (0, 255, 255),
        (255, 128, 0),
        (128, 0, 255),
        (0, 128, 255),
        (255, 255, 0),
    ];
    let mut pal = Palette::default();
    for i in 0..256usize {
        let (r, g, b) = BASE[i / 16];
        let k = 16 - (i % 16) as u32;
        let shade = |c: u32| c * (8 + k) / 24;
        pal[i] = shade(r) << 16 | shade(g) << 8 | shade(b);
    }
    pal
}

fn image(w: usize, h: usize, f: impl Fn(usize, usize) -> u8) -> Vec<u8> {
    let mut px = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            px.push(f(x, y));
        }
    }
    px
}

/// Bank with every sample picture loaded.  Colormaps stay the identity, so
/// rendered indices equal picture indices; call
/// [`ResourceBank::set_palette`] for diminished lighting.
pub fn demo_bank(mode: ResourceMode) -> Result<ResourceBank, ResourceError> {
    let mut bank = ResourceBank::new(mode)?;

    let brick = image(64, 128, |x, y| {
        let row = y / 16;
        if y % 16 == 0 || (x + row * 32) % 64 == 0 {
            32
        } else {
            36 + (((x + row * 8) / 16) % 2) as u8 * 4 + (y % 4) as u8
        }
    });
    bank.insert_texture(Texture::from_pixels("BRICK", 64, 128, &brick)?)?;

    let stone = image(64, 128, |x, y| 48 + ((x ^ y) & 15) as u8);
    bank.insert_texture(Texture::from_pixels("STONE", 64, 128, &stone)?)?;

    let grate = image(64, 64, |x, y| {
        if x % 8 < 2 || y % 8 < 2 {
            144 + (y % 4) as u8
        } else {
            TRANSPARENT
        }
    });
    let grate = Patch::from_pixels("GRATE", 64, 64, (0, 0), &grate, Some(TRANSPARENT))?;
    bank.insert_texture(Texture::from_patch("GRATE", grate))?;

    let sky = image(256, 128, |x, y| 96 + (y * 12 / 128) as u8 + ((x >> 5) & 3) as u8);
    bank.insert_texture(Texture::from_pixels("SKY1", 256, 128, &sky)?)?;

    let n = FLAT_SIZE;
    let floor = image(n, n, |x, y| 64 + (((x >> 3) ^ (y >> 3)) & 1) as u8 * 8 + ((x + y) & 7) as u8);
    bank.insert_flat(Flat::new("FLOOR", floor)?)?;
    let ceil = image(n, n, |x, y| 80 + (((x * y) >> 6) & 15) as u8);
    bank.insert_flat(Flat::new("CEIL", ceil)?)?;
    bank.insert_flat(Flat::new("F_SKY1", vec![96; n * n])?)?;
    bank.configure_sky("F_SKY1", "SKY1")?;

    // a ball: one picture for every angle
    let ball = image(16, 16, |x, y| {
        let (dx, dy) = (x as i32 - 8, y as i32 - 8);
        if dx * dx + dy * dy < 64 {
            112 + ((dx + dy + 16) / 2) as u8
        } else {
            TRANSPARENT
        }
    });
    let ball = bank.insert_patch(Patch::from_pixels("BALLA0", 16, 16, (8, 16), &ball, Some(TRANSPARENT))?)?;
    bank.insert_sprite(SpriteDef {
        name: "BALL".into(),
        frames: vec![SpriteFrame::single(ball)],
    })?;

    // an arrow: five drawn rotations, three of them mirrored
    let mut rot = [0; 5];
    for (i, slot) in rot.iter_mut().enumerate() {
        let color = ARROW.start() + i as u8;
        let arrow = image(8, 24, |x, y| if x >= y / 4 { color } else { TRANSPARENT });
        let name = format!("ARRWA{}", i + 1);
        *slot = bank.insert_patch(Patch::from_pixels(&name, 8, 24, (4, 24), &arrow, Some(TRANSPARENT))?)?;
    }
    bank.insert_sprite(SpriteDef {
        name: "ARRW".into(),
        frames: vec![SpriteFrame::rotations(
            [rot[0], rot[1], rot[2], rot[3], rot[4], rot[3], rot[2], rot[1]],
            [false, false, false, false, false, true, true, true],
        )],
    })?;

    Ok(bank)
}

// missing names fall back to the placeholder
fn flat(bank: &ResourceBank, name: &str) -> FlatId {
    bank.flat_id(name).unwrap_or_default()
}

fn texture(bank: &ResourceBank, name: &str) -> Option<TextureId> {
    bank.texture_id(name).ok()
}

fn wall(middle: Option<TextureId>, sector: u16) -> Sidedef {
    Sidedef {
        texture_offset: Fixed::ZERO,
        row_offset: Fixed::ZERO,
        upper: None,
        lower: None,
        middle,
        sector,
    }
}

/// Square room centred on the origin, `2 * half` wide, floor 0, ceiling 128.
/// One sector, one subsector, no nodes.
pub fn square_room(bank: &ResourceBank, tables: &Tables, half: i32) -> Result<Level, LoadError> {
    let mut b = LevelBuilder::new("SQUARE");
    let s = b.sector(Sector {
        floor_height: Fixed::ZERO,
        ceiling_height: Fixed::from_int(128),
        floor_pic: flat(bank, "FLOOR"),
        ceiling_pic: flat(bank, "CEIL"),
        light: 160,
        tag: 0,
    });
    let side = b.sidedef(wall(texture(bank, "BRICK"), s));

    let h = Fixed::from_int(half);
    // clockwise, so the inside is on every line's front
    let corners = [(-h, -h), (-h, h), (h, h), (h, -h)];
    let v: Vec<_> = corners.iter().map(|&(x, y)| b.vertex(x, y)).collect();
    for i in 0..4 {
        let ld = b.linedef(v[i], v[(i + 1) % 4], LinedefFlags::BLOCKING, side, None);
        b.seg(ld, Side::Front);
    }
    b.subsector(0, 4);
    b.build(tables)
}

/// `n` rooms of [`ROOM`]² in a row along +X, joined by two-sided lines.
///
/// Odd rooms sit 16 units higher with a 16 units lower ceiling; every third
/// room is open to the sky, every fourth opening carries a grate.  Room `i`
/// is subsector `i`.
pub fn room_chain(bank: &ResourceBank, tables: &Tables, n: usize) -> Result<Level, LoadError> {
    let n = n.max(1);
    let mut b = LevelBuilder::new("CHAIN");
    let f = Fixed::from_int;

    let floor = flat(bank, "FLOOR");
    let ceil = flat(bank, "CEIL");
    let sky = flat(bank, "F_SKY1");
    let brick = texture(bank, "BRICK");
    let stone = texture(bank, "STONE");
    let grate = texture(bank, "GRATE");

    let mut sectors = Vec::with_capacity(n);
    for i in 0..n {
        let odd = i % 2 == 1;
        sectors.push(b.sector(Sector {
            floor_height: f(if odd { 16 } else { 0 }),
            ceiling_height: f(if odd { 112 } else { 128 }),
            floor_pic: floor,
            ceiling_pic: if i % 3 == 2 { sky } else { ceil },
            light: 128 + 48 * (i % 3) as u8,
            tag: 0,
        }));
    }

    // bottom row then top row of vertices
    let bottom: Vec<_> = (0..=n).map(|i| b.vertex(f(ROOM * i as i32), f(0))).collect();
    let top: Vec<_> = (0..=n).map(|i| b.vertex(f(ROOM * i as i32), f(ROOM))).collect();

    let mut south = Vec::with_capacity(n);
    let mut north = Vec::with_capacity(n);
    for i in 0..n {
        let side = b.sidedef(wall(brick, sectors[i]));
        south.push(b.linedef(bottom[i + 1], bottom[i], LinedefFlags::BLOCKING, side, None));
        let side = b.sidedef(wall(brick, sectors[i]));
        north.push(b.linedef(top[i], top[i + 1], LinedefFlags::BLOCKING, side, None));
    }
    let side = b.sidedef(wall(stone, sectors[0]));
    let west = b.linedef(bottom[0], top[0], LinedefFlags::BLOCKING, side, None);
    let side = b.sidedef(wall(stone, sectors[n - 1]));
    let east = b.linedef(top[n], bottom[n], LinedefFlags::BLOCKING, side, None);

    // opening between room i (front) and room i + 1 (back)
    let mut portals = Vec::with_capacity(n - 1);
    for i in 0..n - 1 {
        let middle = if i % 4 == 3 { grate } else { None };
        let front = b.sidedef(Sidedef {
            upper: stone,
            lower: stone,
            ..wall(middle, sectors[i])
        });
        let back = b.sidedef(Sidedef {
            upper: stone,
            lower: stone,
            ..wall(middle, sectors[i + 1])
        });
        portals.push(b.linedef(
            top[i + 1],
            bottom[i + 1],
            LinedefFlags::TWO_SIDED,
            front,
            Some(back),
        ));
    }

    for i in 0..n {
        let first = b.seg(south[i], Side::Front);
        b.seg(north[i], Side::Front);
        match i {
            0 => b.seg(west, Side::Front),
            _ => b.seg(portals[i - 1], Side::Back),
        };
        if i == n - 1 {
            b.seg(east, Side::Front);
        } else {
            b.seg(portals[i], Side::Front);
        }
        b.subsector(first, 4);
    }

    split_rooms(&mut b, 0, n);
    b.build(tables)
}

/// Balanced tree over rooms `lo .. hi`; children are pushed before parents.
fn split_rooms(b: &mut LevelBuilder, lo: usize, hi: usize) -> Child {
    if hi - lo == 1 {
        return Child::Subsector(lo as u16);
    }
    let mid = (lo + hi) / 2;
    let left = split_rooms(b, lo, mid);
    let right = split_rooms(b, mid, hi);

    let f = |v: usize| Fixed::from_int(ROOM * v as i32);
    let bbox = |a: usize, z: usize| BBox {
        top: Fixed::from_int(ROOM),
        bottom: Fixed::ZERO,
        left: f(a),
        right: f(z),
    };
    // pointing south: the western rooms are on the front
    let line = Divline {
        x: f(mid),
        y: Fixed::from_int(ROOM),
        dx: Fixed::ZERO,
        dy: Fixed::from_int(-ROOM),
    };
    Child::Node(b.node(line, [bbox(lo, mid), bbox(mid, hi)], [left, right]))
}

/// A ball and a spinning arrow in every room of a [`room_chain`].
pub fn chain_sprites(bank: &ResourceBank, level: &Level, n: usize, tick: u32) -> Vec<SpriteDesc> {
    let ball = bank.sprite_id("BALL").unwrap_or_default();
    let arrow = bank.sprite_id("ARRW").unwrap_or_default();
    let mut out = Vec::with_capacity(2 * n);
    for i in 0..n as i32 {
        let (x, y) = (Fixed::from_int(ROOM * i + 160), Fixed::from_int(96));
        out.push(SpriteDesc {
            id: 2 * i as u32,
            x,
            y,
            z: level.floor_height_at(x, y),
            angle: Angle::ZERO,
            sprite: ball,
            frame: 0,
            translucent: i % 2 == 1,
            fullbright: false,
        });
        let (x, y) = (Fixed::from_int(ROOM * i + 96), Fixed::from_int(176));
        out.push(SpriteDesc {
            id: 2 * i as u32 + 1,
            x,
            y,
            z: level.floor_height_at(x, y),
            angle: Angle::from_bits(tick.wrapping_mul(1 << 25)),
            sprite: arrow,
            frame: 0,
            translucent: false,
            fullbright: i % 3 == 0,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_scenes_validate() {
        let t = Tables::new();
        let bank = demo_bank(ResourceMode::Strict).unwrap();
        assert!(square_room(&bank, &t, 64).is_ok());
        for n in 1..=9 {
            let level = room_chain(&bank, &t, n).unwrap();
            assert_eq!(level.subsectors().len(), n);
            assert_eq!(level.nodes().len(), n - 1);
        }
    }

    #[test]
    fn picture_ranges_hold() {
        let bank = demo_bank(ResourceMode::Strict).unwrap();
        let brick = bank.texture(bank.texture_id("BRICK").unwrap()).unwrap();
        for x in 0..brick.width as i32 {
            assert!(brick.column(x).iter().all(|p| BRICK.contains(p)));
        }
        let floor = bank.flat(bank.flat_id("FLOOR").unwrap()).unwrap();
        assert!(floor.pixels().iter().all(|p| FLOOR.contains(p)));
        let ceil = bank.flat(bank.flat_id("CEIL").unwrap()).unwrap();
        assert!(ceil.pixels().iter().all(|p| CEIL.contains(p)));
        assert!(bank.is_sky(bank.flat_id("F_SKY1").unwrap()));
    }

    #[test]
    fn sprites_stand_on_the_floor() {
        let t = Tables::new();
        let bank = demo_bank(ResourceMode::Strict).unwrap();
        let level = room_chain(&bank, &t, 4).unwrap();
        let sprites = chain_sprites(&bank, &level, 4, 0);
        assert_eq!(sprites.len(), 8);
        assert_eq!(sprites[2].z, Fixed::from_int(16));
        let mut ids: Vec<_> = sprites.iter().map(|s| s.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }
}
