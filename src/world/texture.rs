// Format-agnostic repository of pictures decoded by the resource collaborator.
// The renderer and world logic interact through ids only.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::world::patch::Patch;

/// Runtime handles, *guaranteed* stable for the lifetime of the bank.
pub type TextureId = u16;
pub type FlatId = u16;
pub type PatchId = u16;
pub type SpriteId = u16;

/// Every store reserves id 0 for its checkerboard placeholder.
pub const PLACEHOLDER: u16 = 0;
pub const NO_TEXTURE: TextureId = PLACEHOLDER;

/// Flats are always `FLAT_SIZE × FLAT_SIZE`, row-major.
pub const FLAT_SIZE: usize = 64;

/// Light-level remaps; map 0 is full bright, 31 darkest.
pub const NUMCOLORMAPS: usize = 32;
/// Inverted grey ramp (invulnerability) and one spare identity map.
pub const INVERSE_COLORMAP: usize = NUMCOLORMAPS;
const TOTAL_COLORMAPS: usize = NUMCOLORMAPS + 2;

/// How a name that cannot be resolved is treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    /// Missing resources are an error.
    #[default]
    Strict,
    /// Missing resources resolve to the placeholder, with a warning.
    Tolerant,
}

/// Things that can go wrong when using the bank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResourceError {
    /// Attempted to insert a second resource with an existing name.
    #[error("{kind} `{name}` already present in bank")]
    Duplicate { kind: &'static str, name: String },

    #[error("{kind} `{name}` not found")]
    Missing { kind: &'static str, name: String },

    /// Requested ID is outside `0 .. len()`.
    #[error("{kind} id {id} out of range")]
    BadId { kind: &'static str, id: u16 },

    #[error("malformed {kind} `{name}`: {reason}")]
    Malformed {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("too many {0} for 16-bit ids")]
    TooMany(&'static str),
}

/*──────────────────────────── pictures ──────────────────────────────*/

/// Wall texture: a patch composited into dense columns.
///
/// Opaque walls sample the dense columns (holes read as index 0); masked
/// middle textures walk the posts of the original patch instead.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub width: usize,
    pub height: usize,
    columns: Vec<u8>,
    patch: Patch,
}

impl Texture {
    pub fn from_patch(name: &str, patch: Patch) -> Self {
        let (width, height) = (patch.width(), patch.height());
        let mut columns = vec![0u8; width * height];
        for x in 0..width {
            let col = &mut columns[x * height..(x + 1) * height];
            for post in patch.posts(x) {
                for (i, &px) in post.pixels.iter().enumerate() {
                    if let Some(dst) = col.get_mut(post.top_delta as usize + i) {
                        *dst = px;
                    }
                }
            }
        }
        Self {
            name: name.to_string(),
            width,
            height,
            columns,
            patch,
        }
    }

    /// Fully opaque texture from a row-major image.
    pub fn from_pixels(
        name: &str,
        width: usize,
        height: usize,
        pixels: &[u8],
    ) -> Result<Self, ResourceError> {
        let patch = Patch::from_pixels(name, width, height, (0, 0), pixels, None)?;
        Ok(Self::from_patch(name, patch))
    }

    /// Wrap any column index into the texture.
    #[inline]
    pub fn column_index(&self, col: i32) -> usize {
        col.rem_euclid(self.width as i32) as usize
    }

    /// Dense pixels of (wrapped) column `col`, top to bottom.
    #[inline]
    pub fn column(&self, col: i32) -> &[u8] {
        let x = self.column_index(col);
        &self.columns[x * self.height..(x + 1) * self.height]
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }
}

/// Floor / ceiling picture.
#[derive(Clone, Debug, PartialEq)]
pub struct Flat {
    pub name: String,
    pixels: Vec<u8>,
}

impl Flat {
    pub fn new(name: &str, pixels: Vec<u8>) -> Result<Self, ResourceError> {
        if pixels.len() != FLAT_SIZE * FLAT_SIZE {
            return Err(ResourceError::Malformed {
                kind: "flat",
                name: name.to_string(),
                reason: format!("expected {} bytes, got {}", FLAT_SIZE * FLAT_SIZE, pixels.len()),
            });
        }
        Ok(Self {
            name: name.to_string(),
            pixels,
        })
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// One animation frame of a sprite: either a single picture for every
/// viewing angle, or eight rotations (0 = seen from the front).
#[derive(Clone, Debug, PartialEq)]
pub struct SpriteFrame {
    pub rotate: bool,
    pub patches: [PatchId; 8],
    pub flip: [bool; 8],
}

impl SpriteFrame {
    pub fn single(patch: PatchId) -> Self {
        Self {
            rotate: false,
            patches: [patch; 8],
            flip: [false; 8],
        }
    }

    pub fn rotations(patches: [PatchId; 8], flip: [bool; 8]) -> Self {
        Self {
            rotate: true,
            patches,
            flip,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpriteDef {
    pub name: String,
    pub frames: Vec<SpriteFrame>,
}

/*──────────────────────────── colour ────────────────────────────────*/

/// Index → `0x00RRGGBB`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette(pub [u32; 256]);
impl Default for Palette {
    fn default() -> Self {
        Palette([0u32; 256])
    }
}
impl Index<usize> for Palette {
    type Output = u32;
    fn index(&self, idx: usize) -> &u32 {
        &self.0[idx]
    }
}
impl IndexMut<usize> for Palette {
    fn index_mut(&mut self, idx: usize) -> &mut u32 {
        &mut self.0[idx]
    }
}

impl Palette {
    #[inline]
    pub fn rgb(&self, idx: u8) -> (i32, i32, i32) {
        let c = self.0[idx as usize];
        (((c >> 16) & 0xFF) as i32, ((c >> 8) & 0xFF) as i32, (c & 0xFF) as i32)
    }

    /// Closest palette entry by squared RGB distance (first wins on ties).
    pub fn nearest(&self, r: i32, g: i32, b: i32) -> u8 {
        let mut best = 0u8;
        let mut best_d = i32::MAX;
        for i in 0..=255u8 {
            let (pr, pg, pb) = self.rgb(i);
            let d = (pr - r).pow(2) + (pg - g).pow(2) + (pb - b).pow(2);
            if d < best_d {
                best = i;
                best_d = d;
                if d == 0 {
                    break;
                }
            }
        }
        best
    }
}

/// Light-level remap tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Colormaps(pub Box<[[u8; 256]; TOTAL_COLORMAPS]>);

impl Default for Colormaps {
    fn default() -> Self {
        Self::identity()
    }
}

impl Index<usize> for Colormaps {
    type Output = [u8; 256];
    fn index(&self, idx: usize) -> &Self::Output {
        &self.0[idx.min(TOTAL_COLORMAPS - 1)]
    }
}

impl Colormaps {
    /// Every level maps each index to itself (no diminishing light).
    pub fn identity() -> Self {
        let mut id = [0u8; 256];
        for (i, v) in id.iter_mut().enumerate() {
            *v = i as u8;
        }
        Colormaps(Box::new([id; TOTAL_COLORMAPS]))
    }

    /// Darken towards black in `NUMCOLORMAPS` steps, plus an inverted grey
    /// map.
    pub fn from_palette(pal: &Palette) -> Self {
        let mut maps = Self::identity();
        for level in 0..NUMCOLORMAPS {
            let keep = (NUMCOLORMAPS - level) as i32;
            for i in 0..=255u8 {
                let (r, g, b) = pal.rgb(i);
                let scale = |c: i32| c * keep / NUMCOLORMAPS as i32;
                maps.0[level][i as usize] = pal.nearest(scale(r), scale(g), scale(b));
            }
        }
        for i in 0..=255u8 {
            let (r, g, b) = pal.rgb(i);
            let grey = 255 - (r * 30 + g * 59 + b * 11) / 100;
            maps.0[INVERSE_COLORMAP][i as usize] = pal.nearest(grey, grey, grey);
        }
        maps
    }
}

/// `blend(src, dst)` lookup for 50 % translucency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranMap(Vec<u8>);

impl TranMap {
    pub fn from_palette(pal: &Palette) -> Self {
        let mut table = vec![0u8; 256 * 256];
        for src in 0..=255u8 {
            let (sr, sg, sb) = pal.rgb(src);
            for dst in 0..=255u8 {
                let (dr, dg, db) = pal.rgb(dst);
                table[(src as usize) << 8 | dst as usize] =
                    pal.nearest((sr + dr) / 2, (sg + dg) / 2, (sb + db) / 2);
            }
        }
        TranMap(table)
    }

    #[inline(always)]
    pub fn blend(&self, src: u8, dst: u8) -> u8 {
        self.0[(src as usize) << 8 | dst as usize]
    }
}

/*──────────────────────────── stores ────────────────────────────────*/

/// Name → id map over a dense vector; slot 0 is the placeholder.
struct Store<T> {
    kind: &'static str,
    by_name: HashMap<String, u16>,
    data: Vec<T>,
}

impl<T> Store<T> {
    fn new(kind: &'static str, placeholder: T) -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("MISSING".to_string(), PLACEHOLDER);
        Self {
            kind,
            by_name,
            data: vec![placeholder],
        }
    }

    fn insert(&mut self, name: String, item: T) -> Result<u16, ResourceError> {
        if self.by_name.contains_key(&name) {
            return Err(ResourceError::Duplicate {
                kind: self.kind,
                name,
            });
        }
        if self.data.len() > u16::MAX as usize {
            return Err(ResourceError::TooMany(self.kind));
        }
        let id = self.data.len() as u16;
        self.data.push(item);
        self.by_name.insert(name, id);
        Ok(id)
    }

    fn resolve(&self, name: &str, mode: ResourceMode) -> Result<u16, ResourceError> {
        match (self.by_name.get(name), mode) {
            (Some(&id), _) => Ok(id),
            (None, ResourceMode::Strict) => Err(ResourceError::Missing {
                kind: self.kind,
                name: name.to_string(),
            }),
            (None, ResourceMode::Tolerant) => {
                warn!("{} `{}` not found, substituting placeholder", self.kind, name);
                Ok(PLACEHOLDER)
            }
        }
    }

    fn get(&self, id: u16) -> Result<&T, ResourceError> {
        self.data.get(id as usize).ok_or(ResourceError::BadId {
            kind: self.kind,
            id,
        })
    }

    /// Never fails: slot 0 exists from construction on.
    #[inline]
    fn get_or_placeholder(&self, id: u16) -> &T {
        self.data
            .get(id as usize)
            .unwrap_or(&self.data[PLACEHOLDER as usize])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Sky {
    flat: FlatId,
    texture: TextureId,
}

/// A palette-agnostic cache of everything the renderer draws.
///
/// * Does **not** know about archives or file formats – that's the loader's job.
/// * Stores exactly one copy of every name per kind.
/// * ID **0** of every kind is the checkerboard placeholder.
///
/// Read-only while a frame is being rendered.
pub struct ResourceBank {
    mode: ResourceMode,
    textures: Store<Texture>,
    flats: Store<Flat>,
    patches: Store<Patch>,
    sprites: Store<SpriteDef>,
    palette: Palette,
    colormaps: Colormaps,
    tranmap: Option<TranMap>,
    sky: Option<Sky>,
}

impl ResourceBank {
    // ---------------------------------------------------------------------
    // Constructors
    // ---------------------------------------------------------------------

    pub fn new(mode: ResourceMode) -> Result<Self, ResourceError> {
        let checker = checker(FLAT_SIZE, 8);
        let patch = Patch::from_pixels("MISSING", FLAT_SIZE, FLAT_SIZE, (32, 64), &checker, None)?;
        let texture = Texture::from_patch("MISSING", patch.clone());
        let flat = Flat::new("MISSING", checker)?;
        let sprite = SpriteDef {
            name: "MISSING".into(),
            frames: vec![SpriteFrame::single(PLACEHOLDER)],
        };

        Ok(Self {
            mode,
            textures: Store::new("texture", texture),
            flats: Store::new("flat", flat),
            patches: Store::new("patch", patch),
            sprites: Store::new("sprite", sprite),
            palette: Palette::default(),
            colormaps: Colormaps::identity(),
            tranmap: None,
            sky: None,
        })
    }

    pub fn mode(&self) -> ResourceMode {
        self.mode
    }

    // ---------------------------------------------------------------------
    // Mutations (load time only)
    // ---------------------------------------------------------------------

    pub fn insert_texture(&mut self, tex: Texture) -> Result<TextureId, ResourceError> {
        self.textures.insert(tex.name.clone(), tex)
    }

    pub fn insert_flat(&mut self, flat: Flat) -> Result<FlatId, ResourceError> {
        self.flats.insert(flat.name.clone(), flat)
    }

    pub fn insert_patch(&mut self, patch: Patch) -> Result<PatchId, ResourceError> {
        self.patches.insert(patch.name().to_string(), patch)
    }

    pub fn insert_sprite(&mut self, sprite: SpriteDef) -> Result<SpriteId, ResourceError> {
        for frame in &sprite.frames {
            for &p in &frame.patches {
                self.patches.get(p)?;
            }
        }
        self.sprites.insert(sprite.name.clone(), sprite)
    }

    /// Install a palette and derive the light remaps from it.
    pub fn set_palette(&mut self, palette: Palette) {
        self.colormaps = Colormaps::from_palette(&palette);
        self.palette = palette;
        info!("palette installed, {} colormaps derived", NUMCOLORMAPS);
    }

    /// Derive the 50 % translucency table from the current palette.
    pub fn build_tranmap(&mut self) {
        self.tranmap = Some(TranMap::from_palette(&self.palette));
    }

    /// `flat` marks sky ceilings, which are drawn with `texture` instead.
    pub fn set_sky(&mut self, flat: FlatId, texture: TextureId) -> Result<(), ResourceError> {
        self.flats.get(flat)?;
        self.textures.get(texture)?;
        self.sky = Some(Sky { flat, texture });
        Ok(())
    }

    /// Name-based form of [`ResourceBank::set_sky`].
    pub fn configure_sky(&mut self, flat: &str, texture: &str) -> Result<(), ResourceError> {
        let flat = self.flat_id(flat)?;
        let texture = self.texture_id(texture)?;
        self.set_sky(flat, texture)
    }

    // ---------------------------------------------------------------------
    // Name lookups (honour the resource mode)
    // ---------------------------------------------------------------------

    pub fn texture_id(&self, name: &str) -> Result<TextureId, ResourceError> {
        self.textures.resolve(name, self.mode)
    }

    pub fn flat_id(&self, name: &str) -> Result<FlatId, ResourceError> {
        self.flats.resolve(name, self.mode)
    }

    pub fn patch_id(&self, name: &str) -> Result<PatchId, ResourceError> {
        self.patches.resolve(name, self.mode)
    }

    pub fn sprite_id(&self, name: &str) -> Result<SpriteId, ResourceError> {
        self.sprites.resolve(name, self.mode)
    }

    // ---------------------------------------------------------------------
    // Id lookups
    // ---------------------------------------------------------------------

    /// Borrow a texture by id, with bounds-checking.
    pub fn texture(&self, id: TextureId) -> Result<&Texture, ResourceError> {
        self.textures.get(id)
    }

    pub fn flat(&self, id: FlatId) -> Result<&Flat, ResourceError> {
        self.flats.get(id)
    }

    pub fn patch(&self, id: PatchId) -> Result<&Patch, ResourceError> {
        self.patches.get(id)
    }

    pub fn sprite(&self, id: SpriteId) -> Result<&SpriteDef, ResourceError> {
        self.sprites.get(id)
    }

    /// Render-time lookups: unknown ids draw the placeholder.
    #[inline]
    pub fn texture_or_missing(&self, id: TextureId) -> &Texture {
        self.textures.get_or_placeholder(id)
    }

    #[inline]
    pub fn flat_or_missing(&self, id: FlatId) -> &Flat {
        self.flats.get_or_placeholder(id)
    }

    #[inline]
    pub fn patch_or_missing(&self, id: PatchId) -> &Patch {
        self.patches.get_or_placeholder(id)
    }

    #[inline]
    pub fn sprite_or_missing(&self, id: SpriteId) -> &SpriteDef {
        self.sprites.get_or_placeholder(id)
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn colormaps(&self) -> &Colormaps {
        &self.colormaps
    }

    pub fn tranmap(&self) -> Option<&TranMap> {
        self.tranmap.as_ref()
    }

    #[inline]
    pub fn is_sky(&self, pic: FlatId) -> bool {
        self.sky.is_some_and(|s| s.flat == pic)
    }

    pub fn sky_texture(&self) -> Option<TextureId> {
        self.sky.map(|s| s.texture)
    }
}

/// Two-index checkerboard, `cell` pixels per square.
fn checker(size: usize, cell: usize) -> Vec<u8> {
    const LIGHT_IDX: u8 = 8;
    const DARK_IDX: u8 = 16;
    let mut pix = vec![0u8; size * size];
    for y in 0..size {
        for x in 0..size {
            pix[y * size + x] = if ((x / cell) ^ (y / cell)) & 1 == 0 {
                LIGHT_IDX
            } else {
                DARK_IDX
            };
        }
    }
    pix
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_tex(name: &str, color: u8) -> Texture {
        Texture::from_pixels(name, 2, 2, &[color; 4]).unwrap()
    }

    #[test]
    fn insert_and_lookup() {
        let mut bank = ResourceBank::new(ResourceMode::Strict).unwrap();
        let red = bank.insert_texture(dummy_tex("RED", 0x00)).unwrap();
        let blue = bank.insert_texture(dummy_tex("BLUE", 0xFF)).unwrap();

        assert_ne!(red, NO_TEXTURE);
        assert_ne!(blue, red);
        assert_eq!(bank.texture_id("RED"), Ok(red));
        assert_eq!(bank.texture_id("BLUE"), Ok(blue));

        assert_eq!(bank.texture(red).unwrap().column(0)[0], 0x00);
        assert_eq!(bank.texture(blue).unwrap().column(1)[1], 0xFF);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut bank = ResourceBank::new(ResourceMode::Strict).unwrap();
        bank.insert_texture(dummy_tex("WOOD", 1)).unwrap();
        let err = bank.insert_texture(dummy_tex("WOOD", 2)).unwrap_err();
        assert_eq!(
            err,
            ResourceError::Duplicate {
                kind: "texture",
                name: "WOOD".into()
            }
        );
    }

    #[test]
    fn strict_mode_reports_missing_names() {
        let bank = ResourceBank::new(ResourceMode::Strict).unwrap();
        assert_eq!(
            bank.flat_id("NOPE"),
            Err(ResourceError::Missing {
                kind: "flat",
                name: "NOPE".into()
            })
        );
        assert!(bank.sprite_id("NOPE").is_err());
    }

    #[test]
    fn tolerant_mode_substitutes_placeholder() {
        let bank = ResourceBank::new(ResourceMode::Tolerant).unwrap();
        assert_eq!(bank.texture_id("NOPE"), Ok(PLACEHOLDER));
        assert_eq!(bank.patch_id("NOPE"), Ok(PLACEHOLDER));
        assert_eq!(bank.flat_or_missing(PLACEHOLDER).pixels().len(), FLAT_SIZE * FLAT_SIZE);
    }

    #[test]
    fn bad_id_guard() {
        let bank = ResourceBank::new(ResourceMode::Strict).unwrap();
        let bad = TextureId::MAX;
        assert_eq!(
            bank.texture(bad).unwrap_err(),
            ResourceError::BadId {
                kind: "texture",
                id: bad
            }
        );
        // render-time lookups fall back instead
        assert_eq!(bank.texture_or_missing(bad).name, "MISSING");
    }

    #[test]
    fn columns_wrap_both_ways() {
        #[rustfmt::skip]
        let tex = Texture::from_pixels("T", 3, 2, &[
            1, 2, 3,
            4, 5, 6,
        ]).unwrap();
        assert_eq!(tex.column(0), &[1, 4]);
        assert_eq!(tex.column(4), &[2, 5]);
        assert_eq!(tex.column(-1), &[3, 6]);
    }

    #[test]
    fn colormaps_darken_monotonically() {
        let mut pal = Palette::default();
        for i in 0..256 {
            pal[i] = (i as u32) << 16 | (i as u32) << 8 | i as u32; // grey ramp
        }
        let maps = Colormaps::from_palette(&pal);
        assert_eq!(maps[0][200], 200);
        assert!(maps[16][200] < 200);
        assert!(maps[31][200] <= maps[16][200]);
        assert_eq!(maps[INVERSE_COLORMAP][255], 0);
    }

    #[test]
    fn sprite_with_unknown_patch_rejected() {
        let mut bank = ResourceBank::new(ResourceMode::Strict).unwrap();
        let def = SpriteDef {
            name: "BAD".into(),
            frames: vec![SpriteFrame::single(42)],
        };
        assert!(matches!(
            bank.insert_sprite(def),
            Err(ResourceError::BadId { kind: "patch", .. })
        ));
    }
}
