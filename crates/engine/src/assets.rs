//! Asset registry: images, atlases, animation sets, tilesets, sounds and levels
//! named by a JSON manifest.
//!
//! Image files that are missing or undecodable are replaced by a magenta
//! placeholder so a half-populated asset tree still runs. Malformed JSON is
//! always an error.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::level::{Level, LevelError};

pub const PLACEHOLDER_COLOR: [u8; 4] = [255, 0, 255, 255];
const PLACEHOLDER_SIZE: u32 = 32;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{path} is malformed at {field}: {source}")]
    Json {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("pixel buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    PixelBufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("atlas '{atlas}' frame '{frame}' lies outside its sheet")]
    FrameOutOfBounds { atlas: String, frame: String },
    #[error("animation set '{set}' refers to unknown atlas '{atlas}'")]
    UnknownAtlas { set: String, atlas: String },
    #[error("unknown animation '{name}'")]
    UnknownAnimation { name: String },
    #[error("asset '{name}' is registered twice")]
    DuplicateAsset { name: String },
    #[error(transparent)]
    Level(#[from] LevelError),
}

/// Straight-alpha RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Sprite {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, AssetError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(AssetError::PixelBufferSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width as usize * height as usize {
            pixels.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn placeholder(width: u32, height: u32) -> Self {
        Self::solid(width, height, PLACEHOLDER_COLOR)
    }

    pub fn load_png(path: &Path) -> Result<Self, AssetError> {
        let reader = ImageReader::open(path).map_err(|source| AssetError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = reader.decode().map_err(|source| AssetError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let image = decoded.to_rgba8();
        Ok(Self {
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
        })
    }

    /// Copies out a rectangle, or `None` when it does not fit.
    pub fn sub_image(&self, x: u32, y: u32, width: u32, height: u32) -> Option<Sprite> {
        if x.checked_add(width)? > self.width || y.checked_add(height)? > self.height {
            return None;
        }
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for row in y..y + height {
            let start = (row as usize * self.width as usize + x as usize) * 4;
            pixels.extend_from_slice(&self.pixels[start..start + width as usize * 4]);
        }
        Some(Sprite {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut color = [0; 4];
        color.copy_from_slice(&self.pixels[offset..offset + 4]);
        Some(color)
    }
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    frames: SheetFrames,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SheetFrames {
    Hash(BTreeMap<String, SheetFrame>),
    Array(Vec<NamedSheetFrame>),
}

#[derive(Debug, Deserialize)]
struct SheetFrame {
    frame: FrameRect,
}

#[derive(Debug, Deserialize)]
struct NamedSheetFrame {
    filename: String,
    frame: FrameRect,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct FrameRect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl SheetFrames {
    fn into_named(self) -> Vec<(String, FrameRect)> {
        match self {
            SheetFrames::Hash(frames) => frames
                .into_iter()
                .map(|(name, entry)| (name, entry.frame))
                .collect(),
            SheetFrames::Array(frames) => frames
                .into_iter()
                .map(|entry| (entry.filename, entry.frame))
                .collect(),
        }
    }
}

/// Frame names are looked up without their file extension.
fn frame_key(filename: &str) -> &str {
    filename.split('.').next().unwrap_or(filename)
}

/// Named sub-images cut from one sprite sheet.
#[derive(Debug, Clone, Default)]
pub struct Atlas {
    frames: HashMap<String, Arc<Sprite>>,
}

impl Atlas {
    pub fn from_frames(frames: HashMap<String, Arc<Sprite>>) -> Self {
        Self { frames }
    }

    /// Cuts `sheet` along TexturePacker JSON, hash or array flavour.
    pub fn from_sheet(name: &str, sheet: &Sprite, meta: &Path) -> Result<Self, AssetError> {
        let parsed: SheetMeta = read_json(meta)?;
        let mut frames = HashMap::new();
        for (filename, rect) in parsed.frames.into_named() {
            let key = frame_key(&filename);
            let Some(image) = sheet.sub_image(rect.x, rect.y, rect.w, rect.h) else {
                return Err(AssetError::FrameOutOfBounds {
                    atlas: name.to_string(),
                    frame: key.to_string(),
                });
            };
            frames.insert(key.to_string(), Arc::new(image));
        }
        Ok(Self { frames })
    }

    pub fn get(&self, frame: &str) -> Option<&Arc<Sprite>> {
        self.frames.get(frame)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_names(&self) -> impl Iterator<Item = &str> {
        self.frames.keys().map(String::as_str)
    }

    fn sheet_extent(meta: &Path) -> Result<(u32, u32), AssetError> {
        let parsed: SheetMeta = read_json(meta)?;
        let extent = parsed
            .frames
            .into_named()
            .into_iter()
            .fold((1, 1), |(w, h), (_, rect)| {
                (w.max(rect.x + rect.w), h.max(rect.y + rect.h))
            });
        Ok(extent)
    }
}

/// One named animation: atlas frame names and the time each one shows, in ms.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnimationClip {
    pub frames: Vec<String>,
    pub time: f32,
}

#[derive(Debug, Clone, Default)]
pub struct AnimationSet {
    clips: HashMap<String, AnimationClip>,
}

impl AnimationSet {
    pub fn from_clips(clips: HashMap<String, AnimationClip>) -> Self {
        Self { clips }
    }

    pub fn load(path: &Path) -> Result<Self, AssetError> {
        Ok(Self {
            clips: read_json(path)?,
        })
    }

    pub fn get(&self, name: &str) -> Option<&AnimationClip> {
        self.clips.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clips.keys().map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct TilesetMeta {
    tilewidth: u32,
    tileheight: u32,
    columns: u32,
    tilecount: u32,
}

/// Tiles cut from a Tiled tileset image. Id 0 is the empty tile.
#[derive(Debug, Clone)]
pub struct Tileset {
    tile_width: u32,
    tile_height: u32,
    tiles: Vec<Option<Arc<Sprite>>>,
}

impl Tileset {
    fn from_meta(meta: &TilesetMeta, sheet: &Sprite) -> Self {
        let columns = meta.columns.max(1);
        let mut tiles = Vec::with_capacity(meta.tilecount as usize + 1);
        tiles.push(None);
        for index in 0..meta.tilecount {
            let x = (index % columns) * meta.tilewidth;
            let y = (index / columns) * meta.tileheight;
            let tile = sheet
                .sub_image(x, y, meta.tilewidth, meta.tileheight)
                .unwrap_or_else(|| Sprite::placeholder(meta.tilewidth, meta.tileheight));
            tiles.push(Some(Arc::new(tile)));
        }
        Self {
            tile_width: meta.tilewidth,
            tile_height: meta.tileheight,
            tiles,
        }
    }

    pub fn get(&self, id: u32) -> Option<&Arc<Sprite>> {
        self.tiles.get(id as usize)?.as_ref()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len() - 1
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }
}

/// Registered sound. Playback is left to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundHandle {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub enum Asset {
    Image(Arc<Sprite>),
    Atlas(Arc<Atlas>),
    Animations(Arc<AnimationSet>),
    Tileset(Arc<Tileset>),
    Sound(SoundHandle),
    Level(Arc<Level>),
}

impl Asset {
    pub fn category(&self) -> AssetCategory {
        match self {
            Asset::Image(_) => AssetCategory::Images,
            Asset::Atlas(_) => AssetCategory::Atlases,
            Asset::Animations(_) => AssetCategory::Animations,
            Asset::Tileset(_) => AssetCategory::Tilesets,
            Asset::Sound(_) => AssetCategory::Sounds,
            Asset::Level(_) => AssetCategory::Levels,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetCategory {
    Images,
    Atlases,
    Animations,
    Tilesets,
    Sounds,
    Levels,
}

impl AssetCategory {
    /// Lookup order for [`AssetRegistry::get`].
    pub const ALL: [AssetCategory; 6] = [
        AssetCategory::Images,
        AssetCategory::Atlases,
        AssetCategory::Animations,
        AssetCategory::Tilesets,
        AssetCategory::Sounds,
        AssetCategory::Levels,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetCategory::Images => "images",
            AssetCategory::Atlases => "atlases",
            AssetCategory::Animations => "animations",
            AssetCategory::Tilesets => "tilesets",
            AssetCategory::Sounds => "sounds",
            AssetCategory::Levels => "levels",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    images: Vec<ImageEntry>,
    #[serde(default)]
    atlases: Vec<AtlasEntry>,
    #[serde(default)]
    animations: Vec<AnimationEntry>,
    #[serde(default)]
    tilesets: Vec<TilesetEntry>,
    #[serde(default)]
    sounds: Vec<SoundEntry>,
    #[serde(default)]
    levels: Vec<LevelEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    name: String,
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct AtlasEntry {
    name: String,
    image: PathBuf,
    meta: PathBuf,
}

#[derive(Debug, Deserialize)]
struct AnimationEntry {
    name: String,
    atlas: String,
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TilesetEntry {
    name: String,
    path: PathBuf,
    image: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SoundEntry {
    name: String,
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct LevelEntry {
    name: String,
    path: PathBuf,
}

fn read_text(path: &Path) -> Result<String, AssetError> {
    fs::read_to_string(path).map_err(|source| AssetError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AssetError> {
    let raw = read_text(path)?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        AssetError::Json {
            path: path.to_path_buf(),
            field,
            source: error.into_inner(),
        }
    })
}

/// Named assets grouped by category.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    categories: BTreeMap<AssetCategory, HashMap<String, Asset>>,
    placeholders: HashSet<String>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every entry of the manifest at `root/manifest`. Entry paths are
    /// relative to `root`.
    pub fn load_manifest(root: &Path, manifest: &Path) -> Result<Self, AssetError> {
        let manifest_path = root.join(manifest);
        let manifest: Manifest = read_json(&manifest_path)?;
        let mut registry = Self::new();

        for entry in manifest.images {
            let image = registry.load_image_or_placeholder(
                &entry.name,
                &root.join(&entry.path),
                (PLACEHOLDER_SIZE, PLACEHOLDER_SIZE),
            );
            registry.insert(&entry.name, Asset::Image(Arc::new(image)))?;
        }

        for entry in manifest.atlases {
            let meta = root.join(&entry.meta);
            let extent = Atlas::sheet_extent(&meta)?;
            let sheet = registry.load_image_or_placeholder(&entry.name, &root.join(&entry.image), extent);
            let atlas = Atlas::from_sheet(&entry.name, &sheet, &meta)?;
            registry.insert(&entry.name, Asset::Atlas(Arc::new(atlas)))?;
        }

        for entry in manifest.animations {
            if registry.atlas(&entry.atlas).is_none() {
                return Err(AssetError::UnknownAtlas {
                    set: entry.name,
                    atlas: entry.atlas,
                });
            }
            let set = AnimationSet::load(&root.join(&entry.path))?;
            registry.insert(&entry.name, Asset::Animations(Arc::new(set)))?;
        }

        for entry in manifest.tilesets {
            let meta: TilesetMeta = read_json(&root.join(&entry.path))?;
            let columns = meta.columns.max(1);
            let rows = meta.tilecount.div_ceil(columns).max(1);
            let sheet = registry.load_image_or_placeholder(
                &entry.name,
                &root.join(&entry.image),
                (columns * meta.tilewidth, rows * meta.tileheight),
            );
            let tileset = Tileset::from_meta(&meta, &sheet);
            registry.insert(&entry.name, Asset::Tileset(Arc::new(tileset)))?;
        }

        for entry in manifest.sounds {
            let sound = SoundHandle {
                name: entry.name.clone(),
                path: root.join(&entry.path),
            };
            registry.insert(&entry.name, Asset::Sound(sound))?;
        }

        for entry in manifest.levels {
            let raw = read_text(&root.join(&entry.path))?;
            let level = Level::from_json(&entry.name, &raw)?;
            registry.insert(&entry.name, Asset::Level(Arc::new(level)))?;
        }

        info!(
            manifest = %manifest_path.display(),
            asset_count = registry.len(),
            placeholder_count = registry.placeholders.len(),
            "assets_loaded"
        );
        Ok(registry)
    }

    pub fn insert(&mut self, name: &str, asset: Asset) -> Result<(), AssetError> {
        let bucket = self.categories.entry(asset.category()).or_default();
        if bucket.contains_key(name) {
            return Err(AssetError::DuplicateAsset {
                name: name.to_string(),
            });
        }
        bucket.insert(name.to_string(), asset);
        Ok(())
    }

    /// First match across categories, in [`AssetCategory::ALL`] order.
    pub fn get(&self, name: &str) -> Option<&Asset> {
        AssetCategory::ALL
            .iter()
            .find_map(|category| self.get_in(*category, name))
    }

    pub fn get_in(&self, category: AssetCategory, name: &str) -> Option<&Asset> {
        self.categories.get(&category)?.get(name)
    }

    pub fn image(&self, name: &str) -> Option<Arc<Sprite>> {
        match self.get_in(AssetCategory::Images, name)? {
            Asset::Image(sprite) => Some(Arc::clone(sprite)),
            _ => None,
        }
    }

    pub fn atlas(&self, name: &str) -> Option<Arc<Atlas>> {
        match self.get_in(AssetCategory::Atlases, name)? {
            Asset::Atlas(atlas) => Some(Arc::clone(atlas)),
            _ => None,
        }
    }

    pub fn animations(&self, name: &str) -> Option<Arc<AnimationSet>> {
        match self.get_in(AssetCategory::Animations, name)? {
            Asset::Animations(set) => Some(Arc::clone(set)),
            _ => None,
        }
    }

    pub fn tileset(&self, name: &str) -> Option<Arc<Tileset>> {
        match self.get_in(AssetCategory::Tilesets, name)? {
            Asset::Tileset(tileset) => Some(Arc::clone(tileset)),
            _ => None,
        }
    }

    pub fn sound(&self, name: &str) -> Option<&SoundHandle> {
        match self.get_in(AssetCategory::Sounds, name)? {
            Asset::Sound(sound) => Some(sound),
            _ => None,
        }
    }

    pub fn level(&self, name: &str) -> Option<Arc<Level>> {
        match self.get_in(AssetCategory::Levels, name)? {
            Asset::Level(level) => Some(Arc::clone(level)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names whose image file could not be loaded.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.placeholders.iter().map(String::as_str)
    }

    fn load_image_or_placeholder(&mut self, name: &str, path: &Path, fallback: (u32, u32)) -> Sprite {
        match Sprite::load_png(path) {
            Ok(sprite) => sprite,
            Err(error) => {
                if self.placeholders.insert(name.to_string()) {
                    warn!(
                        asset = name,
                        path = %path.display(),
                        reason = %error,
                        "asset_image_load_failed_using_placeholder"
                    );
                }
                Sprite::placeholder(fallback.0, fallback.1)
            }
        }
    }
}
