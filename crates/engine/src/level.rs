use serde::Deserialize;
use thiserror::Error;

/// Tile id Tiled writes for an empty cell.
pub const EMPTY_TILE: u32 = 0;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level '{name}' is malformed at {field}: {source}")]
    Parse {
        name: String,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("level '{name}' has no tile layers")]
    NoLayers { name: String },
    #[error("level '{name}' layer holds {actual} tiles, expected {expected}")]
    DataSize {
        name: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Deserialize)]
struct LevelFile {
    width: u32,
    height: u32,
    tilewidth: u32,
    #[serde(default)]
    tileheight: Option<u32>,
    layers: Vec<LayerFile>,
}

#[derive(Debug, Deserialize)]
struct LayerFile {
    #[serde(default)]
    width: Option<u32>,
    data: Vec<u32>,
}

/// Tile grid read from a Tiled JSON export. Only the first layer is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    name: String,
    columns: u32,
    rows: u32,
    tile_width: u32,
    tile_height: u32,
    tiles: Vec<u32>,
}

impl Level {
    pub fn from_json(name: &str, raw: &str) -> Result<Self, LevelError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let file: LevelFile =
            serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
                let field = error.path().to_string();
                LevelError::Parse {
                    name: name.to_string(),
                    field,
                    source: error.into_inner(),
                }
            })?;

        let Some(layer) = file.layers.into_iter().next() else {
            return Err(LevelError::NoLayers {
                name: name.to_string(),
            });
        };
        let columns = layer.width.unwrap_or(file.width);
        let expected = columns as usize * file.height as usize;
        if layer.data.len() != expected {
            return Err(LevelError::DataSize {
                name: name.to_string(),
                expected,
                actual: layer.data.len(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            columns,
            rows: file.height,
            tile_width: file.tilewidth,
            tile_height: file.tileheight.unwrap_or(file.tilewidth),
            tiles: layer.data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn tiles(&self) -> &[u32] {
        &self.tiles
    }

    /// Fresh row-major pass over the tile ids.
    pub fn tile_iter(&self) -> TileIter<'_> {
        TileIter {
            tiles: &self.tiles,
            index: 0,
        }
    }
}

/// Single forward pass over a level's tile ids.
#[derive(Debug, Clone)]
pub struct TileIter<'a> {
    tiles: &'a [u32],
    index: usize,
}

impl TileIter<'_> {
    pub fn has_next(&self) -> bool {
        self.index < self.tiles.len()
    }

    /// Index the next call to `next` will yield.
    pub fn position(&self) -> usize {
        self.index
    }
}

impl Iterator for TileIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let tile = *self.tiles.get(self.index)?;
        self.index += 1;
        Some(tile)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.tiles.len() - self.index;
        (remaining, Some(remaining))
    }
}

/// Top-left pixel of the cell at `index` in a grid `columns` wide.
pub fn grid_position(index: usize, columns: u32, tile: u32) -> (f32, f32) {
    let columns = columns.max(1) as usize;
    let x = (index % columns) as u32 * tile;
    let y = (index / columns) as u32 * tile;
    (x as f32, y as f32)
}
