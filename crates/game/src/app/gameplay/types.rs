#[derive(Debug, Error, PartialEq, Eq)]
#[error("required asset `{0}` is missing from the manifest")]
pub(crate) struct MissingAsset(pub(crate) &'static str);

/// Shared handles to everything the factories draw with.
#[derive(Debug, Clone)]
pub(crate) struct GameAssets {
    tileset: Arc<Tileset>,
    atlas: Arc<Atlas>,
    animations: Arc<AnimationSet>,
    level: Arc<Level>,
}

impl GameAssets {
    pub(crate) fn from_registry(registry: &AssetRegistry) -> Result<Self, MissingAsset> {
        Ok(Self {
            tileset: registry
                .tileset(TILESET_ASSET)
                .ok_or(MissingAsset(TILESET_ASSET))?,
            atlas: registry.atlas(ATLAS_ASSET).ok_or(MissingAsset(ATLAS_ASSET))?,
            animations: registry
                .animations(ANIMATIONS_ASSET)
                .ok_or(MissingAsset(ANIMATIONS_ASSET))?,
            level: registry.level(LEVEL_ASSET).ok_or(MissingAsset(LEVEL_ASSET))?,
        })
    }

    pub(crate) fn level(&self) -> &Level {
        &self.level
    }

    /// Tile image for `id`, or a placeholder when the tileset is short.
    fn tile(&self, id: u32) -> Arc<Sprite> {
        self.tileset
            .get(id)
            .cloned()
            .unwrap_or_else(|| Arc::new(Sprite::placeholder(TILE_PX, TILE_PX)))
    }

    fn animation(&self) -> SpriteRenderAnimation {
        let mut animation = SpriteRenderAnimation::new(
            Arc::clone(&self.atlas),
            Arc::clone(&self.animations),
            SPRITE_LAYER,
        );
        animation.set_frame_delay(FRAME_DELAY_MS);
        animation
    }
}

/// What a non-empty tile id turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileKind {
    Brick,
    Food,
    CoinBox,
    Switch,
    Blinky,
    Pinky,
}

impl TileKind {
    fn from_id(id: u32) -> Option<Self> {
        match id {
            1 | 5 => Some(TileKind::Brick),
            2 => Some(TileKind::Food),
            3 => Some(TileKind::CoinBox),
            4 => Some(TileKind::Switch),
            6 => Some(TileKind::Blinky),
            7 => Some(TileKind::Pinky),
            _ => None,
        }
    }
}
