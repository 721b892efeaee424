use std::path::Path;

use thiserror::Error;
use tile_engine::{
    default_layers, resolve_app_paths, AssetError, AssetRegistry, LoopConfig, Runtime,
    StartupError, WorldConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{GameAssets, MissingAsset, PacsliderGame};

const MANIFEST_PATH: &str = "pacslider/manifest.json";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load assets: {0}")]
    Assets(#[from] AssetError),
    #[error(transparent)]
    MissingAsset(#[from] MissingAsset),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) runtime: Runtime,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Pac-slider Startup ===");

    let paths = resolve_app_paths()?;
    info!(root = %paths.root.display(), "project_root_resolved");
    let assets = load_game_assets(&paths.asset_dir)?;

    let world_config = WorldConfig::default();
    let config = LoopConfig {
        window_width: world_config.width,
        window_height: world_config.height,
        ..LoopConfig::default()
    };
    let runtime = Runtime::new(
        world_config,
        default_layers(),
        Box::new(PacsliderGame::new(assets)),
    );

    Ok(AppWiring { config, runtime })
}

fn load_game_assets(asset_dir: &Path) -> Result<GameAssets, BootstrapError> {
    let registry = AssetRegistry::load_manifest(asset_dir, Path::new(MANIFEST_PATH))?;
    for name in registry.placeholders() {
        info!(asset = name, "asset_using_placeholder");
    }
    Ok(GameAssets::from_registry(&registry)?)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;

    fn repo_asset_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets")
    }

    #[test]
    fn bundled_assets_satisfy_the_game() {
        let assets = load_game_assets(&repo_asset_dir()).expect("bundled assets");
        assert_eq!(assets.level().columns(), 20);
        assert_eq!(assets.level().rows(), 15);
    }

    #[test]
    fn manifest_without_level_is_reported_by_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("pacslider");
        fs::create_dir_all(&dir).expect("manifest dir");
        fs::write(
            dir.join("tileset.json"),
            r#"{"tilewidth":32,"tileheight":32,"columns":1,"tilecount":1}"#,
        )
        .expect("tileset");
        fs::write(dir.join("atlas.json"), r#"{"frames":{}}"#).expect("atlas");
        fs::write(dir.join("anims.json"), "{}").expect("animations");
        fs::write(
            dir.join("manifest.json"),
            r#"{
                "atlases": [{"name": "pac_atlas", "image": "pacslider/missing.png", "meta": "pacslider/atlas.json"}],
                "animations": [{"name": "pac_anim", "atlas": "pac_atlas", "path": "pacslider/anims.json"}],
                "tilesets": [{"name": "tileset", "path": "pacslider/tileset.json", "image": "pacslider/missing.png"}]
            }"#,
        )
        .expect("manifest");

        let err = load_game_assets(temp.path()).expect_err("level is required");
        assert!(matches!(err, BootstrapError::MissingAsset(MissingAsset("level1"))));
    }

    #[test]
    fn malformed_manifest_is_an_asset_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("pacslider");
        fs::create_dir_all(&dir).expect("manifest dir");
        fs::write(dir.join("manifest.json"), r#"{"levels": [{"name": 3}]}"#).expect("manifest");

        let err = load_game_assets(temp.path()).expect_err("malformed manifest");
        assert!(matches!(err, BootstrapError::Assets(_)));
    }
}
