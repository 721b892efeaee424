use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod assets;
pub mod collision;
pub mod component;
pub mod entity;
pub mod event;
pub mod input;
pub mod level;
pub mod pool;
pub mod render;
pub mod runtime;
pub mod scene;
pub mod vector;
pub mod world;

pub use app::{
    run_app, run_app_with_metrics, AppError, LoopConfig, LoopMetricsSnapshot, MetricsHandle,
    SLOW_FRAME_ENV_VAR,
};
pub use assets::{
    AnimationClip, AnimationSet, Asset, AssetCategory, AssetError, AssetRegistry, Atlas, Sprite,
    Tileset,
};
pub use collision::CollisionSystem;
pub use component::{
    Behaviour, Bounds, Capabilities, Collidable, Component, ComponentKind, DrawInfo, Facing, Follow,
    FollowTarget, Separate, Slide, SpriteRender, SpriteRenderAnimation, StayInBounds, UpdateContext,
    Wander,
};
pub use entity::{Entity, EntityError, EntityId};
pub use event::{Event, EventBus, EventPayload, ListenerConfig, ListenerContext, SubscriptionId};
pub use input::{InputAction, InputSnapshot};
pub use level::{grid_position, Level, LevelError, TileIter};
pub use pool::{PoolError, PoolRegistry, VectorPool};
pub use render::{default_layers, LayerConfig, Renderer, Surface};
pub use runtime::{Game, GameCommand, Runtime};
pub use scene::Scene;
pub use vector::Vec2;
pub use world::{World, WorldConfig, WorldState};

pub const ROOT_ENV_VAR: &str = "PACSLIDER_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub asset_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "PACSLIDER_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/pacslider\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root(env::var(ROOT_ENV_VAR))?;
    let asset_dir = root.join("assets");
    Ok(AppPaths { root, asset_dir })
}

fn resolve_root(env_value: Result<String, env::VarError>) -> Result<PathBuf, StartupError> {
    match env_value {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
