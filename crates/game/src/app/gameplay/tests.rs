use std::path::Path;

use super::*;
use tile_engine::{default_layers, Runtime, WorldConfig};

const DT: f32 = 1.0 / 60.0;
const COLUMNS: usize = 20;
const ROWS: usize = 15;

fn bundled_assets() -> GameAssets {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets");
    let registry = AssetRegistry::load_manifest(&root, Path::new("pacslider/manifest.json"))
        .expect("bundled manifest");
    GameAssets::from_registry(&registry).expect("bundled assets")
}

/// Full-size empty level with `tiles` placed at `(column, row, id)`.
fn assets_with_tiles(tiles: &[(usize, usize, u32)]) -> GameAssets {
    let mut data = vec![0u32; COLUMNS * ROWS];
    for (column, row, id) in tiles {
        data[row * COLUMNS + column] = *id;
    }
    let data = data
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let raw = format!(
        r#"{{"width":{COLUMNS},"height":{ROWS},"tilewidth":32,"layers":[{{"data":[{data}]}}]}}"#
    );
    GameAssets {
        level: Arc::new(Level::from_json("test", &raw).expect("test level")),
        ..bundled_assets()
    }
}

fn loaded_runtime(assets: GameAssets) -> Runtime {
    let mut runtime = Runtime::new(
        WorldConfig::default(),
        default_layers(),
        Box::new(PacsliderGame::new(assets)),
    );
    runtime.load().expect("load");
    runtime
}

fn press(action: InputAction) -> InputSnapshot {
    InputSnapshot::empty().with_action_pressed(action)
}

fn run_ticks(runtime: &mut Runtime, ticks: usize) {
    for _ in 0..ticks {
        runtime.tick(DT, InputSnapshot::empty());
    }
}

fn count_named(world: &World, name: &str) -> usize {
    world
        .state()
        .scene()
        .live_ids()
        .filter(|id| world.entity(*id).is_some_and(|entity| entity.name == name))
        .count()
}

fn player_state(world: &World) -> (Vec2, Vec2) {
    let id = world.find_entity(PLAYER_NAME).expect("player");
    let state = world.state();
    (
        state.position(id).expect("position"),
        state.velocity(id).expect("velocity"),
    )
}

#[test]
fn tile_ids_map_to_entities() {
    let runtime = loaded_runtime(assets_with_tiles(&[
        (0, 0, 1),
        (1, 0, 5),
        (2, 0, 2),
        (3, 0, 3),
        (4, 0, 4),
        (5, 0, 6),
        (6, 0, 7),
        (7, 0, 8),
    ]));
    let world = runtime.world();

    assert_eq!(count_named(world, "brick"), 2);
    for name in ["food", "coinbox", "switch", "blinky", "pinky", PLAYER_NAME] {
        assert_eq!(count_named(world, name), 1, "{name}");
    }
    assert_eq!(world.entity_count(), 8);

    let food = world.find_entity("food").expect("food");
    assert_eq!(world.state().position(food), Some(Vec2::new(64.0, 0.0)));
    let brick = world.find_entity("brick").expect("brick");
    assert!(world.entity(brick).expect("brick entity").has_tag(WALL_TAG));
}

#[test]
fn player_spawns_at_its_start_tile() {
    let runtime = loaded_runtime(assets_with_tiles(&[]));
    let (pos, vel) = player_state(runtime.world());
    assert_eq!(pos, PLAYER_SPAWN);
    assert_eq!(vel, Vec2::new(0.0, 0.0));
}

#[test]
fn player_eats_food_in_its_path() {
    let mut runtime = loaded_runtime(assets_with_tiles(&[(3, 3, 2)]));
    assert_eq!(count_named(runtime.world(), "food"), 1);

    runtime.tick(DT, press(InputAction::MoveRight));
    run_ticks(&mut runtime, 20);

    assert_eq!(count_named(runtime.world(), "food"), 0);
    assert!(runtime.world().find_entity("food").is_none());
    assert_eq!(runtime.world().state().audio().count(SOUND_COIN), 1);
}

#[test]
fn wall_stops_player_on_the_tile_edge() {
    let mut runtime = loaded_runtime(assets_with_tiles(&[(4, 3, 1)]));

    runtime.tick(DT, press(InputAction::MoveRight));
    run_ticks(&mut runtime, 30);

    let (pos, vel) = player_state(runtime.world());
    assert_eq!(pos, Vec2::new(96.0, 96.0));
    assert_eq!(vel, Vec2::new(0.0, 0.0));
    assert_eq!(count_named(runtime.world(), "brick"), 1);
}

#[test]
fn wall_above_stops_an_upward_slide() {
    let mut runtime = loaded_runtime(assets_with_tiles(&[(1, 1, 5)]));

    runtime.tick(DT, press(InputAction::MoveUp));
    run_ticks(&mut runtime, 30);

    let (pos, vel) = player_state(runtime.world());
    assert_eq!(pos, Vec2::new(32.0, 64.0));
    assert_eq!(vel, Vec2::new(0.0, 0.0));
}

#[test]
fn coin_box_does_not_block_or_vanish() {
    let mut runtime = loaded_runtime(assets_with_tiles(&[(3, 3, 3)]));

    runtime.tick(DT, press(InputAction::MoveRight));
    run_ticks(&mut runtime, 20);

    let (pos, _) = player_state(runtime.world());
    assert!(pos.x > 96.0);
    assert_eq!(count_named(runtime.world(), "coinbox"), 1);
}

#[test]
fn switch_toggles_once_per_pass_and_stays() {
    let assets = assets_with_tiles(&[(2, 3, 4)]);
    let on_tile = assets.tile(SWITCH_ON_TILE);
    let mut runtime = loaded_runtime(assets);

    runtime.tick(DT, press(InputAction::MoveRight));
    run_ticks(&mut runtime, 20);

    let world = runtime.world();
    assert_eq!(world.state().audio().count(SOUND_SWITCH), 1);
    let switch = world.find_entity("switch").expect("switch stays");
    let render = world
        .entity(switch)
        .and_then(|entity| entity.find_component("spriterender"))
        .expect("switch sprite");
    let ComponentKind::Sprite(render) = render.kind() else {
        panic!("switch should draw a static sprite");
    };
    assert!(Arc::ptr_eq(&render.sprite, &on_tile));
}

#[test]
fn blinky_chases_the_cursor_inside_the_viewport() {
    let runtime = loaded_runtime(assets_with_tiles(&[(10, 7, 6)]));
    let world = runtime.world();
    let blinky = world
        .find_entity("blinky")
        .and_then(|id| world.entity(id))
        .expect("blinky");

    let follow = blinky.find_component("follow").map(Component::kind);
    let Some(ComponentKind::Follow(follow)) = follow else {
        panic!("blinky should follow");
    };
    assert_eq!(follow.target, FollowTarget::Cursor);
    assert_eq!(follow.max_speed, BLINKY_MAX_SPEED);
    assert_eq!(follow.max_steering, BLINKY_MAX_STEERING);

    let stay = blinky.find_component("stayinbounds").map(Component::kind);
    let Some(ComponentKind::StayInBounds(stay)) = stay else {
        panic!("blinky should stay in bounds");
    };
    assert_eq!(stay.bounds, Bounds::new(0.0, 0.0, 640.0, 480.0));
    assert_eq!(stay.steer_mag, BLINKY_BOUNDS_STEER);
}

#[test]
fn pinky_keeps_a_tile_away_from_the_edges() {
    let runtime = loaded_runtime(assets_with_tiles(&[(5, 5, 7)]));
    let world = runtime.world();
    let pinky = world
        .find_entity("pinky")
        .and_then(|id| world.entity(id))
        .expect("pinky");

    let stay = pinky.find_component("stayinbounds").map(Component::kind);
    let Some(ComponentKind::StayInBounds(stay)) = stay else {
        panic!("pinky should stay in bounds");
    };
    assert_eq!(stay.bounds, Bounds::new(32.0, 32.0, 576.0, 416.0));
    assert_eq!(stay.max_speed, PINKY_BOUNDS_MAX_SPEED);
    assert!(matches!(
        pinky.find_component("separate").map(Component::kind),
        Some(ComponentKind::Separate(separate)) if separate.min_distance == PINKY_MIN_DISTANCE
    ));
}

#[test]
fn restart_key_restores_the_level() {
    let mut runtime = loaded_runtime(assets_with_tiles(&[(3, 3, 2), (6, 6, 2)]));
    let initial = runtime.world().entity_count();
    runtime.tick(DT, press(InputAction::MoveRight));
    run_ticks(&mut runtime, 20);
    assert_eq!(count_named(runtime.world(), "food"), 1);

    let command = runtime.tick(DT, press(InputAction::Restart));
    assert_eq!(command, GameCommand::Restart);
    runtime.restart().expect("restart");

    assert_eq!(runtime.world().entity_count(), initial);
    assert_eq!(count_named(runtime.world(), "food"), 2);
    assert_eq!(player_state(runtime.world()).0, PLAYER_SPAWN);
}

#[test]
fn overlay_reports_food_and_player() {
    let runtime = loaded_runtime(assets_with_tiles(&[(3, 3, 2), (6, 6, 2)]));
    let lines = runtime.debug_lines(Default::default());

    assert!(lines.iter().any(|line| line == "food left 2"));
    assert!(lines.iter().any(|line| line == "player 32,96"));
    assert!(lines.iter().any(|line| line == "coins 0"));
}

#[test]
fn bundled_level_spawns_every_mapped_tile() {
    let assets = bundled_assets();
    let level = Arc::clone(&assets.level);
    let mapped = level
        .tiles()
        .iter()
        .filter(|id| TileKind::from_id(**id).is_some())
        .count();
    let food = level.tiles().iter().filter(|id| **id == FOOD_TILE).count();

    let runtime = loaded_runtime(assets);

    assert_eq!(runtime.world().entity_count(), mapped + 1);
    assert_eq!(count_named(runtime.world(), "food"), food);
    assert_eq!(count_named(runtime.world(), "blinky"), 1);
    assert_eq!(count_named(runtime.world(), "pinky"), 1);
}
