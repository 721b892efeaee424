fn spawn_at(world: &mut World, name: &str, pos: Vec2) -> Result<EntityId, EntityError> {
    let id = world.create_entity(name)?;
    world.state_mut().set_position(id, pos);
    Ok(id)
}

fn tile_collidable() -> Component {
    Component::collidable(Collidable::new(TILE_TYPE, TILE_MASK, TILE_RADIUS))
}

fn tile_sprite(assets: &GameAssets, tile_id: u32) -> Component {
    Component::sprite(SpriteRender::new(assets.tile(tile_id), SPRITE_LAYER))
}

/// Collision pair seen from the listening entity, if `other` is the player.
fn touched_by_player(event: &Event, ctx: &ListenerContext<'_>) -> Option<EntityId> {
    let EventPayload::Pair { subject, other } = event.payload else {
        return None;
    };
    ctx.entity(other)
        .is_some_and(|entity| entity.name == PLAYER_NAME)
        .then_some(subject)
}

/// Spawns the entity for one level tile. Empty and unmapped ids spawn nothing.
fn create_sprite(
    world: &mut World,
    assets: &GameAssets,
    tile_id: u32,
    pos: Vec2,
) -> Result<Option<EntityId>, EntityError> {
    let Some(kind) = TileKind::from_id(tile_id) else {
        if tile_id != tile_engine::level::EMPTY_TILE {
            debug!(tile_id, "tile_has_no_entity");
        }
        return Ok(None);
    };

    let id = match kind {
        TileKind::Brick => create_brick(world, assets, tile_id, pos)?,
        TileKind::Food => create_food(world, assets, pos)?,
        TileKind::CoinBox => create_coin_box(world, assets, tile_id, pos)?,
        TileKind::Switch => create_switch(world, assets, tile_id, pos)?,
        TileKind::Blinky => create_blinky(world, assets, pos)?,
        TileKind::Pinky => create_pinky(world, assets, pos)?,
    };
    world.add(id)?;
    Ok(Some(id))
}

fn create_player(
    world: &mut World,
    assets: &GameAssets,
    pos: Vec2,
) -> Result<EntityId, EntityError> {
    let id = spawn_at(world, PLAYER_NAME, pos)?;
    world.add_component(
        id,
        Component::collidable(Collidable::new(PLAYER_TYPE, PLAYER_MASK, PLAYER_RADIUS)),
    )?;
    world.add_component(id, Component::slide(Slide::new(PLAYER_SPEED)))?;

    let mut animation = assets.animation().with_facing(Facing::Cardinal {
        left: "blinky_left".to_string(),
        right: "blinky_right".to_string(),
        up: "blinky_up".to_string(),
        down: "blinky_down".to_string(),
    });
    if let Err(err) = animation.set_animation("blinky_right") {
        debug!(error = %err, "player_animation_missing");
    }
    world.add_component(id, Component::animation(animation))?;

    world.on_entity(id, COLLISION, ListenerConfig::only_self(), stop_at_wall)?;
    world.add(id)?;
    Ok(id)
}

/// Pulls the player back to the edge of the wall it ran into and stops it
/// along the axis it was moving on.
fn stop_at_wall(event: &Event, ctx: &mut ListenerContext<'_>) {
    let EventPayload::Pair { subject, other } = event.payload else {
        return;
    };
    if !ctx.entity(other).is_some_and(|entity| entity.has_tag(WALL_TAG)) {
        return;
    }
    let (Some(mut pos), Some(mut vel), Some(wall)) = (
        ctx.position(subject),
        ctx.velocity(subject),
        ctx.position(other),
    ) else {
        return;
    };

    if vel.x > 0.0 {
        vel.x = 0.0;
        pos.x = wall.x - TILE;
    } else if vel.x < 0.0 {
        vel.x = 0.0;
        pos.x = wall.x + TILE;
    }
    if vel.y > 0.0 {
        vel.y = 0.0;
        pos.y = wall.y - TILE;
    } else if vel.y < 0.0 {
        vel.y = 0.0;
        pos.y = wall.y + TILE;
    }

    ctx.set_position(subject, pos);
    ctx.set_velocity(subject, vel);
}

fn create_brick(
    world: &mut World,
    assets: &GameAssets,
    tile_id: u32,
    pos: Vec2,
) -> Result<EntityId, EntityError> {
    let id = spawn_at(world, "brick", pos)?;
    if let Some(entity) = world.entity_mut(id) {
        entity.tags.push(WALL_TAG.to_string());
    }
    world.add_component(id, tile_collidable())?;
    world.add_component(id, tile_sprite(assets, tile_id))?;
    Ok(id)
}

fn create_food(
    world: &mut World,
    assets: &GameAssets,
    pos: Vec2,
) -> Result<EntityId, EntityError> {
    let id = spawn_at(world, "food", pos)?;
    world.add_component(id, tile_collidable())?;
    world.add_component(id, tile_sprite(assets, FOOD_TILE))?;
    world.on_entity(id, COLLISION, ListenerConfig::only_self(), |event, ctx| {
        if let Some(food) = touched_by_player(event, ctx) {
            ctx.play_sound(SOUND_COIN);
            ctx.remove(food);
        }
    })?;
    Ok(id)
}

fn create_coin_box(
    world: &mut World,
    assets: &GameAssets,
    tile_id: u32,
    pos: Vec2,
) -> Result<EntityId, EntityError> {
    let id = spawn_at(world, "coinbox", pos)?;
    world.add_component(id, tile_collidable())?;
    world.add_component(id, tile_sprite(assets, tile_id))?;
    Ok(id)
}

fn create_switch(
    world: &mut World,
    assets: &GameAssets,
    tile_id: u32,
    pos: Vec2,
) -> Result<EntityId, EntityError> {
    let id = spawn_at(world, "switch", pos)?;
    world.add_component(id, tile_collidable())?;
    world.add_component(id, tile_sprite(assets, tile_id))?;

    let off = assets.tile(SWITCH_OFF_TILE);
    let on = assets.tile(SWITCH_ON_TILE);
    let mut last_hit: Option<f64> = None;
    let mut state = false;
    world.on_entity(id, COLLISION, ListenerConfig::only_self(), move |event, ctx| {
        let Some(switch) = touched_by_player(event, ctx) else {
            return;
        };
        let now = ctx.elapsed();
        if last_hit.is_some_and(|hit| now - hit < SWITCH_COOLDOWN_SECONDS) {
            return;
        }
        last_hit = Some(now);
        state = !state;
        ctx.play_sound(SOUND_SWITCH);

        let sprite = if state { &on } else { &off };
        let render = ctx
            .entity_mut(switch)
            .and_then(|entity| entity.find_component_mut("spriterender"));
        if let Some(ComponentKind::Sprite(render)) = render.map(Component::kind_mut) {
            render.set_sprite(Arc::clone(sprite));
        }
        debug!(on = state, "switch_toggled");
    })?;
    Ok(id)
}

fn create_blinky(
    world: &mut World,
    assets: &GameAssets,
    pos: Vec2,
) -> Result<EntityId, EntityError> {
    let id = spawn_at(world, "blinky", pos)?;
    let config = *world.config();
    let vectors = world.state_mut().vectors_mut();
    let stay = StayInBounds::new(
        vectors,
        Bounds::new(0.0, 0.0, config.width as f32, config.height as f32),
    )?
    .with_limits(BLINKY_BOUNDS_MAX_SPEED, BLINKY_BOUNDS_STEER);
    let follow = Follow::new(vectors, FollowTarget::Cursor)?
        .with_limits(BLINKY_MAX_SPEED, BLINKY_MAX_STEERING);

    let animation = assets.animation().with_facing(Facing::Horizontal {
        left: "blinky_left".to_string(),
        right: "blinky_right".to_string(),
        hold: BLINKY_FACING_HOLD_SECONDS,
    });

    world.add_component(id, Component::stay_in_bounds(stay))?;
    world.add_component(id, Component::animation(animation))?;
    world.add_component(id, Component::follow(follow))?;
    Ok(id)
}

fn create_pinky(
    world: &mut World,
    assets: &GameAssets,
    pos: Vec2,
) -> Result<EntityId, EntityError> {
    let id = spawn_at(world, "pinky", pos)?;
    let config = *world.config();
    let vectors = world.state_mut().vectors_mut();
    let separate = Separate::new(vectors, PINKY_MIN_DISTANCE)?;
    let stay = StayInBounds::new(
        vectors,
        Bounds::new(
            TILE,
            TILE,
            config.width as f32 - TILE * 2.0,
            config.height as f32 - TILE * 2.0,
        ),
    )?
    .with_limits(PINKY_BOUNDS_MAX_SPEED, PINKY_BOUNDS_STEER);

    let mut animation = assets.animation().with_facing(Facing::Horizontal {
        left: "pinky_left".to_string(),
        right: "pinky_right".to_string(),
        hold: 0.0,
    });
    if let Err(err) = animation.play_animation("pinky_left") {
        debug!(error = %err, "pinky_animation_missing");
    }

    world.add_component(id, Component::separate(separate))?;
    world.add_component(id, Component::animation(animation))?;
    world.add_component(id, Component::stay_in_bounds(stay))?;
    Ok(id)
}

/// Walks the level grid and spawns one entity per mapped tile.
fn spawn_level(world: &mut World, assets: &GameAssets) -> Result<usize, EntityError> {
    let level = Arc::clone(&assets.level);
    let mut tiles = level.tile_iter();
    let mut spawned = 0;
    while tiles.has_next() {
        let index = tiles.position();
        let Some(tile_id) = tiles.next() else {
            break;
        };
        let (x, y) = grid_position(index, level.columns(), level.tile_width());
        if create_sprite(world, assets, tile_id, Vec2::new(x, y))?.is_some() {
            spawned += 1;
        }
    }
    Ok(spawned)
}
