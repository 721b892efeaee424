pub(crate) struct PacsliderGame {
    assets: GameAssets,
    player: Option<EntityId>,
}

impl PacsliderGame {
    pub(crate) fn new(assets: GameAssets) -> Self {
        Self {
            assets,
            player: None,
        }
    }

    fn food_left(world: &World) -> usize {
        world
            .state()
            .scene()
            .live_ids()
            .filter(|id| world.entity(*id).is_some_and(|entity| entity.name == "food"))
            .count()
    }
}

impl Game for PacsliderGame {
    fn load(&mut self, world: &mut World) -> Result<(), EntityError> {
        let tiles = spawn_level(world, &self.assets)?;
        let player = create_player(world, &self.assets, PLAYER_SPAWN)?;
        self.player = Some(player);
        info!(
            level = self.assets.level().name(),
            tiles,
            food = Self::food_left(world),
            "level_spawned"
        );
        Ok(())
    }

    fn update(&mut self, _dt: f32, input: &InputSnapshot, _world: &mut World) -> GameCommand {
        if input.pressed(InputAction::Restart) {
            info!("restart_requested");
            return GameCommand::Restart;
        }
        GameCommand::None
    }

    fn unload(&mut self, _world: &mut World) {
        self.player = None;
    }

    fn debug_lines(&self, world: &World) -> Vec<String> {
        let mut lines = vec![format!("food left {}", Self::food_left(world))];
        if let Some(pos) = self.player.and_then(|id| world.state().position(id)) {
            lines.push(format!("player {:.0},{:.0}", pos.x, pos.y));
        }
        lines.push(format!("coins {}", world.state().audio().count(SOUND_COIN)));
        lines
    }
}
