use crate::vector::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    ToggleOverlay,
    ToggleCollisions,
    Restart,
    Quit,
}

const ACTION_COUNT: usize = 8;

impl InputAction {
    pub const ALL: [InputAction; ACTION_COUNT] = [
        InputAction::MoveUp,
        InputAction::MoveDown,
        InputAction::MoveLeft,
        InputAction::MoveRight,
        InputAction::ToggleOverlay,
        InputAction::ToggleCollisions,
        InputAction::Restart,
        InputAction::Quit,
    ];

    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::ToggleOverlay => 4,
            InputAction::ToggleCollisions => 5,
            InputAction::Restart => 6,
            InputAction::Quit => 7,
        }
    }
}

/// Held state plus press edges, one slot per action.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
    pressed: [bool; ACTION_COUNT],
}

impl ActionStates {
    /// Records a key transition. A press edge is only raised on up -> down.
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        let index = action.index();
        if is_down && !self.down[index] {
            self.pressed[index] = true;
        }
        self.down[index] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn was_pressed(&self, action: InputAction) -> bool {
        self.pressed[action.index()]
    }

    pub(crate) fn take_pressed(&mut self, action: InputAction) -> bool {
        let index = action.index();
        let was_pressed = self.pressed[index];
        self.pressed[index] = false;
        was_pressed
    }

    pub(crate) fn clear_pressed(&mut self) {
        self.pressed = [false; ACTION_COUNT];
    }
}

/// Input as seen by one simulation tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        actions: ActionStates,
        cursor_position_px: Option<Vec2>,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            actions,
            cursor_position_px,
            window_width,
            window_height,
        }
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn pressed(&self, action: InputAction) -> bool {
        self.actions.was_pressed(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    /// Press edge without a held state, as produced by a tap shorter than a tick.
    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.actions.pressed[action.index()] = true;
        self
    }

    pub fn with_cursor_position_px(mut self, cursor_position_px: Option<Vec2>) -> Self {
        self.cursor_position_px = cursor_position_px;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_only_on_transition() {
        let mut states = ActionStates::default();
        states.set(InputAction::MoveLeft, true);
        assert!(states.take_pressed(InputAction::MoveLeft));

        states.set(InputAction::MoveLeft, true);
        assert!(!states.take_pressed(InputAction::MoveLeft));
        assert!(states.is_down(InputAction::MoveLeft));

        states.set(InputAction::MoveLeft, false);
        states.set(InputAction::MoveLeft, true);
        assert!(states.take_pressed(InputAction::MoveLeft));
    }

    #[test]
    fn snapshot_builders_round_trip() {
        let snapshot = InputSnapshot::empty()
            .with_action_pressed(InputAction::MoveUp)
            .with_cursor_position_px(Some(Vec2::new(10.0, 20.0)))
            .with_window_size((640, 480));

        assert!(snapshot.pressed(InputAction::MoveUp));
        assert!(!snapshot.is_down(InputAction::MoveUp));
        assert_eq!(snapshot.window_size(), (640, 480));
        assert_eq!(snapshot.cursor_position_px(), Some(Vec2::new(10.0, 20.0)));
    }

    #[test]
    fn action_indices_are_unique() {
        let mut seen = [false; ACTION_COUNT];
        for action in InputAction::ALL {
            assert!(!seen[action.index()]);
            seen[action.index()] = true;
        }
    }
}
