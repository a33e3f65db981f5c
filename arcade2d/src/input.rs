use std::collections::{HashMap, HashSet};

use winit::{
    event::{ElementState, KeyEvent},
    keyboard::{KeyCode, PhysicalKey},
};

/// Tracks keyboard state across frames.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    keys_released: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame pressed/released flags.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.keys_released.clear();
    }

    /// Handle a keyboard input event from winit.
    pub fn handle_key(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(keycode) = event.physical_key {
            match event.state {
                ElementState::Pressed => self.press(keycode),
                ElementState::Released => self.release(keycode),
            }
        }
    }

    /// Mark a key as held. Repeated presses while held are not reported as new presses.
    pub fn press(&mut self, key: KeyCode) {
        if self.keys_down.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    pub fn release(&mut self, key: KeyCode) {
        if self.keys_down.remove(&key) {
            self.keys_released.insert(key);
        }
    }

    /// Release every held key (used when the window loses focus).
    pub fn release_all(&mut self) {
        let held: Vec<KeyCode> = self.keys_down.iter().copied().collect();
        for key in held {
            self.release(key);
        }
    }

    /// Returns true if the key is currently held down.
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Returns true if the key was pressed this frame.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Returns true if the key was released this frame.
    pub fn is_key_released(&self, key: KeyCode) -> bool {
        self.keys_released.contains(&key)
    }
}

/// A logical input action (e.g. "left", "jump").
///
/// Game code binds one or more keys to each action and then queries the action
/// state instead of referencing key codes directly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new(name: impl Into<String>) -> Self {
        ActionId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActionId {
    fn from(value: &str) -> Self {
        ActionId::new(value)
    }
}

/// Mapping from actions to physical keys.
#[derive(Clone, Debug, Default)]
pub struct InputMap {
    actions: HashMap<ActionId, Vec<KeyCode>>,
}

impl InputMap {
    pub const LEFT: &'static str = "left";
    pub const RIGHT: &'static str = "right";
    pub const UP: &'static str = "up";
    pub const SPACE: &'static str = "space";

    pub fn new() -> Self {
        Self::default()
    }

    /// The classic four-button layout: arrow keys for left/right/up plus the space bar.
    pub fn cursor_keys() -> Self {
        let mut map = Self::new();
        map.bind_key(Self::LEFT, KeyCode::ArrowLeft);
        map.bind_key(Self::RIGHT, KeyCode::ArrowRight);
        map.bind_key(Self::UP, KeyCode::ArrowUp);
        map.bind_key(Self::SPACE, KeyCode::Space);
        map
    }

    /// Bind a key to an action. An action may have any number of keys.
    pub fn bind_key(&mut self, action: impl Into<ActionId>, key: KeyCode) {
        let keys = self.actions.entry(action.into()).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    pub fn keys(&self, action: &str) -> &[KeyCode] {
        self.actions
            .get(&ActionId::new(action))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check if any key bound to the action is currently held down.
    pub fn action_down(&self, input: &InputState, action: &str) -> bool {
        self.keys(action).iter().any(|&k| input.is_key_down(k))
    }

    /// Check if any key bound to the action went down this frame.
    pub fn action_pressed(&self, input: &InputState, action: &str) -> bool {
        self.keys(action).iter().any(|&k| input.is_key_pressed(k))
    }
}
