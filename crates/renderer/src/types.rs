use std::fmt;

/// Pixel dimensions of a render target or window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamps both dimensions to at least one pixel.
    pub fn at_least_one(self) -> Self {
        Self::new(self.width.max(1), self.height.max(1))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_f32(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }

    pub fn min_side(&self) -> u32 {
        self.width.min(self.height)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

/// Keys the host and program variants react to.
///
/// Window backends translate their native key events into this set so
/// program logic stays independent of the windowing crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable key, lowercased.
    Char(char),
    Space,
    Enter,
    Escape,
    Left,
    Right,
    Up,
    Down,
    /// Function keys F1-F24.
    F(u8),
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    /// Super / Command / Windows key.
    pub logo: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        control: false,
        alt: false,
        logo: false,
    };

    pub const LOGO: Modifiers = Modifiers {
        shift: false,
        control: false,
        alt: false,
        logo: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Input delivered to the host and forwarded to the active program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key {
        key: Key,
        state: KeyState,
        modifiers: Modifiers,
    },
    /// Vertical scroll amount; positive scrolls up.
    Scroll { delta: f64 },
    /// Cursor position in physical pixels, origin at the top-left corner.
    CursorMoved { x: f64, y: f64 },
    MouseButton {
        button: MouseButton,
        state: KeyState,
    },
}

impl InputEvent {
    pub fn key_released(key: Key) -> Self {
        InputEvent::Key {
            key,
            state: KeyState::Released,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn key_pressed(key: Key) -> Self {
        InputEvent::Key {
            key,
            state: KeyState::Pressed,
            modifiers: Modifiers::NONE,
        }
    }

    /// Returns the key when this is a release event.
    pub fn released(&self) -> Option<Key> {
        match self {
            InputEvent::Key {
                key,
                state: KeyState::Released,
                ..
            } => Some(*key),
            _ => None,
        }
    }

    /// Returns the key for press events, including auto-repeat.
    pub fn pressed(&self) -> Option<Key> {
        match self {
            InputEvent::Key {
                key,
                state: KeyState::Pressed,
                ..
            } => Some(*key),
            _ => None,
        }
    }
}

/// Pointer state tracked by the host and handed to programs every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CursorState {
    pub x: f32,
    pub y: f32,
    pub left_down: bool,
    pub right_down: bool,
}

impl CursorState {
    pub fn apply(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::CursorMoved { x, y } => {
                self.x = x as f32;
                self.y = y as f32;
            }
            InputEvent::MouseButton { button, state } => {
                let down = state == KeyState::Pressed;
                match button {
                    MouseButton::Left => self.left_down = down,
                    MouseButton::Right => self.right_down = down,
                    MouseButton::Middle => {}
                }
            }
            _ => {}
        }
    }

    /// Layout used by the `mouse` uniforms: position plus pressed flag.
    pub fn as_uniform(&self) -> [f32; 3] {
        [self.x, self.y, if self.left_down { 1.0 } else { 0.0 }]
    }
}

/// Tracks pointer movement between events, used for drag panning.
#[derive(Debug, Clone, Copy, Default)]
pub struct MouseDelta {
    last: Option<(f64, f64)>,
}

impl MouseDelta {
    /// Returns movement since the previous call; the first call yields zero.
    pub fn delta(&mut self, x: f64, y: f64) -> (f64, f64) {
        let delta = match self.last {
            Some((lx, ly)) => (x - lx, y - ly),
            None => (0.0, 0.0),
        };
        self.last = Some((x, y));
        delta
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_tracks_moves_and_buttons() {
        let mut cursor = CursorState::default();
        cursor.apply(&InputEvent::CursorMoved { x: 10.0, y: 20.0 });
        cursor.apply(&InputEvent::MouseButton {
            button: MouseButton::Left,
            state: KeyState::Pressed,
        });
        assert_eq!(cursor.as_uniform(), [10.0, 20.0, 1.0]);
        cursor.apply(&InputEvent::MouseButton {
            button: MouseButton::Left,
            state: KeyState::Released,
        });
        assert!(!cursor.left_down);
    }

    #[test]
    fn mouse_delta_starts_at_zero() {
        let mut delta = MouseDelta::default();
        assert_eq!(delta.delta(5.0, 5.0), (0.0, 0.0));
        assert_eq!(delta.delta(8.0, 1.0), (3.0, -4.0));
    }

    #[test]
    fn size_display_uses_wxh() {
        assert_eq!(Size::new(64, 32).to_string(), "64x32");
        assert_eq!(Size::new(0, 4).at_least_one(), Size::new(1, 4));
    }
}
