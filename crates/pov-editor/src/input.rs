//! Input abstraction layer.
//!
//! Pointer coordinates arrive in container pixels (already offset by the
//! container's scroll position). The canvas converts them to logical canvas
//! units before any tool sees them.

/// Keyboard modifier state at the time of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Platform command key: ⌘ on macOS, Ctrl elsewhere.
    pub fn cmd(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A normalized pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown {
        x: f32,
        y: f32,
        modifiers: Modifiers,
    },
    PointerMove {
        x: f32,
        y: f32,
        modifiers: Modifiers,
    },
    PointerUp {
        x: f32,
        y: f32,
    },
}

impl InputEvent {
    pub fn pointer_down(x: f32, y: f32) -> Self {
        Self::PointerDown {
            x,
            y,
            modifiers: Modifiers::default(),
        }
    }

    pub fn pointer_move(x: f32, y: f32) -> Self {
        Self::PointerMove {
            x,
            y,
            modifiers: Modifiers::default(),
        }
    }

    pub fn pointer_up(x: f32, y: f32) -> Self {
        Self::PointerUp { x, y }
    }

    pub fn position(&self) -> (f32, f32) {
        match *self {
            Self::PointerDown { x, y, .. } | Self::PointerMove { x, y, .. } | Self::PointerUp { x, y } => {
                (x, y)
            }
        }
    }

    /// The same event with its position mapped through `f`.
    pub fn map_position(self, f: impl Fn(f32, f32) -> (f32, f32)) -> Self {
        match self {
            Self::PointerDown { x, y, modifiers } => {
                let (x, y) = f(x, y);
                Self::PointerDown { x, y, modifiers }
            }
            Self::PointerMove { x, y, modifiers } => {
                let (x, y) = f(x, y);
                Self::PointerMove { x, y, modifiers }
            }
            Self::PointerUp { x, y } => {
                let (x, y) = f(x, y);
                Self::PointerUp { x, y }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_keeps_kind_and_modifiers() {
        let shift = Modifiers {
            shift: true,
            ..Modifiers::default()
        };
        let down = InputEvent::PointerDown {
            x: 300.0,
            y: 100.0,
            modifiers: shift,
        };
        let mapped = down.map_position(|x, y| (x / 2.0, y / 2.0));
        assert_eq!(
            mapped,
            InputEvent::PointerDown {
                x: 150.0,
                y: 50.0,
                modifiers: shift,
            }
        );
        assert_eq!(mapped.position(), (150.0, 50.0));
    }
}
