//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s.
//! The shortcut map lives in Rust so the wasm host and tests share it.

use crate::input::Modifiers;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    /// Escape: cancel a pending link, disarm line linking, stop playback.
    Cancel,

    // ── View ──
    ZoomIn,
    ZoomOut,
    ZoomReset,

    // ── Edit ──
    /// Delete the selected clip.
    Delete,

    // ── Playback ──
    /// Play from the selected clip, or stop if that traversal is running.
    TogglePlayback,
}

pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action.
    ///
    /// `key` is the `KeyboardEvent.key` value (e.g. `"+"`, `"Delete"`).
    /// Zoom keys work with or without the command modifier.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        match key {
            "=" | "+" => return Some(ShortcutAction::ZoomIn),
            "-" | "_" => return Some(ShortcutAction::ZoomOut),
            "0" => return Some(ShortcutAction::ZoomReset),
            "Escape" => return Some(ShortcutAction::Cancel),
            _ => {}
        }

        if modifiers.cmd() || modifiers.alt {
            return None;
        }

        match key {
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            " " => Some(ShortcutAction::TogglePlayback),
            _ => None,
        }
    }
}
