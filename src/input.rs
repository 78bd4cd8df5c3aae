//! Key bindings: normal and vim-style.

use capsuletui::Intent;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    RotateLeft,
    RotateRight,
    SoftDrop,
    HardDrop,
    Pause,
    Quit,
    None,
}

impl Action {
    /// Gameplay intent for the session, if this action is one.
    pub fn intent(self) -> Option<Intent> {
        match self {
            Self::MoveLeft => Some(Intent::MoveLeft),
            Self::MoveRight => Some(Intent::MoveRight),
            Self::RotateLeft => Some(Intent::RotateLeft),
            Self::RotateRight => Some(Intent::RotateRight),
            Self::SoftDrop => Some(Intent::SoftDrop),
            Self::HardDrop => Some(Intent::HardDrop),
            Self::Pause | Self::Quit | Self::None => None,
        }
    }

    /// Held keys auto-repeat for these.
    pub fn repeats(self) -> bool {
        matches!(self, Self::MoveLeft | Self::MoveRight | Self::SoftDrop)
    }
}

/// Map key event to game action. Supports both normal (arrows, z/x, space) and vim (hjkl, etc.).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod && modifiers != KeyModifiers::CONTROL {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc if no_mod => Action::Quit,
        KeyCode::Char('p') | KeyCode::Char(' ') if modifiers == KeyModifiers::CONTROL => Action::Pause,
        KeyCode::Char('p') if no_mod => Action::Pause,
        KeyCode::Left | KeyCode::Char('h') if no_mod => Action::MoveLeft,
        KeyCode::Right | KeyCode::Char('l') if no_mod => Action::MoveRight,
        KeyCode::Up | KeyCode::Char('x') | KeyCode::Char('k') if no_mod => Action::RotateRight,
        KeyCode::Char('z') | KeyCode::Char('u') if no_mod => Action::RotateLeft,
        KeyCode::Down | KeyCode::Char('j') if no_mod => Action::SoftDrop,
        KeyCode::Enter | KeyCode::Char(' ') if no_mod => Action::HardDrop,
        _ => Action::None,
    }
}
