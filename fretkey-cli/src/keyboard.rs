//! System keyboard injection: committed notes become real keystrokes in
//! whatever application has focus.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use fretkey_core::inject::KeyInjector;
use fretkey_core::{InjectError, KeyAction};

/// What the system keyboard is asked to do for one action.
#[derive(Debug, Clone, PartialEq)]
enum Keystroke {
    Text(String),
    Press(Key),
}

fn keystroke_for(action: KeyAction) -> Keystroke {
    match action {
        KeyAction::Char(c) => Keystroke::Text(c.to_string()),
        KeyAction::Space => Keystroke::Press(Key::Space),
        KeyAction::Enter => Keystroke::Press(Key::Return),
        KeyAction::Backspace => Keystroke::Press(Key::Backspace),
    }
}

/// Injects key actions through the OS input APIs.
pub struct SystemKeyboard {
    enigo: Enigo,
}

impl SystemKeyboard {
    /// Connects to the platform input backend (X11/Wayland, Quartz or SendInput).
    pub fn new() -> Result<Self, InjectError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| InjectError::Unavailable(e.to_string()))?;
        Ok(Self { enigo })
    }
}

impl KeyInjector for SystemKeyboard {
    fn inject(&mut self, action: KeyAction) -> Result<(), InjectError> {
        let result = match keystroke_for(action) {
            Keystroke::Text(text) => self.enigo.text(&text),
            Keystroke::Press(key) => self.enigo.key(key, Direction::Click),
        };
        result.map_err(|e| InjectError::Rejected(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn characters_are_entered_as_text() {
        assert_eq!(keystroke_for(KeyAction::Char('e')), Keystroke::Text("e".to_string()));
        assert_eq!(keystroke_for(KeyAction::Char('E')), Keystroke::Text("E".to_string()));
    }

    #[test]
    fn named_keys_are_pressed() {
        assert_eq!(keystroke_for(KeyAction::Space), Keystroke::Press(Key::Space));
        assert_eq!(keystroke_for(KeyAction::Enter), Keystroke::Press(Key::Return));
        assert_eq!(keystroke_for(KeyAction::Backspace), Keystroke::Press(Key::Backspace));
    }
}
