// Key bindings for the chat controls

use crossterm::event::{KeyCode, KeyModifiers};

use crate::app::Command;

/// Map a key press to a command. `None` means the key is unbound.
pub fn command_for(key: KeyCode, modifiers: KeyModifiers) -> Option<Command> {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);

    let command = match key {
        KeyCode::Char('c' | 'q') if ctrl => Command::Quit,
        KeyCode::Char('h') if ctrl => Command::ToggleHelp,
        KeyCode::Char('y') if ctrl => Command::Copy,
        KeyCode::Char('l') if ctrl => Command::Clear,
        KeyCode::Char(_) if ctrl => return None,
        KeyCode::Char(c) => Command::Input(c),
        // Ctrl+H arrives as Backspace on many terminals.
        KeyCode::F(1) => Command::ToggleHelp,
        KeyCode::Enter => Command::Submit,
        KeyCode::Esc => Command::Cancel,
        KeyCode::Backspace => Command::Backspace,
        KeyCode::Up => Command::ScrollUp(1),
        KeyCode::Down => Command::ScrollDown(1),
        KeyCode::PageUp => Command::ScrollUp(10),
        KeyCode::PageDown => Command::ScrollDown(10),
        KeyCode::Home => Command::ScrollTop,
        KeyCode::End => Command::ScrollBottom,
        _ => return None,
    };
    Some(command)
}
