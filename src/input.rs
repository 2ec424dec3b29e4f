use crossterm::event::KeyCode;

/// Dashboard commands. Quit is handled by the main loop before mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Pause,
    Resume,
    ScrollUp,
    ScrollDown,
}

pub fn parse_main_command(key_code: &KeyCode) -> Option<UiCommand> {
    match key_code {
        KeyCode::Up => Some(UiCommand::ScrollUp),
        KeyCode::Down => Some(UiCommand::ScrollDown),
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'p' => Some(UiCommand::Pause),
            'r' => Some(UiCommand::Resume),
            'k' => Some(UiCommand::ScrollUp),
            'j' => Some(UiCommand::ScrollDown),
            _ => None,
        },
        _ => None,
    }
}

pub fn is_quit_key(key_code: &KeyCode) -> bool {
    matches!(key_code, KeyCode::Char('q') | KeyCode::Char('Q'))
}
