pub mod widgets;

use crate::app::App;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

pub fn render(frame: &mut Frame, app: &mut App) {
    // Width available for text is total width - 2 (for borders)
    let available_width = frame.area().width.saturating_sub(2).max(1) as usize;

    let input_lines = if app.input_buffer.is_empty() {
        1
    } else {
        app.input_buffer.chars().count().div_ceil(available_width)
    };

    // Clamp lines: Min 1, Max 1/3 of screen height
    let max_lines = (frame.area().height as usize / 3).max(1);
    let actual_lines = input_lines.clamp(1, max_lines);

    #[allow(clippy::cast_possible_truncation)]
    let input_height = (actual_lines + 2) as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),               // Output pane
            Constraint::Length(1),            // Status line
            Constraint::Length(input_height), // Prompt input
            Constraint::Length(1),            // Control bar
        ])
        .split(frame.area());

    widgets::render_output(frame, app, chunks[0]);
    widgets::render_status_bar(frame, app, chunks[1]);
    widgets::render_input_field(frame, app, chunks[2]);
    widgets::render_control_bar(frame, app, chunks[3]);

    if app.show_help {
        widgets::render_help_window(frame, frame.area());
    }
}
