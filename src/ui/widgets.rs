use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

pub fn render_help_window(frame: &mut Frame, area: Rect) {
    let help_text = vec![
        Line::from(Span::styled(
            "PromptPipe - Keyboard Shortcuts",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled("Generation:", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  Enter         - Generate from prompt"),
        Line::from("  Esc           - Stop the running request"),
        Line::from("  Ctrl+Y        - Copy output to clipboard"),
        Line::from("  Ctrl+L        - Clear output"),
        Line::from(""),
        Line::from(Span::styled("Navigation:", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  Up/Down       - Scroll output"),
        Line::from("  PgUp/PgDn     - Scroll output"),
        Line::from("  Home/End      - Jump to start/end"),
        Line::from(""),
        Line::from(Span::styled("General:", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  F1/Ctrl+H     - Show/hide this help"),
        Line::from("  Ctrl+C/Ctrl+Q - Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let help_paragraph = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });

    let popup_width = 50;
    let popup_height = 20;
    let x = (area.width.saturating_sub(popup_width)) / 2;
    let y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect {
        x: area.x + x,
        y: area.y + y,
        width: popup_width.min(area.width),
        height: popup_height.min(area.height),
    };

    frame.render_widget(Clear, popup_area);
    frame.render_widget(help_paragraph, popup_area);
}

fn control<'a>(key: &'a str, label: &'a str, enabled: bool) -> Vec<Span<'a>> {
    let (key_style, label_style) = if enabled {
        (
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            Style::default().fg(Color::White),
        )
    } else {
        (
            Style::default().fg(Color::DarkGray),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT),
        )
    };
    vec![
        Span::styled(format!("[{key}] "), key_style),
        Span::styled(label, label_style),
        Span::raw("   "),
    ]
}

/// Generate and Stop reflect whether a request is in flight.
pub fn render_control_bar(frame: &mut Frame, app: &App, area: Rect) {
    let has_output = !app.output.is_empty();

    let mut spans = Vec::new();
    spans.extend(control("Enter", "Generate", app.submit_enabled()));
    spans.extend(control("Esc", "Stop", app.cancel_enabled()));
    spans.extend(control("^Y", "Copy", has_output));
    spans.extend(control("^L", "Clear", has_output));
    spans.extend(control("F1", "Help", true));

    let bar = Paragraph::new(Line::from(spans)).alignment(Alignment::Center);
    frame.render_widget(bar, area);
}

pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (text, color) = if app.is_stopping() {
        ("Stopping...".to_string(), Color::Yellow)
    } else if app.cancel_enabled() {
        ("Generating...".to_string(), Color::Green)
    } else if app.status.is_empty() {
        ("Ready".to_string(), Color::DarkGray)
    } else if app.status.starts_with("Error") {
        (app.status.clone(), Color::Red)
    } else {
        (app.status.clone(), Color::Yellow)
    };

    let status = Paragraph::new(text)
        .alignment(Alignment::Right)
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD));

    frame.render_widget(status, area);
}

pub fn render_output(frame: &mut Frame, app: &mut App, area: Rect) {
    if app.output.is_empty() {
        let welcome_text = vec![
            Line::from(Span::styled(
                "PromptPipe",
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Type a prompt and press Enter",
                Style::default().fg(Color::Cyan),
            )),
        ];

        let welcome_height = 2;
        let welcome_area = Rect {
            x: area.x,
            y: area.y + area.height.saturating_sub(welcome_height),
            width: area.width,
            height: welcome_height.min(area.height),
        };

        frame.render_widget(
            Paragraph::new(welcome_text).alignment(Alignment::Center),
            welcome_area,
        );
        return;
    }

    let lines: Vec<Line> = app.output.lines().map(Line::from).collect();

    // Count wrapped rows so the scroll offset can be clamped to the real bottom
    let available_width = (area.width as usize).max(1);
    let total_visual_lines: usize = lines
        .iter()
        .map(|line| line.width().div_ceil(available_width).max(1))
        .sum();

    let max_scroll = total_visual_lines.saturating_sub(area.height as usize);
    let actual_scroll = app.scroll_offset.min(max_scroll);
    app.scroll_offset = actual_scroll;

    let output = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((u16::try_from(actual_scroll).unwrap_or(u16::MAX), 0));

    frame.render_widget(output, area);
}

pub fn render_input_field(frame: &mut Frame, app: &App, area: Rect) {
    let (input_text, input_style) = if app.input_buffer.is_empty() {
        ("Type your prompt...", Style::default().fg(Color::Gray))
    } else {
        (
            app.input_buffer.as_str(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )
    };

    let border_color = if app.submit_enabled() {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let input = Paragraph::new(input_text)
        .style(input_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Prompt ")
                .border_style(Style::default().fg(border_color)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(input, area);
}
