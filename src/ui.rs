use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, Field};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let show_forms = app.show_login || app.show_registration;
    match (show_forms, app.show_chat) {
        (true, true) => {
            let [forms_area, chat_area] =
                Layout::vertical([Constraint::Length(6), Constraint::Min(0)]).areas(body_area);
            render_forms(app, frame, forms_area);
            render_chat(app, frame, chat_area);
        }
        (true, false) => {
            let [forms_area, _] =
                Layout::vertical([Constraint::Length(6), Constraint::Min(0)]).areas(body_area);
            render_forms(app, frame, forms_area);
        }
        (false, true) => render_chat(app, frame, body_area),
        (false, false) => {}
    }

    render_footer(app, frame, footer_area);

    if let Some(message) = app.current_alert() {
        render_alert(message, app.alerts.len(), frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Food Order Chatbot ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.server_url.clone(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = if app.current_alert().is_some() {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" dismiss ", label_style),
        ]
    } else {
        let mut hints = vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" next field ", label_style),
        ];
        let enter_label = match app.focus {
            Field::LoginUsername | Field::RegisterUsername => " next ",
            Field::LoginPassword => " log in ",
            Field::RegisterPassword => " register ",
            Field::UserInput => " send ",
        };
        hints.extend(vec![
            Span::styled(" Enter ", key_style),
            Span::styled(enter_label, label_style),
        ]);
        if app.show_chat {
            hints.extend(vec![
                Span::styled(" PgUp/PgDn ", key_style),
                Span::styled(" scroll ", label_style),
            ]);
        }
        hints.extend(vec![
            Span::styled(" Esc ", key_style),
            Span::styled(" quit ", label_style),
        ]);
        hints
    };

    if app.is_busy() {
        hints.push(Span::styled(
            format!(" {} waiting for server ({}) ", SPINNER[app.animation_frame], app.pending.len()),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_forms(app: &App, frame: &mut Frame, area: Rect) {
    let panels: Vec<(&str, [Field; 2])> = [
        (app.show_login, " Login ", [Field::LoginUsername, Field::LoginPassword]),
        (
            app.show_registration,
            " Register ",
            [Field::RegisterUsername, Field::RegisterPassword],
        ),
    ]
    .into_iter()
    .filter(|(visible, _, _)| *visible)
    .map(|(_, title, fields)| (title, fields))
    .collect();

    if panels.is_empty() {
        return;
    }

    let constraints = vec![Constraint::Ratio(1, panels.len() as u32); panels.len()];
    let areas = Layout::horizontal(constraints).split(area);

    for ((title, fields), panel_area) in panels.into_iter().zip(areas.iter()) {
        let focused = fields.contains(&app.focus);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style(focused))
            .title(title);
        let inner = block.inner(*panel_area);
        frame.render_widget(block, *panel_area);

        let labels = ["Username", "Password"];
        for (row, (field, label)) in fields.iter().zip(labels).enumerate() {
            let row_area = Rect::new(inner.x, inner.y + row as u16 * 2, inner.width, 1);
            if row_area.y >= inner.y + inner.height {
                break;
            }
            render_field(app, frame, row_area, *field, label);
        }
    }
}

fn render_field(app: &App, frame: &mut Frame, area: Rect, field: Field, label: &str) {
    let input = app.input(field);
    let shown = if field.is_secret() {
        "*".repeat(input.value.chars().count())
    } else {
        input.value.clone()
    };

    let label_text = format!("{:>9}: ", label);
    let label_width = label_text.chars().count() as u16;
    let value_style = if app.focus == field {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let line = Line::from(vec![
        Span::styled(label_text, Style::default().fg(Color::Gray)),
        Span::styled(shown, value_style),
    ]);
    frame.render_widget(Paragraph::new(line), area);

    if app.focus == field && app.current_alert().is_none() {
        let cursor_x = cursor_column(label_width, input.cursor, area.width);
        frame.set_cursor_position((area.x + cursor_x, area.y));
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [transcript_area, input_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).areas(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(false))
        .title(" Chat ");
    let inner = block.inner(transcript_area);

    let lines: Vec<Line> = app
        .transcript
        .iter()
        .flat_map(|entry| transcript_lines(entry))
        .collect();

    // Keep the newest line in view unless the user scrolled up
    let total = wrapped_height(&app.transcript, inner.width);
    let max_scroll = total.saturating_sub(inner.height);
    if app.follow_transcript || app.transcript_scroll >= max_scroll {
        app.transcript_scroll = max_scroll;
        app.follow_transcript = true;
    }

    let transcript = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.transcript_scroll, 0));
    frame.render_widget(transcript, transcript_area);

    let focused = app.focus == Field::UserInput;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(focused))
        .title(" Message ");
    let input_inner = input_block.inner(input_area);
    let input = app.input(Field::UserInput);
    frame.render_widget(
        Paragraph::new(input.value.clone()).block(input_block),
        input_area,
    );

    if focused && app.current_alert().is_none() {
        let cursor_x = cursor_column(0, input.cursor, input_inner.width);
        frame.set_cursor_position((input_inner.x + cursor_x, input_inner.y));
    }
}

/// Style the speaker prefix of a transcript entry.
fn transcript_lines(entry: &str) -> Vec<Line<'static>> {
    let (speaker, rest, color) = if let Some(rest) = entry.strip_prefix("You: ") {
        ("You: ", rest, Color::Green)
    } else if let Some(rest) = entry.strip_prefix("Bot: ") {
        ("Bot: ", rest, Color::Magenta)
    } else {
        ("", entry, Color::Reset)
    };

    // Menu replies span several lines
    rest.lines()
        .enumerate()
        .map(|(i, text)| {
            let prefix = if i == 0 { speaker } else { "     " };
            Line::from(vec![
                Span::styled(
                    prefix.to_string(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(text.to_string()),
            ])
        })
        .collect()
}

fn wrapped_height(entries: &[String], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let mut total: u16 = 0;
    for entry in entries {
        for line in entry.lines() {
            // Continuation lines carry the same 5-column indent as the prefix
            let chars = line.chars().count() + 5;
            total = total.saturating_add(chars.div_ceil(width).max(1) as u16);
        }
    }
    total
}

/// Column of a text cursor `cursor` chars past `offset`, clamped to `width`.
fn cursor_column(offset: u16, cursor: usize, width: u16) -> u16 {
    let cursor = u16::try_from(cursor).unwrap_or(u16::MAX);
    offset.saturating_add(cursor).min(width.saturating_sub(1))
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn render_alert(message: &str, queued: usize, frame: &mut Frame, area: Rect) {
    let popup_width = 60.min(area.width.saturating_sub(4));
    let text_width = popup_width.saturating_sub(4).max(1) as usize;
    let text_lines = (message.chars().count().div_ceil(text_width)).max(1) as u16;
    let popup_height = (text_lines + 4).min(area.height);

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let title = if queued > 1 {
        format!(" Alert (1 of {}) ", queued)
    } else {
        " Alert ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);

    let text = Text::from(vec![
        Line::from(message.to_string()),
        Line::default(),
        Line::from(Span::styled(
            "Press Enter to dismiss",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let popup = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(popup, popup_area);
}
