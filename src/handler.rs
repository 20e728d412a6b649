use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, Field};
use crate::tui::AppEvent;

const PAGE_SCROLL: u16 = 10;
const WHEEL_SCROLL: u16 = 3;

pub async fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }

    app.collect_finished().await;
}

pub fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // An open alert blocks everything until dismissed
    if app.current_alert().is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.dismiss_alert();
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Tab => app.focus_next(),
        KeyCode::BackTab => app.focus_prev(),
        KeyCode::Enter => handle_enter(app),

        KeyCode::PageUp => app.scroll_up(PAGE_SCROLL),
        KeyCode::PageDown => app.scroll_down(PAGE_SCROLL),
        KeyCode::End if key.modifiers.contains(KeyModifiers::CONTROL) => app.scroll_to_bottom(),

        KeyCode::Backspace => app.focused_input().backspace(),
        KeyCode::Delete => app.focused_input().delete(),
        KeyCode::Left => app.focused_input().left(),
        KeyCode::Right => app.focused_input().right(),
        KeyCode::Home => app.focused_input().home(),
        KeyCode::End => app.focused_input().end(),
        KeyCode::Char(c) => app.focused_input().insert(c),
        _ => {}
    }
}

/// Enter moves from a username field to its password field; on a password
/// field it submits the form, and in the chat input it sends.
fn handle_enter(app: &mut App) {
    match app.focus {
        Field::LoginUsername => app.focus = Field::LoginPassword,
        Field::RegisterUsername => app.focus = Field::RegisterPassword,
        Field::LoginPassword => app.submit_login(),
        Field::RegisterPassword => app.submit_registration(),
        Field::UserInput => app.send_chat(),
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if !app.show_chat {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(WHEEL_SCROLL),
        MouseEventKind::ScrollDown => app.scroll_down(WHEEL_SCROLL),
        _ => {}
    }
}
