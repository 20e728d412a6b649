use std::collections::VecDeque;

use tokio::task::JoinHandle;

use crate::bridge::{ids, FormBridge, Outcome, Page, Pending, SubmitEvent};

/// Input fields, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    LoginUsername,
    LoginPassword,
    RegisterUsername,
    RegisterPassword,
    UserInput,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::LoginUsername,
        Field::LoginPassword,
        Field::RegisterUsername,
        Field::RegisterPassword,
        Field::UserInput,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Field::LoginUsername => ids::LOGIN_USERNAME,
            Field::LoginPassword => ids::LOGIN_PASSWORD,
            Field::RegisterUsername => ids::REGISTER_USERNAME,
            Field::RegisterPassword => ids::REGISTER_PASSWORD,
            Field::UserInput => ids::USER_INPUT,
        }
    }

    pub fn from_id(id: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.id() == id)
    }

    /// The panel the field lives in.
    pub fn panel(self) -> &'static str {
        match self {
            Field::LoginUsername | Field::LoginPassword => ids::LOGIN,
            Field::RegisterUsername | Field::RegisterPassword => ids::REGISTRATION,
            Field::UserInput => ids::CHAT_CONTAINER,
        }
    }

    pub fn is_secret(self) -> bool {
        matches!(self, Field::LoginPassword | Field::RegisterPassword)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line text input with a character cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub value: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn set(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }
}

pub struct App {
    pub should_quit: bool,
    pub focus: Field,
    inputs: [TextInput; 5],

    // Panels
    pub show_login: bool,
    pub show_registration: bool,
    pub show_chat: bool,

    // Chat transcript
    pub transcript: Vec<String>,
    pub transcript_scroll: u16,
    pub follow_transcript: bool,

    /// Blocking alerts; the front one is on screen.
    pub alerts: VecDeque<String>,

    /// Requests in flight, applied once finished.
    pub pending: Vec<JoinHandle<Outcome>>,

    pub animation_frame: usize,
    pub server_url: String,
    bridge: FormBridge,
}

impl App {
    pub fn new(bridge: FormBridge, server_url: &str) -> Self {
        Self {
            should_quit: false,
            focus: Field::LoginUsername,
            inputs: Default::default(),

            show_login: true,
            show_registration: true,
            show_chat: false,

            transcript: Vec::new(),
            transcript_scroll: 0,
            follow_transcript: true,

            alerts: VecDeque::new(),
            pending: Vec::new(),

            animation_frame: 0,
            server_url: server_url.to_string(),
            bridge,
        }
    }

    pub fn input(&self, field: Field) -> &TextInput {
        &self.inputs[field.index()]
    }

    pub fn focused_input(&mut self) -> &mut TextInput {
        &mut self.inputs[self.focus.index()]
    }

    pub fn is_panel_visible(&self, panel: &str) -> bool {
        match panel {
            ids::LOGIN => self.show_login,
            ids::REGISTRATION => self.show_registration,
            ids::CHAT_CONTAINER => self.show_chat,
            _ => false,
        }
    }

    /// Fields whose panel is currently shown, in tab order.
    pub fn visible_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.is_panel_visible(f.panel()))
            .collect()
    }

    pub fn focus_next(&mut self) {
        self.cycle_focus(1);
    }

    pub fn focus_prev(&mut self) {
        self.cycle_focus(-1);
    }

    fn cycle_focus(&mut self, step: isize) {
        let fields = self.visible_fields();
        if fields.is_empty() {
            return;
        }
        let len = fields.len() as isize;
        let current = fields.iter().position(|f| *f == self.focus).unwrap_or(0) as isize;
        let next = (current + step).rem_euclid(len);
        self.focus = fields[next as usize];
    }

    /// Keep focus on a visible panel after visibility changes.
    fn ensure_focus_visible(&mut self) {
        if !self.is_panel_visible(self.focus.panel()) {
            if let Some(first) = self.visible_fields().first() {
                self.focus = *first;
            }
        }
    }

    pub fn current_alert(&self) -> Option<&str> {
        self.alerts.front().map(String::as_str)
    }

    pub fn dismiss_alert(&mut self) {
        self.alerts.pop_front();
    }

    pub fn is_busy(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn send_chat(&mut self) {
        let bridge = self.bridge.clone();
        if let Some(pending) = bridge.send_chat_message(self) {
            self.track(pending);
        }
    }

    pub fn submit_login(&mut self) {
        let bridge = self.bridge.clone();
        let mut event = SubmitEvent::new();
        let pending = bridge.submit_login(self, &mut event);
        self.finish_submit(ids::LOGIN_FORM, &event);
        self.track(pending);
    }

    pub fn submit_registration(&mut self) {
        let bridge = self.bridge.clone();
        let mut event = SubmitEvent::new();
        let pending = bridge.submit_registration(self, &mut event);
        self.finish_submit(ids::REGISTER_FORM, &event);
        self.track(pending);
    }

    /// A submit nobody prevented clears its form, as a page reload would.
    fn finish_submit(&mut self, form_id: &str, event: &SubmitEvent) {
        if !event.default_prevented() {
            self.reset_form(form_id);
        }
    }

    fn track(&mut self, pending: Pending) {
        self.pending.push(tokio::spawn(pending));
    }

    /// Apply the outcome of every request that has finished.
    pub async fn collect_finished(&mut self) {
        let handles = std::mem::take(&mut self.pending);
        for handle in handles {
            if !handle.is_finished() {
                self.pending.push(handle);
                continue;
            }
            match handle.await {
                Ok(outcome) => outcome.apply(self),
                Err(e) => tracing::error!("request task failed: {}", e),
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 4;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_transcript = false;
        self.transcript_scroll = self.transcript_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.transcript_scroll = self.transcript_scroll.saturating_add(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_transcript = true;
    }
}

impl Page for App {
    fn value(&self, id: &str) -> String {
        Field::from_id(id)
            .map(|f| self.input(f).value.clone())
            .unwrap_or_default()
    }

    fn set_value(&mut self, id: &str, value: &str) {
        if let Some(field) = Field::from_id(id) {
            self.inputs[field.index()].set(value);
        }
    }

    fn append_line(&mut self, id: &str, line: &str) {
        if id == ids::CHAT {
            self.transcript.push(line.to_string());
            self.follow_transcript = true;
        }
    }

    fn reset_form(&mut self, form_id: &str) {
        for id in ids::form_fields(form_id) {
            if let Some(field) = Field::from_id(id) {
                self.inputs[field.index()].clear();
            }
        }
    }

    fn set_visible(&mut self, id: &str, visible: bool) {
        match id {
            ids::LOGIN => self.show_login = visible,
            ids::REGISTRATION => self.show_registration = visible,
            ids::CHAT_CONTAINER => self.show_chat = visible,
            _ => return,
        }
        self.ensure_focus_visible();
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push_back(message.to_string());
    }
}
