//! Application state for the chat TUI.

use std::cell::Cell;
use std::time::{Duration, Instant};

use lex_core::backend::BackendClient;
use lex_core::core::chat::ChatEngine;
use lex_core::core::events::TurnEventRx;
use tokio_util::sync::CancellationToken;

/// Handle to the spawned read-loop task of the active turn.
#[derive(Debug)]
pub struct TurnTask {
    /// Receiver for turn events.
    pub rx: TurnEventRx,
    /// Cancels the read loop and releases the connection.
    pub cancel: CancellationToken,
}

/// A transient, user-visible notification (errors, busy rejections).
#[derive(Debug)]
pub struct Notice {
    pub text: String,
    pub raised_at: Instant,
}

/// Single-line input state.
#[derive(Debug, Default)]
pub struct InputState {
    pub text: String,
    /// Byte offset of the cursor within `text`, always on a char boundary.
    pub cursor: usize,
}

impl InputState {
    pub fn insert(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn backspace(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.text.remove(prev);
            self.cursor = prev;
        }
    }

    pub fn move_left(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.cursor = prev;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(c) = self.text[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.len();
    }

    /// Clears the input, returning its contents.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.text[..self.cursor].char_indices().last().map(|(i, _)| i)
    }
}

/// Scroll mode for the transcript.
#[derive(Debug, Clone, Copy)]
pub enum ScrollMode {
    /// Auto-scroll to show latest content.
    FollowLatest,
    /// User scrolled manually; offset is line index from top.
    Anchored { offset: usize },
}

/// Scroll state for the transcript pane.
///
/// Line count and viewport height are measured during render and cached via
/// `Cell` so the reducer can do scroll math without re-measuring.
#[derive(Debug)]
pub struct ScrollState {
    pub mode: ScrollMode,
    pub cached_line_count: Cell<usize>,
    pub viewport_height: Cell<usize>,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            mode: ScrollMode::FollowLatest,
            cached_line_count: Cell::new(0),
            viewport_height: Cell::new(0),
        }
    }
}

impl ScrollState {
    pub fn is_following(&self) -> bool {
        matches!(self.mode, ScrollMode::FollowLatest)
    }

    /// Current scroll offset for rendering.
    pub fn offset(&self) -> usize {
        let viewport = self.viewport_height.get();
        let max_offset = self.cached_line_count.get().saturating_sub(viewport);
        match self.mode {
            ScrollMode::FollowLatest => max_offset,
            ScrollMode::Anchored { offset } => offset.min(max_offset),
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        let offset = self.offset().saturating_sub(lines);
        self.mode = ScrollMode::Anchored { offset };
    }

    /// Scrolls down, re-entering follow mode at the bottom.
    pub fn scroll_down(&mut self, lines: usize) {
        if self.is_following() {
            return;
        }
        let max_offset = self
            .cached_line_count
            .get()
            .saturating_sub(self.viewport_height.get());
        let offset = (self.offset() + lines).min(max_offset);
        self.mode = if offset >= max_offset {
            ScrollMode::FollowLatest
        } else {
            ScrollMode::Anchored { offset }
        };
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.viewport_height.get().max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.viewport_height.get().max(1));
    }

    pub fn scroll_to_bottom(&mut self) {
        self.mode = ScrollMode::FollowLatest;
    }
}

/// How long a notice stays on screen.
pub const NOTICE_TTL: Duration = Duration::from_secs(5);

/// Top-level TUI state.
pub struct AppState {
    pub should_quit: bool,
    pub engine: ChatEngine,
    pub client: BackendClient,
    pub idle_timeout: Option<Duration>,
    pub turn_task: Option<TurnTask>,
    pub input: InputState,
    pub scroll: ScrollState,
    pub notice: Option<Notice>,
    pub spinner_frame: usize,
}

impl AppState {
    pub fn new(client: BackendClient, idle_timeout: Option<Duration>) -> Self {
        Self {
            should_quit: false,
            engine: ChatEngine::new(),
            client,
            idle_timeout,
            turn_task: None,
            input: InputState::default(),
            scroll: ScrollState::default(),
            notice: None,
            spinner_frame: 0,
        }
    }

    pub fn set_notice(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            raised_at: Instant::now(),
        });
    }

    /// Expires a stale notice; called on tick.
    pub fn expire_notice(&mut self) {
        if let Some(notice) = &self.notice
            && notice.raised_at.elapsed() > NOTICE_TTL
        {
            self.notice = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_cursor_stays_on_char_boundaries() {
        let mut input = InputState::default();
        for c in "ab👋c".chars() {
            input.insert(c);
        }
        input.move_left();
        input.move_left();
        input.backspace(); // removes the emoji
        assert_eq!(input.text, "abc");
        assert_eq!(input.cursor, 2);

        input.move_end();
        assert_eq!(input.cursor, 3);
        input.move_home();
        assert_eq!(input.cursor, 0);
    }

    #[test]
    fn take_clears_input() {
        let mut input = InputState::default();
        for c in "hello".chars() {
            input.insert(c);
        }
        assert_eq!(input.take(), "hello");
        assert_eq!(input.text, "");
        assert_eq!(input.cursor, 0);
    }

    #[test]
    fn scroll_follows_latest_until_anchored() {
        let scroll = ScrollState::default();
        scroll.cached_line_count.set(100);
        scroll.viewport_height.set(10);
        assert_eq!(scroll.offset(), 90);

        let mut scroll = scroll;
        scroll.scroll_up(5);
        assert_eq!(scroll.offset(), 85);
        assert!(!scroll.is_following());

        scroll.scroll_down(5);
        assert!(scroll.is_following());
        assert_eq!(scroll.offset(), 90);
    }
}
