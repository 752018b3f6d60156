//! Rendering. Reads state, never mutates it (scroll measurements go through
//! `Cell`s on `ScrollState`).

use lex_core::core::transcript::Message;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use unicode_width::UnicodeWidthStr;

use crate::renderers;
use crate::state::AppState;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn render(state: &AppState, frame: &mut Frame) {
    let [header, transcript, input, status] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(state, frame, header);
    render_transcript(state, frame, transcript);
    render_input(state, frame, input);
    render_status(state, frame, status);
}

fn spinner(state: &AppState) -> &'static str {
    SPINNER_FRAMES[state.spinner_frame % SPINNER_FRAMES.len()]
}

fn render_header(state: &AppState, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " Lex ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            " SuperCar Virtual Sales Assistant",
            Style::default().fg(Color::DarkGray),
        ),
    ];

    if let Some(tool) = state.engine.tool_in_use() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} using {}", spinner(state), tool.replace('_', " ")),
            Style::default().fg(Color::Yellow),
        ));
    } else if state.engine.is_busy() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} thinking", spinner(state)),
            Style::default().fg(Color::DarkGray),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_transcript(state: &AppState, frame: &mut Frame, area: Rect) {
    let lines = if state.engine.transcript().is_empty() {
        welcome_lines()
    } else {
        transcript_lines(state)
    };

    state.scroll.cached_line_count.set(lines.len());
    state.scroll.viewport_height.set(area.height as usize);

    let offset = state.scroll.offset() as u16;
    let paragraph = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    frame.render_widget(paragraph, area);
}

fn welcome_lines() -> Vec<Line<'static>> {
    vec![
        Line::default(),
        Line::from(Span::styled(
            "Welcome to SuperCar Assistant",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from("I'm Lex, your virtual sales assistant. How can I help you with"),
        Line::from("your SuperCar journey today?"),
        Line::default(),
        Line::from(Span::styled(
            "Try one of these:",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from("  \"What's the weather like in Miami today?\""),
        Line::from("  \"Can you show me the address of your dealership in New York?\""),
        Line::from("  \"I'd like to schedule a test drive for the new Model S.\""),
    ]
}

pub(crate) fn transcript_lines(state: &AppState) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for message in state.engine.transcript().messages() {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        match message {
            Message::User { content, .. } => {
                lines.push(Line::from(vec![
                    Span::styled(
                        "You ",
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(content.clone()),
                ]));
            }
            Message::Assistant {
                content,
                is_complete,
                ..
            } => {
                let mut first = true;
                for part in content.split('\n') {
                    if first {
                        lines.push(Line::from(vec![
                            Span::styled(
                                "Lex ",
                                Style::default()
                                    .fg(Color::Magenta)
                                    .add_modifier(Modifier::BOLD),
                            ),
                            Span::raw(part.to_string()),
                        ]));
                        first = false;
                    } else {
                        lines.push(Line::from(Span::raw(part.to_string())));
                    }
                }
                if !is_complete && state.engine.is_busy() {
                    if let Some(last) = lines.last_mut() {
                        last.spans.push(Span::styled(
                            format!(" {}", spinner(state)),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                }
            }
            Message::Tool { tool, content, .. } => {
                lines.push(Line::from(Span::styled(
                    "Lex used a tool to get information",
                    Style::default().fg(Color::DarkGray),
                )));
                lines.extend(renderers::tool_output_lines(tool, content));
            }
        }
    }

    lines
}

fn render_input(state: &AppState, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Type your message ");
    let inner = block.inner(area);

    frame.render_widget(
        Paragraph::new(state.input.text.as_str()).block(block),
        area,
    );

    let cursor_x = inner.x + state.input.text[..state.input.cursor].width() as u16;
    frame.set_cursor_position((cursor_x.min(inner.right().saturating_sub(1)), inner.y));
}

fn render_status(state: &AppState, frame: &mut Frame, area: Rect) {
    let line = if let Some(notice) = &state.notice {
        Line::from(Span::styled(
            format!(" {}", notice.text),
            Style::default().fg(Color::Red),
        ))
    } else {
        Line::from(Span::styled(
            " Enter send · Esc cancel/quit · ↑/↓ scroll",
            Style::default().fg(Color::DarkGray),
        ))
    };
    frame.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use lex_core::backend::{BackendClient, StreamEvent};
    use lex_core::core::events::TurnEvent;
    use serde_json::json;

    use super::*;

    fn state_with_turn() -> AppState {
        let mut state = AppState::new(BackendClient::new("http://localhost:8000"), None);
        state.engine.submit("weather in Miami?").unwrap();
        state
    }

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn transcript_lines_cover_all_roles() {
        let mut state = state_with_turn();
        state
            .engine
            .apply(TurnEvent::Event(StreamEvent::Chunk {
                text: "Let me check".to_string(),
            }));
        state
            .engine
            .apply(TurnEvent::Event(StreamEvent::ToolOutput {
                name: "get_weather".to_string(),
                output: json!("Sunny, 25C"),
            }));

        let lines = transcript_lines(&state);
        let text: Vec<String> = lines.iter().map(line_text).collect();

        assert!(text.iter().any(|l| l.contains("weather in Miami?")));
        assert!(text.iter().any(|l| l.contains("Let me check")));
        assert!(text.iter().any(|l| l.contains("Sunny, 25C")));
        assert!(text.iter().any(|l| l.contains("used a tool")));
    }

    #[test]
    fn streaming_assistant_line_shows_spinner() {
        let mut state = state_with_turn();
        state
            .engine
            .apply(TurnEvent::Event(StreamEvent::Chunk {
                text: "Hello".to_string(),
            }));

        let lines = transcript_lines(&state);
        let last = line_text(lines.last().unwrap());
        assert!(last.contains("Hello"));
        assert!(SPINNER_FRAMES.iter().any(|f| last.contains(f)));
    }

    #[test]
    fn completed_assistant_line_has_no_spinner() {
        let mut state = state_with_turn();
        state
            .engine
            .apply(TurnEvent::Event(StreamEvent::Chunk {
                text: "Hello".to_string(),
            }));
        state.engine.apply(TurnEvent::Event(StreamEvent::End));

        let lines = transcript_lines(&state);
        let last = line_text(lines.last().unwrap());
        assert_eq!(last, "Lex Hello");
    }
}
