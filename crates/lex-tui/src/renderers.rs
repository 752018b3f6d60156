//! Tool-output widgets.
//!
//! Each renderer receives the already-classified `output` value for one
//! tool message and turns it into transcript lines. The backend emits these
//! payloads in a handful of ad-hoc shapes (plain strings, a bracketed list
//! of quoted slots, a pseudo-JSON object inside a code fence with single
//! quotes); the extraction below reproduces that contract as-is and the
//! tests pin it. Unknown tools and unexpected shapes fall back to showing
//! the raw payload.

use std::sync::LazyLock;

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

static BRACKET_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*)\]").expect("hardcoded regex compiles"));

static FENCED_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(\{.*?\})```").expect("hardcoded regex compiles"));

fn chip_span(text: &str) -> Span<'static> {
    Span::styled(
        format!(" {text} "),
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )
}

fn chip(text: &str) -> Line<'static> {
    Line::from(chip_span(text))
}

fn label_value(label: &str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(Color::DarkGray)),
        Span::raw(value.to_string()),
    ])
}

/// The payload as display text: strings verbatim, anything else as JSON.
fn output_text(output: &Value) -> String {
    match output.as_str() {
        Some(text) => text.to_string(),
        None => output.to_string(),
    }
}

/// Renders one tool message as transcript lines.
pub fn tool_output_lines(tool: &str, output: &Value) -> Vec<Line<'static>> {
    match tool {
        "get_weather" => weather_lines(output),
        "get_dealership_address" => dealership_lines(output),
        "check_appointment_availability" => availability_lines(output),
        "schedule_appointment" => confirmation_lines(output),
        _ => fallback_lines(tool, output),
    }
}

fn weather_lines(output: &Value) -> Vec<Line<'static>> {
    vec![
        chip("Weather Information"),
        Line::from(vec![
            Span::styled("☀ ", Style::default().fg(Color::Yellow)),
            Span::raw(output_text(output)),
        ]),
    ]
}

fn dealership_lines(output: &Value) -> Vec<Line<'static>> {
    vec![
        chip("Dealership Information"),
        Line::from(vec![
            Span::styled("⌂ ", Style::default().fg(Color::Cyan)),
            Span::raw(output_text(output)),
        ]),
    ]
}

fn availability_lines(output: &Value) -> Vec<Line<'static>> {
    let slots = parse_time_slots(&output_text(output));
    let mut lines = vec![chip("Available Appointments")];
    if slots.is_empty() {
        lines.push(Line::from(Span::styled(
            "No available appointments",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        for slot in slots {
            lines.push(Line::from(vec![
                Span::styled("· ", Style::default().fg(Color::Cyan)),
                Span::raw(slot),
            ]));
        }
    }
    lines
}

fn confirmation_lines(output: &Value) -> Vec<Line<'static>> {
    let Some(details) = parse_appointment_confirmation(output) else {
        return fallback_lines("schedule_appointment", output);
    };

    let mut lines = vec![
        Line::from(vec![
            chip_span("Appointment Confirmed"),
            Span::styled(" ✓", Style::default().fg(Color::Green)),
        ]),
        label_value("Vehicle", &details.modelo),
        label_value(
            "Date",
            if details.fecha.is_empty() {
                "Not specified"
            } else {
                details.fecha.as_str()
            },
        ),
        label_value("Time", &details.hora),
        label_value("Confirmation Code", &details.confirmacion_id),
    ];
    if !details.mensaje.is_empty() {
        lines.push(Line::from(Span::styled(
            details.mensaje,
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn fallback_lines(tool: &str, output: &Value) -> Vec<Line<'static>> {
    vec![chip(tool), Line::from(Span::raw(output_text(output)))]
}

/// Extracts time slots from the bracketed-list payload, e.g.
/// `[ '10:00', '11:30' ]` → `["10:00", "11:30"]`.
pub(crate) fn parse_time_slots(raw: &str) -> Vec<String> {
    let Some(captures) = BRACKET_LIST.captures(raw) else {
        return Vec::new();
    };
    captures[1]
        .split(',')
        .map(|slot| {
            slot.chars()
                .filter(|c| *c != '\'' && *c != '"' && *c != '\\')
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|slot| !slot.is_empty())
        .collect()
}

/// Appointment confirmation fields (the backend uses Spanish field names).
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct AppointmentDetails {
    pub modelo: String,
    pub fecha: String,
    pub hora: String,
    pub confirmacion_id: String,
    pub mensaje: String,
}

/// Recovers the confirmation object from the payload.
///
/// The backend wraps a single-quoted pseudo-JSON object in a triple-backtick
/// fence; rewriting quotes makes it parseable. A payload that is already a
/// JSON object is accepted directly.
pub(crate) fn parse_appointment_confirmation(output: &Value) -> Option<AppointmentDetails> {
    if output.is_object() {
        return serde_json::from_value(output.clone()).ok();
    }

    let raw = output.as_str()?;
    let captures = FENCED_OBJECT.captures(raw)?;
    let candidate = captures[1].replace('\'', "\"");
    serde_json::from_str(&candidate).ok()
}
