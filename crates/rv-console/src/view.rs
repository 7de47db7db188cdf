use crate::app::App;
use chrono::{DateTime, Local, TimeZone, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use rv_console::ConnectionState;
use rv_core::{Alert, Message};

const PROGRESS_BAR_WIDTH: usize = 20;

#[derive(Clone, Copy, Debug)]
struct Theme {
    bg: Color,
    surface: Color,
    border: Color,
    title: Color,
    text: Color,
    muted: Color,
    accent: Color,
    ok: Color,
    warn: Color,
    critical: Color,
}

fn theme() -> Theme {
    Theme {
        bg: Color::Rgb(11, 18, 32),
        surface: Color::Rgb(17, 26, 46),
        border: Color::Rgb(71, 85, 105),
        title: Color::Rgb(191, 219, 254),
        text: Color::Rgb(226, 232, 240),
        muted: Color::Rgb(148, 163, 184),
        accent: Color::Rgb(56, 189, 248),
        ok: Color::Rgb(34, 197, 94),
        warn: Color::Rgb(245, 158, 11),
        critical: Color::Rgb(239, 68, 68),
    }
}

pub fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    let size = frame.size();
    let theme = theme();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(size);
    frame.render_widget(render_header(app, theme), rows[0]);
    frame.render_widget(render_kpis(app, theme), rows[1]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[2]);
    let feed = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(columns[0]);
    frame.render_widget(render_progress(app, theme), feed[0]);
    frame.render_widget(render_alerts(app, theme), feed[1]);

    let link = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(columns[1]);
    frame.render_widget(render_messages(app, theme, link[0]), link[0]);
    frame.render_widget(render_input(app, theme), link[1]);
}

fn panel(title: &str, theme: Theme, bg: Color) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(bg))
        .title(Span::styled(
            title.to_string(),
            Style::default()
                .fg(theme.title)
                .add_modifier(Modifier::BOLD),
        ))
}

fn liveness_color(state: ConnectionState, theme: Theme) -> Color {
    match state {
        ConnectionState::Open => theme.ok,
        ConnectionState::Connecting => theme.accent,
        ConnectionState::Reconnecting { .. } => theme.warn,
        ConnectionState::Closed => theme.critical,
    }
}

fn render_header(app: &App, theme: Theme) -> Paragraph<'static> {
    let state = app.link.state();
    let updated = app
        .feed
        .last_update
        .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "waiting".to_string());
    let status_line = Line::from(vec![
        Span::styled(
            format!(" {} ", state.label()),
            Style::default()
                .fg(theme.bg)
                .bg(liveness_color(state, theme))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  Operator: {}  Feed: {updated}", app.link.user()),
            Style::default().fg(theme.text),
        ),
    ]);
    let note = app
        .status_note
        .clone()
        .unwrap_or_else(|| "Enter send, Esc quit".to_string());
    let note_color = if app.status_note.is_some() {
        theme.warn
    } else {
        theme.muted
    };

    Paragraph::new(Text::from(vec![
        status_line,
        Line::from(Span::styled(note, Style::default().fg(note_color))),
    ]))
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(panel("Sentinel Command", theme, theme.bg))
}

fn render_kpis(app: &App, theme: Theme) -> Paragraph<'static> {
    let fields = match &app.feed.status {
        Some(status) => vec![
            format!("UAVs: {}/{} Active", status.active_uavs, status.total_uavs),
            format!("Mapping: {:.1}%", status.mapping_percent()),
            format!("Critical Alerts: {}", app.feed.alerts.len()),
            format!("Failed Polls: {}", app.feed.failed_cycles),
        ],
        None => vec!["Awaiting swarm telemetry".to_string()],
    };
    Paragraph::new(Line::from(Span::styled(
        fields.join("  |  "),
        Style::default().fg(theme.text),
    )))
    .style(Style::default().fg(theme.text).bg(theme.surface))
    .block(panel("Swarm", theme, theme.surface))
}

fn render_progress(app: &App, theme: Theme) -> Paragraph<'static> {
    let lines: Vec<Line<'static>> = match &app.feed.status {
        Some(status) if !status.lga_progress.is_empty() => status
            .lga_progress
            .iter()
            .map(|(lga, percent)| {
                Line::from(vec![
                    Span::styled(format!("{lga:<16}"), Style::default().fg(theme.text)),
                    Span::styled(
                        progress_bar(*percent / 100.0, PROGRESS_BAR_WIDTH),
                        Style::default().fg(theme.accent),
                    ),
                    Span::styled(
                        format!(" {percent:>5.1}%"),
                        Style::default().fg(theme.muted),
                    ),
                ])
            })
            .collect(),
        _ => vec![Line::from(Span::styled(
            "no LGA progress reported",
            Style::default().fg(theme.muted),
        ))],
    };
    Paragraph::new(Text::from(lines))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel("LGA Mapping", theme, theme.surface))
}

fn render_alerts(app: &App, theme: Theme) -> Paragraph<'static> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    for alert in &app.feed.alerts {
        lines.extend(alert_lines(alert, theme));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "no critical alerts",
            Style::default().fg(theme.muted),
        )));
    }
    Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel("Critical Alerts", theme, theme.surface))
}

fn alert_lines(alert: &Alert, theme: Theme) -> Vec<Line<'static>> {
    let severity = alert.severity.as_deref().unwrap_or("CRITICAL").to_string();
    vec![
        Line::from(vec![
            Span::styled(
                format!("[{severity}] "),
                Style::default()
                    .fg(theme.critical)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("{} ", alert.lga),
                Style::default().fg(theme.title),
            ),
            Span::styled(
                format_epoch(alert.timestamp),
                Style::default().fg(theme.muted),
            ),
        ]),
        Line::from(Span::styled(
            format!("  {}", alert.issue),
            Style::default().fg(theme.text),
        )),
        Line::from(Span::styled(
            format!("  -> {}", alert.recommended_action),
            Style::default().fg(theme.warn),
        )),
    ]
}

fn render_messages(app: &App, theme: Theme, area: Rect) -> Paragraph<'static> {
    let visible = area.height.saturating_sub(2) as usize;
    let messages = app.link.messages();
    let start = messages.len().saturating_sub(visible);
    let lines: Vec<Line<'static>> = messages[start..]
        .iter()
        .map(|message| message_line(message, theme))
        .collect();
    Paragraph::new(Text::from(lines))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel("Command Link", theme, theme.surface))
}

fn message_line(message: &Message, theme: Theme) -> Line<'static> {
    let stamp = Span::styled(
        format!("{} ", format_timestamp(&message.timestamp)),
        Style::default().fg(theme.muted),
    );
    if message.is_system() {
        return Line::from(vec![
            stamp,
            Span::styled(
                format!("** {}", message.message),
                Style::default()
                    .fg(theme.warn)
                    .add_modifier(Modifier::ITALIC),
            ),
        ]);
    }
    Line::from(vec![
        stamp,
        Span::styled(
            format!("{}: ", message.user),
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(message.message.clone(), Style::default().fg(theme.text)),
    ])
}

fn render_input(app: &App, theme: Theme) -> Paragraph<'static> {
    let color = if app.link.state() == ConnectionState::Open {
        theme.text
    } else {
        theme.muted
    };
    Paragraph::new(Line::from(vec![
        Span::styled("> ", Style::default().fg(theme.accent)),
        Span::styled(app.link.input().to_string(), Style::default().fg(color)),
    ]))
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(panel("Transmit", theme, theme.bg))
}

/// Renders an RFC 3339 store timestamp as local wall-clock time. Anything
/// else is shown as received.
fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => at.with_timezone(&Local).format("%H:%M:%S").to_string(),
        Err(_) => raw.to_string(),
    }
}

fn format_epoch(seconds: f64) -> String {
    let millis = (seconds * 1000.0) as i64;
    match Utc.timestamp_millis_opt(millis).single() {
        Some(at) => at.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
}
