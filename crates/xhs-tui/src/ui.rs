//! Rendering functions for the TUI layout.
//!
//! The layout consists of vertically stacked areas:
//!
//! 1. **Header** (1 line) -- session id, connection status, key hints.
//! 2. **Tasks** (only while cards exist) -- one progress gauge per task.
//! 3. **Messages** (fills remaining space) -- scrollable chat history,
//!    with the visualization panel docked on the right while expanded.
//! 4. **Input** (grows with the number of lines typed) -- bordered field.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};

use xhs_client::viz::opinion::truncate_label;
use xhs_client::viz::{ChartKind, Dataset};
use xhs_client::{ChatMessage, ConnectionState, Role, TaskState, VisualizationPanel};

use crate::app::TuiApp;

/// Most task gauges shown at once.
const MAX_TASK_ROWS: u16 = 4;
/// Tallest the input box grows, borders included.
const MAX_INPUT_HEIGHT: u16 = 8;
/// Words listed from the word cloud.
const TOP_WORDS: usize = 10;
/// Width of a text bar in the controversy list.
const BAR_WIDTH: usize = 20;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Draw the entire TUI frame.
pub fn draw(frame: &mut Frame, app: &TuiApp) {
    let task_rows = (app.app().tasks.len() as u16).min(MAX_TASK_ROWS);
    let task_height = if task_rows == 0 { 0 } else { task_rows + 2 };
    let input_lines = app.input().split('\n').count() as u16;
    let input_height = (input_lines + 2).min(MAX_INPUT_HEIGHT);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),            // header
            Constraint::Length(task_height),  // tasks
            Constraint::Min(1),               // messages
            Constraint::Length(input_height), // input
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);
    if task_rows > 0 {
        draw_tasks(frame, app, chunks[1]);
    }

    if app.app().viz.is_expanded() {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[2]);
        draw_messages(frame, app, body[0]);
        draw_visualization(frame, &app.app().viz, body[1]);
    } else {
        draw_messages(frame, app, chunks[2]);
    }

    draw_input(frame, app, chunks[3]);
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn connection_style(state: ConnectionState) -> Style {
    match state {
        ConnectionState::Open => Style::default().fg(Color::Green),
        ConnectionState::Connecting { .. } | ConnectionState::Retrying { .. } => {
            Style::default().fg(Color::Yellow)
        }
        ConnectionState::Exhausted | ConnectionState::Stopped => Style::default().fg(Color::Red),
    }
}

/// Draw the header bar showing the session, connection, and key hints.
fn draw_header(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let connection = app.app().connection();
    let mut spans = vec![
        Span::styled(
            " XHS Assistant ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("| Session: {} | ", app.app().client_id())),
        Span::styled(format!(" {connection} "), connection_style(connection)),
    ];
    if app.is_busy() {
        spans.push(Span::styled(" Working... ", Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::raw(format!(
        "| Tab charts {} | Esc to quit ",
        app.app().viz.toggle_glyph()
    )));

    let header_widget =
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header_widget, area);
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

fn gauge_color(state: &TaskState) -> Color {
    match state {
        TaskState::Completed => Color::Green,
        TaskState::Failed | TaskState::Cancelled => Color::Red,
        TaskState::WaitingUserInput | TaskState::WaitingBrowser | TaskState::Paused => {
            Color::Yellow
        }
        _ => Color::Cyan,
    }
}

fn draw_tasks(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Tasks (Alt+x cancel) ")
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let cards = app.app().tasks.cards();
    let shown = cards.len().min(MAX_TASK_ROWS as usize);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(1); shown])
        .split(inner);

    // Newest cards are at the end; show those.
    for (card, row) in cards[cards.len() - shown..].iter().zip(rows.iter()) {
        let pct = card.progress_percent();
        let task = &card.task;
        let mut label = format!(
            "{} {} [{}] {:.0}%",
            task.task_id,
            task.keywords,
            task.state.as_str(),
            pct
        );
        if let Some(message) = task.last_message.as_deref().filter(|m| !m.is_empty()) {
            label.push_str(" - ");
            label.push_str(message);
        }
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(gauge_color(&task.state)))
            .ratio(pct / 100.0)
            .label(label);
        frame.render_widget(gauge, *row);
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

fn role_prefix(role: Role) -> (&'static str, Style) {
    match role {
        Role::User => ("[You] ", Style::default().fg(Color::Cyan)),
        Role::Ai => ("[AI]  ", Style::default().fg(Color::Green)),
    }
}

/// Transcript lines for one bubble, prefix on the first line only.
fn message_lines(message: &ChatMessage) -> Vec<Line<'static>> {
    let (prefix, style) = role_prefix(message.role);
    let indent = " ".repeat(prefix.len());
    message
        .plain_text()
        .split('\n')
        .enumerate()
        .map(|(i, text)| {
            let lead = if i == 0 {
                Span::styled(prefix, style)
            } else {
                Span::raw(indent.clone())
            };
            Line::from(vec![lead, Span::styled(text.to_owned(), style)])
        })
        .collect()
}

/// Draw the scrollable messages area.
fn draw_messages(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let chat = &app.app().chat;
    let prompt = app.active_prompt();
    let mut lines: Vec<Line<'_>> = Vec::new();

    for message in chat.messages() {
        lines.extend(message_lines(message));

        // Key hints go under the bubble the Alt keys act on.
        if prompt.is_some_and(|p| std::ptr::eq(p, message)) {
            let hints: Vec<Span<'_>> = message
                .actions
                .iter()
                .enumerate()
                .take(9)
                .map(|(i, action)| {
                    Span::styled(
                        format!("  [Alt+{}] {}", i + 1, action.label()),
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    )
                })
                .collect();
            lines.push(Line::from(hints));
        }

        lines.push(Line::from(""));
    }

    let total_lines = lines.len() as u16;
    let visible_height = area.height.saturating_sub(2); // account for borders
    let max_scroll = total_lines.saturating_sub(visible_height);
    let effective_scroll = max_scroll.saturating_sub(chat.scroll_offset());

    let messages_block = Block::default()
        .borders(Borders::ALL)
        .title(" Chat ")
        .border_style(Style::default().fg(Color::DarkGray));

    let messages_widget = Paragraph::new(lines)
        .block(messages_block)
        .wrap(Wrap { trim: false })
        .scroll((effective_scroll, 0));

    frame.render_widget(messages_widget, area);
}

// ---------------------------------------------------------------------------
// Visualization
// ---------------------------------------------------------------------------

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_owned(),
        Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
    ))
}

fn text_bar(pct: f64) -> String {
    let filled = ((pct / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// The panel's charts flattened to text lines.
pub fn visualization_lines(viz: &VisualizationPanel) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for kind in ChartKind::ALL {
        let Some(dataset) = viz.chart(kind).and_then(|c| c.dataset()) else {
            continue;
        };
        match dataset {
            Dataset::WordCloud(data) => {
                lines.push(heading(data.title()));
                for word in data.ranked().into_iter().take(TOP_WORDS) {
                    lines.push(Line::from(format!("  {} ({})", word.text, word.weight)));
                }
            }
            Dataset::Opinion(data) => {
                lines.push(heading(data.title()));
                for opinion in &data.data {
                    lines.push(Line::from(format!(
                        "  {} support {:.0}% confidence {:.0}%",
                        truncate_label(&opinion.content),
                        opinion.support_level,
                        opinion.confidence
                    )));
                }
            }
            Dataset::Controversy(data) => {
                lines.push(heading(data.title()));
                for topic in &data.data {
                    lines.push(Line::from(format!("  {}", topic.topic)));
                    lines.push(Line::from(format!(
                        "  {} {:.0}/{:.0}",
                        text_bar(topic.support()),
                        topic.support(),
                        topic.opposition()
                    )));
                }
            }
        }
        lines.push(Line::from(""));
    }

    let insights = viz.minority_insights();
    if !insights.is_empty() {
        lines.push(heading("少数派观点"));
        for insight in insights {
            lines.push(Line::from(format!("  - {insight}")));
        }
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No analysis yet",
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn draw_visualization(frame: &mut Frame, viz: &VisualizationPanel, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Analysis ")
        .border_style(Style::default().fg(Color::Magenta));
    let widget = Paragraph::new(visualization_lines(viz))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Row and display column of the cursor within the input text.
fn cursor_cell(input: &str, cursor_pos: usize) -> (u16, u16) {
    let before: String = input.chars().take(cursor_pos).collect();
    let row = before.matches('\n').count();
    let line = before.rsplit('\n').next().unwrap_or_default();
    (row as u16, Span::raw(line).width() as u16)
}

/// Draw the text input area at the bottom.
fn draw_input(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let input_block = Block::default()
        .borders(Borders::ALL)
        .title(" Input (Enter send, Shift+Enter newline, /help) ")
        .border_style(Style::default().fg(Color::Cyan));

    let visible_rows = area.height.saturating_sub(2);
    let (row, col) = cursor_cell(app.input(), app.cursor_pos());
    let scroll = (row + 1).saturating_sub(visible_rows);

    let input_widget = Paragraph::new(app.input())
        .block(input_block)
        .style(Style::default().fg(Color::White))
        .scroll((scroll, 0));
    frame.render_widget(input_widget, area);

    // +1 for the border offset on each axis.
    let cursor_x = area.x + 1 + col;
    let cursor_y = area.y + 1 + row - scroll;
    frame.set_cursor_position(Position::new(cursor_x, cursor_y));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
