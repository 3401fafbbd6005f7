// Path setup screen: experience level, tech stack and question count on
// the left; the streamed generation preview and personalized suggestions
// on the right.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use codeprep_core::model::{ExperienceLevel, TECH_OPTIONS};
use codeprep_core::protocol::LlmStatus;

use crate::layout::columns;
use crate::{PathSetupForm, SetupFocus, ViewState};

use super::{clamp_scroll, focused_border_style};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (left, right) = columns(area, 45);
    let form = &state.setup;

    let left_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(ExperienceLevel::ALL.len() as u16 * 2 + 2),
            Constraint::Length(TECH_OPTIONS.len() as u16 + 2),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(left);

    frame.render_widget(
        Paragraph::new(level_lines(form)).block(section("Experience Level", form.focus == SetupFocus::Level)),
        left_rows[0],
    );
    frame.render_widget(
        Paragraph::new(tech_lines(form)).block(section(
            &format!("Tech Stack ({} selected)", form.selected.len()),
            form.focus == SetupFocus::Tech,
        )),
        left_rows[1],
    );
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw(format!(" {}", form.count_text)),
            Span::styled(
                format!("  (1-{})", form.max_count),
                Style::default().fg(Color::DarkGray),
            ),
        ]))
        .block(section("Number of Questions", form.focus == SetupFocus::Count)),
        left_rows[2],
    );

    let right_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(8)])
        .split(right);
    render_preview(frame, right_rows[0], state);
    render_suggestions(frame, right_rows[1], &state.personalized);
}

fn section(title: &str, focused: bool) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .border_style(focused_border_style(focused, Style::default().fg(Color::Gray)))
}

pub fn level_lines(form: &PathSetupForm) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for level in ExperienceLevel::ALL {
        let chosen = level == form.level;
        let radio = if chosen { "(•)" } else { "( )" };
        let title_style = if chosen {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        let mut spans = vec![
            Span::styled(format!(" {radio} {}", level.title()), title_style),
            Span::styled(format!("  {}", level.subtitle()), Style::default().fg(Color::Gray)),
        ];
        if level.is_recommended() {
            spans.push(Span::styled("  Recommended", Style::default().fg(Color::Green)));
        }
        lines.push(Line::from(spans));
        lines.push(Line::from(Span::styled(
            format!("     {}", level.description()),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

pub fn tech_lines(form: &PathSetupForm) -> Vec<Line<'static>> {
    TECH_OPTIONS
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let check = if form.is_selected(option.id) { "[x]" } else { "[ ]" };
            let cursor = if form.focus == SetupFocus::Tech && i == form.tech_cursor {
                ">"
            } else {
                " "
            };
            let style = if form.is_selected(option.id) {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(Span::styled(format!("{cursor}{check} {}", option.label), style))
        })
        .collect()
}

/// Title text and color for the preview pane.
pub fn preview_status(status: LlmStatus) -> (&'static str, Color) {
    match status {
        LlmStatus::Idle => ("idle", Color::DarkGray),
        LlmStatus::Streaming => ("generating...", Color::Yellow),
        LlmStatus::Complete => ("saved", Color::Green),
        LlmStatus::Error => ("failed", Color::Red),
    }
}

fn render_preview(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (status_text, status_color) = preview_status(state.generation_status);
    let title = Line::from(vec![
        Span::styled("Generated Questions", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(" -- ", Style::default().fg(Color::DarkGray)),
        Span::styled(status_text, Style::default().fg(status_color)),
    ]);

    let mut content = if state.generation_text.is_empty() {
        placeholder(state.generation_status, state.snapshot.llm_available)
    } else {
        state.generation_text.clone()
    };
    if let Some((_, count)) = &state.last_generated {
        content.push_str(&format!("\n\nSaved {count} questions to a new learning path."));
    }
    if let Some(err) = &state.generation_error {
        content.push_str(&format!("\n\n{err}"));
    }

    let inner_height = area.height.saturating_sub(2) as usize;
    let line_count = content.lines().count();
    // Follow the stream while it is running.
    let scroll = if state.generation_status == LlmStatus::Streaming {
        line_count.saturating_sub(inner_height) as u16
    } else {
        clamp_scroll(state.scroll("preview"), line_count, inner_height)
    };

    let border = match state.generation_status {
        LlmStatus::Streaming => Style::default().fg(Color::Yellow),
        LlmStatus::Error => Style::default().fg(Color::Red),
        _ => Style::default().fg(Color::Gray),
    };
    let paragraph = Paragraph::new(content)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(border),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn placeholder(status: LlmStatus, llm_available: bool) -> String {
    match status {
        LlmStatus::Streaming => "Waiting for the first tokens...".to_string(),
        _ if !llm_available => {
            "AI generation is disabled. Add an Anthropic API key to config/credentials.toml."
                .to_string()
        }
        _ => "Pick a level and at least one technology, then press Enter.".to_string(),
    }
}

fn render_suggestions(frame: &mut Frame, area: Rect, titles: &[String]) {
    let lines: Vec<Line> = if titles.is_empty() {
        vec![Line::from(Span::styled(
            "Press p for practice suggestions from the question bank.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        titles
            .iter()
            .map(|t| Line::from(format!(" • {t}")))
            .collect()
    };
    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Suggested Practice"))
            .wrap(Wrap { trim: true }),
        area,
    );
}
