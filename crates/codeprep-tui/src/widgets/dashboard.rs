// Dashboard: progress summary, daily challenge and the question sets table.
//
// +---------------------------+-----------------------------------+
// | Progress                  | Daily Challenge                   |
// | Skill breakdown           +-----------------------------------+
// |                           | Question Sets (category filter)   |
// +---------------------------+-----------------------------------+

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap};
use ratatui::Frame;

use codeprep_core::model::{DailyChallenge, UserProgress};
use codeprep_core::protocol::AppSnapshot;

use crate::layout::columns;
use crate::ViewState;

use super::{clamp_scroll, difficulty_color, progress_bar};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (left, right) = columns(area, 40);
    render_progress(frame, left, &state.snapshot);

    let right_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(3)])
        .split(right);
    render_daily(frame, right_rows[0], state.snapshot.daily_challenge.as_ref());
    render_sets(frame, right_rows[1], state);
}

fn render_progress(frame: &mut Frame, area: Rect, snapshot: &AppSnapshot) {
    let name = snapshot.user.as_ref().map(|u| u.name.as_str()).unwrap_or("");
    let mut lines = vec![
        Line::from(Span::styled(
            format!(" Welcome back, {}!", if name.is_empty() { "there" } else { name }),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];
    lines.extend(summary_lines(&snapshot.progress, snapshot.weekly_progress_percent));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        " Skill breakdown",
        Style::default().fg(Color::Cyan),
    )));
    if snapshot.progress.skill_breakdown.is_empty() {
        lines.push(Line::from(Span::styled(
            "  No questions yet. Generate a learning path to get started.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for skill in &snapshot.progress.skill_breakdown {
        let pct = codeprep_practice::analytics::percent(skill.completed as usize, skill.total as usize);
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<14}", skill.skill), Style::default().fg(Color::White)),
            Span::styled(progress_bar(pct, 12), Style::default().fg(Color::Green)),
            Span::styled(
                format!(" {}/{}", skill.completed, skill.total),
                Style::default().fg(Color::Gray),
            ),
        ]));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Headline numbers: solved, success rate, time remaining, weekly bar.
pub fn summary_lines(progress: &UserProgress, weekly_percent: u32) -> Vec<Line<'static>> {
    let label = |text: &str| Span::styled(format!(" {text:<16}"), Style::default().fg(Color::Gray));
    vec![
        Line::from(vec![
            label("Solved"),
            Span::styled(
                format!("{}/{}", progress.completed_questions, progress.total_questions),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            label("Success rate"),
            Span::styled(format!("{}%", progress.success_rate), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            label("Time remaining"),
            Span::styled(progress.time_remaining.clone(), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            label("Weekly progress"),
            Span::styled(progress_bar(weekly_percent, 16), Style::default().fg(Color::Green)),
            Span::styled(format!(" {weekly_percent}%"), Style::default().fg(Color::Gray)),
        ]),
    ]
}

fn render_daily(frame: &mut Frame, area: Rect, challenge: Option<&DailyChallenge>) {
    let lines = match challenge {
        Some(challenge) => {
            let q = &challenge.question;
            vec![
                Line::from(vec![
                    Span::styled(
                        q.title.clone(),
                        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("  "),
                    Span::styled(
                        q.difficulty.label(),
                        Style::default().fg(difficulty_color(q.difficulty)),
                    ),
                ]),
                Line::from(Span::styled(q.description.clone(), Style::default().fg(Color::Gray))),
                Line::from(vec![
                    Span::styled(
                        format!("+{} pts", challenge.points),
                        Style::default().fg(Color::Yellow),
                    ),
                    Span::styled(
                        format!("  ⏱ {} left", challenge.time_remaining),
                        Style::default().fg(Color::Gray),
                    ),
                    Span::styled("  d:Open", Style::default().fg(Color::DarkGray)),
                ]),
            ]
        }
        None => vec![Line::from(Span::styled(
            "All caught up! No open questions for today.",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Daily Challenge"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_sets(frame: &mut Frame, area: Rect, state: &ViewState) {
    let snapshot = &state.snapshot;
    let header = Row::new(vec![
        Cell::from(""),
        Cell::from("Title"),
        Cell::from("Category"),
        Cell::from("Level"),
        Cell::from("Path"),
        Cell::from("Est."),
    ])
    .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let visible_rows = (area.height as usize).saturating_sub(3);
    let skip = clamp_scroll(state.scroll("dashboard"), snapshot.question_sets.len(), visible_rows)
        as usize;

    let rows: Vec<Row> = if snapshot.question_sets.is_empty() {
        vec![Row::new(vec![Cell::from(""), Cell::from("No question sets")])]
    } else {
        snapshot
            .question_sets
            .iter()
            .skip(skip)
            .map(|set| {
                let (mark, mark_color) = if set.completed {
                    ("✓", Color::Green)
                } else {
                    ("○", Color::DarkGray)
                };
                Row::new(vec![
                    Cell::from(Span::styled(mark, Style::default().fg(mark_color))),
                    Cell::from(set.title.clone()),
                    Cell::from(set.category.clone()),
                    Cell::from(Span::styled(
                        set.difficulty.label(),
                        Style::default().fg(difficulty_color(set.difficulty)),
                    )),
                    Cell::from(format!("{}/{}", set.completed_questions, set.total_questions)),
                    Cell::from(set.estimated_time.clone()),
                ])
            })
            .collect()
    };

    let widths = [
        Constraint::Length(2),
        Constraint::Min(20),
        Constraint::Length(12),
        Constraint::Length(13),
        Constraint::Length(6),
        Constraint::Length(6),
    ];
    let title = format!("Question Sets [{}]", filter_label(&snapshot.category_filter));
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(table, area);
}

/// Display form of the category filter.
pub fn filter_label(filter: &str) -> String {
    if filter.is_empty() || filter == "all" {
        "All".to_string()
    } else {
        filter.to_string()
    }
}
