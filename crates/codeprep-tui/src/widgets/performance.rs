// Performance screen: headline stats, skill growth, strengths and
// weaknesses, and suggested focus areas.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use codeprep_core::model::{Difficulty, PerformanceStats};

use crate::ViewState;

use super::{clamp_scroll, difficulty_color, progress_bar};

const BAR_WIDTH: usize = 20;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let lines = match &state.snapshot.performance {
        Some(stats) => stats_lines(stats),
        None => vec![Line::from(Span::styled(
            " No performance data yet. Complete a few questions first.",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let visible_rows = (area.height as usize).saturating_sub(2);
    let scroll = clamp_scroll(state.scroll("performance"), lines.len(), visible_rows);
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Performance"))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

/// Bands share the difficulty badge colors.
fn band_color(skill: &str) -> Color {
    Difficulty::from_str_opt(skill)
        .map(difficulty_color)
        .unwrap_or(Color::Blue)
}

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!(" {text}"),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))
}

pub fn stats_lines(stats: &PerformanceStats) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled(" Problems solved  ", Style::default().fg(Color::Gray)),
            Span::styled(
                stats.problems_solved.to_string(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled("   Success rate  ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{}%", stats.success_rate), Style::default().fg(Color::Cyan)),
            Span::styled("   Time remaining  ", Style::default().fg(Color::Gray)),
            Span::styled(stats.time_remaining.clone(), Style::default().fg(Color::White)),
        ]),
        Line::default(),
        heading("Skill Growth"),
    ];

    for point in &stats.skill_growth {
        let max = point.counts.values().copied().max().unwrap_or(0).max(1);
        lines.push(Line::from(Span::styled(
            format!("  {}", point.week),
            Style::default().fg(Color::Gray),
        )));
        for (skill, count) in &point.counts {
            let pct = count * 100 / max;
            lines.push(Line::from(vec![
                Span::raw(format!("   {skill:<14}")),
                Span::styled(progress_bar(pct, BAR_WIDTH), Style::default().fg(Color::Blue)),
                Span::styled(format!(" {count}"), Style::default().fg(Color::Gray)),
            ]));
        }
    }

    lines.push(Line::default());
    lines.push(heading("Strengths & Weaknesses"));
    let max = stats
        .strength_weakness
        .iter()
        .map(|e| e.value)
        .max()
        .unwrap_or(0)
        .max(1);
    for entry in &stats.strength_weakness {
        lines.push(Line::from(vec![
            Span::raw(format!("   {:<14}", entry.skill)),
            Span::styled(
                progress_bar(entry.value * 100 / max, BAR_WIDTH),
                Style::default().fg(band_color(&entry.skill)),
            ),
            Span::styled(format!(" {}", entry.value), Style::default().fg(Color::Gray)),
        ]));
    }

    lines.push(Line::default());
    lines.push(heading("Focus Areas"));
    if stats.focus_areas.is_empty() {
        lines.push(Line::from(Span::styled(
            "   Nothing to focus on. Every question is complete.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for area in &stats.focus_areas {
        lines.push(Line::from(vec![
            Span::styled(
                format!("   {}", area.title),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", area.difficulty.label()),
                Style::default().fg(difficulty_color(area.difficulty)),
            ),
            Span::styled(format!("  ~{}", area.estimated_time), Style::default().fg(Color::Gray)),
        ]));
        lines.push(Line::from(Span::styled(
            format!("     {}", area.description),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}
