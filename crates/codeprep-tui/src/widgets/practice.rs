// Practice screen: every question of every learning path on the left,
// details of the selected one on the right.

use std::time::Instant;

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use codeprep_core::model::{tech_label, GeneratedQuestion, LearningPath};

use crate::layout::columns;
use crate::{practice_items, PracticeTimer, ViewState};

use super::{difficulty_color, focused_border_style, status_marker};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (left, right) = columns(area, 40);
    let items = practice_items(&state.snapshot);

    let list_items: Vec<ListItem> = items
        .iter()
        .map(|(path, q)| {
            let (mark, color) = status_marker(q.status);
            ListItem::new(Line::from(vec![
                Span::styled(format!("{mark} "), Style::default().fg(color)),
                Span::raw(q.title.clone()),
                Span::styled(format!("  {}", path_tag(path)), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let list = List::new(list_items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Questions ({})", items.len()))
                .border_style(focused_border_style(true, Style::default())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut list_state = ListState::default();
    if !items.is_empty() {
        list_state.select(Some(state.selected_question));
    }
    frame.render_stateful_widget(list, left, &mut list_state);

    let detail = match items.get(state.selected_question) {
        Some((path, q)) => detail_lines(path, q, state.show_hints, state.timer.as_ref(), Instant::now()),
        None => vec![Line::from(Span::styled(
            "No questions yet. Press 3 to build a learning path.",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    let paragraph = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title("Question"))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, right);
}

/// Short label for the path a question belongs to, e.g. "junior · JavaScript".
pub fn path_tag(path: &LearningPath) -> String {
    let stack: Vec<&str> = path.tech_stack.iter().map(|t| tech_label(t)).collect();
    if stack.is_empty() {
        path.experience_level.clone()
    } else {
        format!("{} · {}", path.experience_level, stack.join(", "))
    }
}

/// "12m 05s" for a running timer.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}m {:02}s", seconds / 60, seconds % 60)
}

pub fn detail_lines(
    path: &LearningPath,
    q: &GeneratedQuestion,
    show_hints: bool,
    timer: Option<&PracticeTimer>,
    now: Instant,
) -> Vec<Line<'static>> {
    let heading = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let mut lines = vec![
        Line::from(Span::styled(
            q.title.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled(q.difficulty.label(), Style::default().fg(difficulty_color(q.difficulty))),
            Span::styled(
                format!("  {}", q.category_or_general()),
                Style::default().fg(Color::Gray),
            ),
            Span::styled(
                q.estimated_time
                    .as_deref()
                    .map(|t| format!("  ~{t}"))
                    .unwrap_or_default(),
                Style::default().fg(Color::Gray),
            ),
        ]),
        Line::default(),
        Line::from(q.description.clone()),
    ];

    if !q.requirements.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Requirements", heading)));
        lines.extend(q.requirements.iter().map(|r| Line::from(format!(" • {r}"))));
    }

    if let Some(cases) = q.test_cases.as_ref().filter(|c| !c.is_empty()) {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Test cases", heading)));
        lines.extend(cases.iter().map(|c| Line::from(format!(" • {c}"))));
    }

    if !q.hints.is_empty() {
        lines.push(Line::default());
        if show_hints {
            lines.push(Line::from(Span::styled("Hints", heading)));
            lines.extend(q.hints.iter().map(|h| Line::from(format!(" • {h}"))));
        } else {
            lines.push(Line::from(Span::styled(
                format!("{} hint(s) hidden, press h to show", q.hints.len()),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    if show_hints {
        if let Some(solution) = &q.solution {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled("Solution", heading)));
            lines.extend(solution.lines().map(|l| Line::from(l.to_string())));
        }
    }

    lines.push(Line::default());
    if let Some(t) = timer.filter(|t| t.question_id == q.id && t.path_id == path.id) {
        lines.push(Line::from(Span::styled(
            format!("⏱ {}", format_elapsed(now.duration_since(t.started).as_secs())),
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(spent) = q.time_spent.filter(|s| *s > 0) {
        lines.push(Line::from(Span::styled(
            format!("Time spent: {}", format_elapsed(spent)),
            Style::default().fg(Color::Gray),
        )));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{question, signed_in_state};
    use codeprep_core::protocol::ScreenId;
    use std::time::Duration;

    fn text(lines: &[Line]) -> String {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn hints_hidden_until_toggled() {
        let state = signed_in_state(ScreenId::Practice);
        let path = &state.snapshot.paths[0];
        let q = question("q1", None);
        let hidden = text(&detail_lines(path, &q, false, None, Instant::now()));
        assert!(hidden.contains("1 hint(s) hidden"));
        assert!(!hidden.contains("Think recursively"));
        let shown = text(&detail_lines(path, &q, true, None, Instant::now()));
        assert!(shown.contains("Think recursively"));
        assert!(shown.contains("Handle empty input"));
    }

    #[test]
    fn timer_shows_only_for_its_question() {
        let state = signed_in_state(ScreenId::Practice);
        let path = &state.snapshot.paths[0];
        let started = Instant::now();
        let timer = PracticeTimer {
            path_id: "p1".into(),
            question_id: "q2".into(),
            started,
        };
        let now = started + Duration::from_secs(125);
        let other = text(&detail_lines(path, &question("q1", None), false, Some(&timer), now));
        assert!(!other.contains("⏱"));
        let own = text(&detail_lines(path, &question("q2", None), false, Some(&timer), now));
        assert!(own.contains("⏱ 2m 05s"));
    }

    #[test]
    fn path_tag_uses_tech_labels() {
        let state = signed_in_state(ScreenId::Practice);
        assert_eq!(path_tag(&state.snapshot.paths[0]), "junior · JavaScript");
    }

    #[test]
    fn render_does_not_panic() {
        let backend = ratatui::backend::TestBackend::new(100, 30);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let mut state = signed_in_state(ScreenId::Practice);
        state.show_hints = true;
        terminal
            .draw(|frame| render(frame, frame.area(), &state))
            .unwrap();
    }

    #[test]
    fn render_does_not_panic_without_paths() {
        let backend = ratatui::backend::TestBackend::new(60, 10);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let state = ViewState::default();
        terminal
            .draw(|frame| render(frame, frame.area(), &state))
            .unwrap();
    }
}
