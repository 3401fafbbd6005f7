// Screen layout: zone arrangement and sizing.
//
// +--------------------------------------------------+
// | Status Bar (1 row): user, nav tabs, LLM state     |
// +--------------------------------------------------+
// | Main area (fill): the active screen               |
// +--------------------------------------------------+
// | Toast line (1 row)                                |
// +--------------------------------------------------+
// | Help Bar (1 row)                                  |
// +--------------------------------------------------+

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Resolved screen areas for each zone.
#[derive(Debug, Clone)]
pub struct AppLayout {
    pub status_bar: Rect,
    /// Content area handed to the active screen widget.
    pub main: Rect,
    pub toast_line: Rect,
    pub help_bar: Rect,
}

pub fn build_layout(area: Rect) -> AppLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(5),    // main
            Constraint::Length(1), // toast
            Constraint::Length(1), // help bar
        ])
        .split(area);

    AppLayout {
        status_bar: vertical[0],
        main: vertical[1],
        toast_line: vertical[2],
        help_bar: vertical[3],
    }
}

/// Split a screen into a left and right column by percentage.
pub fn columns(area: Rect, left_percent: u16) -> (Rect, Rect) {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(left_percent),
            Constraint::Percentage(100 - left_percent.min(100)),
        ])
        .split(area);
    (horizontal[0], horizontal[1])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_zones_cover_full_height() {
        let area = Rect::new(0, 0, 120, 40);
        let layout = build_layout(area);
        assert_eq!(layout.status_bar.height, 1);
        assert_eq!(layout.toast_line.height, 1);
        assert_eq!(layout.help_bar.height, 1);
        assert_eq!(layout.main.height, 37);
        assert_eq!(layout.main.y, 1);
        assert_eq!(layout.help_bar.y, 39);
    }

    #[test]
    fn zones_span_full_width() {
        let layout = build_layout(Rect::new(0, 0, 120, 40));
        for rect in [layout.status_bar, layout.main, layout.toast_line, layout.help_bar] {
            assert_eq!(rect.width, 120);
        }
    }

    #[test]
    fn columns_split_by_percentage() {
        let (left, right) = columns(Rect::new(0, 0, 100, 20), 60);
        assert_eq!(left.width, 60);
        assert_eq!(right.width, 40);
        assert_eq!(right.x, 60);
    }
}
