mod diff;
mod pr_detail;
mod pr_list;
pub mod theme;

use chrono::{DateTime, Utc};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::action::DetailTab;
use crate::app::{App, Screen};

use self::theme::Theme;

pub fn render(frame: &mut Frame, app: &App, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, app, theme, chunks[0]);

    match app.screen {
        Screen::List => pr_list::render(frame, app, theme, chunks[1]),
        Screen::Detail => match app.detail_tab {
            DetailTab::Overview => pr_detail::render(frame, app, theme, chunks[1]),
            DetailTab::Diff => diff::render(frame, app, theme, chunks[1]),
        },
    }

    render_status_bar(frame, app, theme, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let title = match (app.screen, app.engine.selected_pr()) {
        (Screen::Detail, Some(pr)) => format!("prwatch - {} - #{}: {}", app.repo, pr.number, pr.title),
        _ => format!("prwatch - {} [{}]", app.repo, app.repo.host),
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(title, theme.header),
        Span::raw("  "),
        Span::styled(format!("Filter: {}", app.engine.filter().label()), theme.muted),
    ]))
    .style(theme.bar);

    frame.render_widget(header, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let engine = &app.engine;
    let mut spans = Vec::new();

    if let Some(error) = &app.error {
        spans.push(Span::styled(format!("Error: {}", error), theme.error));
    } else if let Some(error) = engine.last_error() {
        spans.push(Span::styled(format!("Error: {}", error.message), theme.error));
    } else if engine.list_loading() {
        spans.push(Span::styled("Syncing...", theme.syncing));
    } else if let Some(synced) = engine.last_sync() {
        spans.push(Span::styled(
            format!("Synced {} ago", format_age(synced, Utc::now())),
            theme.muted,
        ));
    }

    let help = match app.screen {
        Screen::List => {
            "j/k/g/G: nav | Enter: open | f: filter | r: refresh | w/D: worktree | o: edit | O: browser | q: quit"
        }
        Screen::Detail => {
            "j/k/g/G: scroll | Tab: diff | Esc/b: back | w/D: worktree | o: edit | O: browser | q: quit"
        }
    };
    if !spans.is_empty() {
        spans.push(Span::raw(" | "));
    }
    spans.push(Span::styled(help, theme.muted));

    let status_bar = Paragraph::new(Line::from(spans)).style(theme.bar);
    frame.render_widget(status_bar, area);
}

/// Render pre-built lines in a bordered box at the app's scroll offset,
/// recording how far the content can scroll.
fn render_scrolled(frame: &mut Frame, app: &App, area: Rect, title: &str, lines: Vec<Line<'static>>) {
    // Calculate visible area (account for borders)
    let inner_height = area.height.saturating_sub(2) as usize;

    let max_scroll = lines.len().saturating_sub(inner_height);
    app.max_scroll.set(max_scroll);
    let scroll_offset = app.scroll_offset.min(max_scroll);

    let visible_lines: Vec<Line> = lines
        .into_iter()
        .skip(scroll_offset)
        .take(inner_height)
        .collect();

    // Clear the area first to prevent artifacts
    frame.render_widget(Clear, area);

    let body = Paragraph::new(Text::from(visible_lines))
        .block(Block::default().borders(Borders::ALL).title(title.to_string()));

    frame.render_widget(body, area);
}

fn format_age(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(dt);

    if duration.num_days() > 0 {
        format!("{}d", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m", duration.num_minutes())
    } else {
        "now".to_string()
    }
}

/// Cut to `max` characters, marking the cut with "..."
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::at;

    #[test]
    fn age_picks_the_largest_unit() {
        assert_eq!(format_age(at(0), at(0)), "now");
        assert_eq!(format_age(at(0), at(7)), "7m");
        assert_eq!(format_age(at(0) - chrono::Duration::hours(5), at(0)), "5h");
        assert_eq!(format_age(at(0) - chrono::Duration::days(3), at(0)), "3d");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        // Multi-byte titles must not split a code point
        assert_eq!(truncate("日本語のタイトル", 5), "日本...");
    }
}
