use chrono::{DateTime, Utc};
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

use crate::app::App;
use crate::types::{CiStatus, PullRequest, ReviewState};

use super::theme::Theme;
use super::{format_age, truncate};

/// Fixed columns: badge(5) + space + #num(6) + space + ci(2) + spaces(2) +
/// @author(~16) + approvals(4) + worktree(3) + age(4)
const FIXED_WIDTH: usize = 45;

/// One list row, already reduced to display values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRow {
    pub number: u64,
    pub badge: ReviewState,
    pub ci: CiStatus,
    pub title: String,
    pub author: String,
    /// `None` until detail is loaded
    pub approvals: Option<usize>,
    pub has_worktree: bool,
    pub age: String,
}

impl PrRow {
    pub fn from_pr(pr: &PullRequest, now: DateTime<Utc>) -> Self {
        Self {
            number: pr.number,
            badge: pr.review_state,
            ci: pr.ci_status,
            title: pr.title.clone(),
            author: pr.author.clone(),
            approvals: pr.detail_loaded.then(|| pr.approvals()),
            has_worktree: pr.has_worktree,
            age: format_age(pr.updated_at, now),
        }
    }
}

pub fn format_row(row: &PrRow, width: usize, selected: bool, theme: &Theme) -> Line<'static> {
    let flex = width.saturating_sub(FIXED_WIDTH).max(10);
    let title_style = if selected {
        theme.selected
    } else {
        ratatui::style::Style::default()
    };

    let approvals = match row.approvals {
        Some(n) if n > 0 => format!("+{:<3}", n),
        _ => "    ".to_string(),
    };
    let worktree = if row.has_worktree { " ⎇ " } else { "   " };

    Line::from(vec![
        Span::styled(format!("{:<5}", row.badge.to_string()), theme.badge(row.badge)),
        Span::raw(" "),
        Span::styled(format!("#{:<5}", row.number), theme.muted),
        Span::raw(" "),
        Span::styled(format!("{:<2}", row.ci.to_string()), theme.ci(row.ci)),
        Span::styled(format!("{:<flex$}", truncate(&row.title, flex)), title_style),
        Span::raw("  "),
        Span::styled(format!("@{:<15}", truncate(&row.author, 15)), theme.author),
        Span::styled(approvals, theme.ci_pass),
        Span::styled(worktree, theme.worktree),
        Span::styled(row.age.clone(), theme.dim),
    ])
}

pub fn render(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let engine = &app.engine;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border_active)
        .title(Span::styled(
            format!(
                " {} ({}/{}) ",
                engine.filter().label(),
                engine.visible_len(),
                engine.prs().len()
            ),
            theme.selected,
        ));

    if engine.visible_len() == 0 {
        let text = if engine.list_loading() && engine.last_sync().is_none() {
            "Loading pull requests..."
        } else {
            "No pull requests - press f to change the filter"
        };
        let empty = Paragraph::new(text).block(block).style(theme.muted);
        frame.render_widget(empty, area);
        return;
    }

    let width = area.width.saturating_sub(2) as usize;
    let now = Utc::now();

    let items: Vec<ListItem> = engine
        .visible()
        .enumerate()
        .map(|(i, pr)| {
            let row = PrRow::from_pr(pr, now);
            ListItem::new(format_row(&row, width, i == app.list_index, theme))
        })
        .collect();

    let list = List::new(items).block(block).highlight_style(theme.highlight);

    let mut state = ListState::default();
    state.select(Some(app.list_index));

    frame.render_stateful_widget(list, area, &mut state);
}
