use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::App;
use crate::types::{Comment, PullRequest};

use super::render_scrolled;
use super::theme::Theme;

pub fn render(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let Some(pr) = app.engine.selected_pr() else {
        let block = Block::default().borders(Borders::ALL).title("Pull Request");
        let empty = Paragraph::new("No pull request selected")
            .block(block)
            .style(theme.muted);
        frame.render_widget(empty, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0)])
        .split(area);

    render_header(frame, pr, app.engine.worktree_busy(pr.number), theme, chunks[0]);

    let lines = body_lines(pr, app.engine.detail_loading(pr.number), theme);
    render_scrolled(frame, app, chunks[1], "Overview", lines);
}

fn render_header(frame: &mut Frame, pr: &PullRequest, worktree_busy: bool, theme: &Theme, area: Rect) {
    let worktree = if worktree_busy {
        Span::styled("worktree: working...", theme.syncing)
    } else if pr.has_worktree {
        Span::styled(format!("worktree: {}", pr.worktree_path.display()), theme.worktree)
    } else {
        Span::styled("no worktree (w to create)", theme.dim)
    };

    let lines = vec![
        Line::from(vec![
            Span::styled(format!("#{} ", pr.number), theme.header),
            Span::styled(pr.title.clone(), theme.title),
        ]),
        Line::from(vec![
            Span::styled(pr.review_state.to_string(), theme.badge(pr.review_state)),
            Span::raw(" | "),
            Span::styled(format!("@{}", pr.author), theme.author),
            Span::raw(" wants to merge "),
            Span::styled(pr.head_ref.clone(), theme.accent),
            Span::raw(" into "),
            Span::styled(pr.base_ref.clone(), theme.accent),
        ]),
        Line::from(vec![
            Span::styled("Created: ", theme.muted),
            Span::raw(pr.created_at.format("%Y-%m-%d %H:%M").to_string()),
            Span::raw(" | "),
            Span::styled("Updated: ", theme.muted),
            Span::raw(pr.updated_at.format("%Y-%m-%d %H:%M").to_string()),
        ]),
        Line::from(worktree),
    ];

    let header = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Details"));

    frame.render_widget(header, area);
}

fn section(title: String, theme: &Theme) -> Line<'static> {
    Line::from(Span::styled(title, theme.title))
}

fn body_lines(pr: &PullRequest, loading: bool, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = vec![section("Description".to_string(), theme)];
    if pr.body.trim().is_empty() {
        lines.push(Line::from(Span::styled("No description provided.", theme.muted)));
    } else {
        lines.extend(pr.body.lines().map(|l| Line::raw(l.replace('\t', "    "))));
    }
    lines.push(Line::default());

    if !pr.detail_loaded {
        let note = if loading {
            "Loading checks, reviews and comments..."
        } else {
            "Details not loaded"
        };
        lines.push(Line::from(Span::styled(note, theme.syncing)));
        return lines;
    }

    lines.push(Line::from(vec![
        Span::styled("Checks ", theme.title),
        Span::styled(pr.ci_status.to_string(), theme.ci(pr.ci_status)),
    ]));
    if pr.check_runs.is_empty() {
        lines.push(Line::from(Span::styled("  no check runs", theme.muted)));
    }
    for run in &pr.check_runs {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(run.status.to_string(), theme.ci(run.status)),
            Span::raw(format!(" {}", run.name)),
        ]));
    }
    lines.push(Line::default());

    lines.push(section(format!("Reviews ({})", pr.reviews.len()), theme));
    for review in &pr.reviews {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("@{}", review.author), theme.author),
            Span::raw(format!(" {} ", review.state)),
            Span::styled(review.created_at.format("%Y-%m-%d %H:%M").to_string(), theme.dim),
        ]));
    }
    lines.push(Line::default());

    lines.push(section(
        format!("Comments ({} unread)", pr.unread_comments()),
        theme,
    ));
    for comment in &pr.comments {
        push_comment(&mut lines, comment, 1, theme);
    }

    lines
}

fn push_comment(lines: &mut Vec<Line<'static>>, comment: &Comment, depth: usize, theme: &Theme) {
    let indent = "  ".repeat(depth);
    let location = match comment.line {
        Some(line) if !comment.path.is_empty() => format!(" {}:{}", comment.path, line),
        _ if !comment.path.is_empty() => format!(" {}", comment.path),
        _ => String::new(),
    };
    let marker = if comment.is_unread { "● " } else { "  " };

    lines.push(Line::from(vec![
        Span::raw(indent.clone()),
        Span::styled(marker, theme.syncing),
        Span::styled(format!("@{}", comment.author), theme.author),
        Span::styled(location, theme.accent),
    ]));
    for body_line in comment.body.lines() {
        lines.push(Line::raw(format!("{}    {}", indent, body_line.replace('\t', "    "))));
    }
    for reply in &comment.replies {
        push_comment(lines, reply, depth + 1, theme);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::types::fixtures::{at, review, summary};
    use crate::types::{CheckReport, CheckRun, CiStatus, PrDetail};

    fn text(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn unloaded_detail_shows_progress() {
        let pr = PullRequest::from_summary(summary(3, "a", true), PathBuf::new());
        let lines = text(&body_lines(&pr, true, &Theme::default()));
        assert!(lines.contains(&"No description provided.".to_string()));
        assert!(lines.last().unwrap().starts_with("Loading"));
        assert!(!lines.iter().any(|l| l.starts_with("Checks")));
    }

    #[test]
    fn loaded_detail_lists_checks_reviews_and_threads() {
        let mut pr = PullRequest::from_summary(summary(3, "a", true), PathBuf::new());
        pr.body = "Fixes the race".to_string();
        let reply = Comment {
            author: "carol".to_string(),
            body: "agreed".to_string(),
            path: "src/lib.rs".to_string(),
            line: Some(4),
            is_unread: true,
            replies: vec![],
        };
        pr.apply_detail(PrDetail {
            head_sha: "sha3".to_string(),
            reviews: vec![review("bob", "APPROVED", at(20))],
            checks: CheckReport::from_runs(vec![CheckRun {
                name: "test".to_string(),
                status: CiStatus::Fail,
            }]),
            comments: vec![Comment {
                author: "bob".to_string(),
                body: "nit".to_string(),
                path: "src/lib.rs".to_string(),
                line: Some(4),
                is_unread: true,
                replies: vec![reply],
            }],
            diff_files: vec![],
        });

        let lines = text(&body_lines(&pr, false, &Theme::default()));
        assert!(lines.contains(&"Fixes the race".to_string()));
        assert!(lines.contains(&"Checks ✗".to_string()));
        assert!(lines.contains(&"  ✗ test".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("  @bob approved")));
        assert!(lines.contains(&"Comments (2 unread)".to_string()));
        assert!(lines.contains(&"  ● @bob src/lib.rs:4".to_string()));
        assert!(lines.contains(&"    ● @carol src/lib.rs:4".to_string()));
        assert!(lines.contains(&"        agreed".to_string()));
    }
}
