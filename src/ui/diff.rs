use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::App;
use crate::types::DiffFile;

use super::render_scrolled;
use super::theme::Theme;

pub fn render(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let Some(pr) = app.engine.selected_pr() else {
        let empty = Paragraph::new("No pull request selected")
            .block(Block::default().borders(Borders::ALL).title("Diff"))
            .style(theme.muted);
        frame.render_widget(empty, area);
        return;
    };

    let lines = if pr.detail_loaded {
        diff_lines(&pr.diff_files, theme)
    } else {
        vec![Line::from(Span::styled("Loading diff...", theme.syncing))]
    };

    let title = format!("Diff ({} files)", pr.diff_files.len());
    render_scrolled(frame, app, area, &title, lines);
}

fn diff_lines(files: &[DiffFile], theme: &Theme) -> Vec<Line<'static>> {
    if files.is_empty() {
        return vec![Line::from(Span::styled("No changes", theme.muted))];
    }

    let mut lines = Vec::new();
    for file in files {
        lines.push(Line::from(Span::styled(file.filename.clone(), theme.diff_file)));

        if file.patch.is_empty() {
            lines.push(Line::from(Span::styled(
                "  (binary or too large to display)",
                theme.dim,
            )));
        }

        for diff_line in file.patch.lines() {
            let sanitized = diff_line.replace('\t', "    ");
            let style = if sanitized.starts_with('+') {
                theme.diff_added
            } else if sanitized.starts_with('-') {
                theme.diff_removed
            } else if sanitized.starts_with("@@") {
                theme.diff_hunk
            } else {
                ratatui::style::Style::default()
            };
            lines.push(Line::from(Span::styled(sanitized, style)));
        }
        lines.push(Line::default());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_lines_are_coloured_by_prefix() {
        let theme = Theme::default();
        let files = vec![DiffFile {
            filename: "src/main.rs".to_string(),
            patch: "@@ -1,2 +1,2 @@\n-old\n+new\n\tkept".to_string(),
        }];

        let lines = diff_lines(&files, &theme);
        assert_eq!(lines[0].spans[0].content, "src/main.rs");
        assert_eq!(lines[1].spans[0].style, theme.diff_hunk);
        assert_eq!(lines[2].spans[0].style, theme.diff_removed);
        assert_eq!(lines[3].spans[0].style, theme.diff_added);
        assert_eq!(lines[4].spans[0].content, "    kept");
    }

    #[test]
    fn files_without_patch_get_a_note() {
        let files = vec![DiffFile {
            filename: "logo.png".to_string(),
            patch: String::new(),
        }];
        let lines = diff_lines(&files, &Theme::default());
        assert!(lines[1].spans[0].content.contains("binary"));
    }
}
