use ratatui::style::{Color, Modifier, Style};

use crate::types::{CiStatus, ReviewState};

/// Every style the renderer uses, built once at startup
#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub bar: Style,
    pub title: Style,
    pub accent: Style,
    pub muted: Style,
    pub dim: Style,
    pub author: Style,
    pub selected: Style,
    pub highlight: Style,
    pub border_active: Style,
    pub error: Style,
    pub syncing: Style,
    pub worktree: Style,
    pub badge_new: Style,
    pub badge_upd: Style,
    pub badge_done: Style,
    pub badge_chg: Style,
    pub ci_pass: Style,
    pub ci_fail: Style,
    pub ci_pending: Style,
    pub ci_unknown: Style,
    pub diff_added: Style,
    pub diff_removed: Style,
    pub diff_hunk: Style,
    pub diff_file: Style,
}

impl Default for Theme {
    fn default() -> Self {
        let bold = |color| Style::default().fg(color).add_modifier(Modifier::BOLD);
        Self {
            header: bold(Color::Cyan),
            bar: Style::default().bg(Color::DarkGray),
            title: Style::default().add_modifier(Modifier::BOLD),
            accent: Style::default().fg(Color::Cyan),
            muted: Style::default().fg(Color::Gray),
            dim: Style::default().fg(Color::DarkGray),
            author: Style::default().fg(Color::Yellow),
            selected: bold(Color::Yellow),
            highlight: Style::default().bg(Color::DarkGray),
            border_active: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red),
            syncing: Style::default().fg(Color::Yellow),
            worktree: Style::default().fg(Color::Magenta),
            badge_new: bold(Color::Blue),
            badge_upd: bold(Color::Yellow),
            badge_done: bold(Color::Green),
            badge_chg: bold(Color::Red),
            ci_pass: Style::default().fg(Color::Green),
            ci_fail: Style::default().fg(Color::Red),
            ci_pending: Style::default().fg(Color::Yellow),
            ci_unknown: Style::default().fg(Color::Gray),
            diff_added: Style::default().fg(Color::Green),
            diff_removed: Style::default().fg(Color::Red),
            diff_hunk: Style::default().fg(Color::Cyan),
            diff_file: bold(Color::White),
        }
    }
}

impl Theme {
    pub fn badge(&self, state: ReviewState) -> Style {
        match state {
            ReviewState::New => self.badge_new,
            ReviewState::Upd => self.badge_upd,
            ReviewState::Done => self.badge_done,
            ReviewState::Chg => self.badge_chg,
        }
    }

    pub fn ci(&self, status: CiStatus) -> Style {
        match status {
            CiStatus::Pass => self.ci_pass,
            CiStatus::Fail => self.ci_fail,
            CiStatus::Pending => self.ci_pending,
            CiStatus::Unknown => self.ci_unknown,
        }
    }
}
