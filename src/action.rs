use crate::engine::SyncMsg;
use crate::error::WatchError;

/// Pane shown on the detail screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailTab {
    #[default]
    Overview,
    Diff,
}

impl DetailTab {
    pub fn toggle(self) -> Self {
        match self {
            DetailTab::Overview => DetailTab::Diff,
            DetailTab::Diff => DetailTab::Overview,
        }
    }
}

#[derive(Debug)]
pub enum Action {
    Quit,
    Back,
    ScrollUp,
    ScrollDown,
    GoToTop,
    GoToBottom,
    Select,
    NextTab,

    // Sync
    Refresh,
    CycleFilter,
    Sync(SyncMsg),

    // Worktrees
    CreateWorktree,
    RemoveWorktree,
    OpenEditor,

    OpenInBrowser,

    Error(String),
    None,
}

impl From<WatchError> for Action {
    fn from(err: WatchError) -> Self {
        Action::Error(err.to_string())
    }
}

impl From<SyncMsg> for Action {
    fn from(msg: SyncMsg) -> Self {
        Action::Sync(msg)
    }
}
