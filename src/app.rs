use std::cell::Cell;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use tokio::sync::mpsc;

use crate::action::{Action, DetailTab};
use crate::engine::{Effect, ListSnapshot, SyncEngine, SyncMsg};
use crate::error::WatchError;
use crate::event::Event;
use crate::remote::RemoteIdentity;
use crate::service::{fetch_detail, ReviewService};
use crate::types::PullRequest;
use crate::worktree::{WorktreeManager, WorktreeOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    List,   // Filtered PR list
    Detail, // Selected PR: overview or diff
}

pub struct App {
    pub screen: Screen,
    pub detail_tab: DetailTab,
    pub engine: SyncEngine,
    pub repo: RemoteIdentity,
    pub list_index: usize,
    pub scroll_offset: usize,
    /// Largest useful scroll offset, written back by the detail renderer
    pub max_scroll: Cell<usize>,
    pub error: Option<String>,
    pub should_quit: bool,
    editor_request: Option<PathBuf>,
    service: Arc<dyn ReviewService>,
    worktrees: Arc<WorktreeManager>,
    action_tx: mpsc::UnboundedSender<Action>,
}

impl App {
    pub fn new(
        engine: SyncEngine,
        repo: RemoteIdentity,
        service: Arc<dyn ReviewService>,
        worktrees: WorktreeManager,
        action_tx: mpsc::UnboundedSender<Action>,
    ) -> Self {
        Self {
            screen: Screen::List,
            detail_tab: DetailTab::default(),
            engine,
            repo,
            list_index: 0,
            scroll_offset: 0,
            max_scroll: Cell::new(0),
            error: None,
            should_quit: false,
            editor_request: None,
            service,
            worktrees: Arc::new(worktrees),
            action_tx,
        }
    }

    pub fn handle_event(&self, event: Event) -> Action {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Render => Action::None,
        }
    }

    fn handle_key(&self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Esc | KeyCode::Char('b') => match self.screen {
                Screen::Detail => Action::Back,
                Screen::List => Action::None,
            },
            KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
            KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
            KeyCode::Char('g') | KeyCode::Home => Action::GoToTop,
            KeyCode::Char('G') | KeyCode::End => Action::GoToBottom,
            KeyCode::Enter => match self.screen {
                Screen::List => Action::Select,
                Screen::Detail => Action::None,
            },
            KeyCode::Tab => match self.screen {
                Screen::Detail => Action::NextTab,
                Screen::List => Action::None,
            },
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Char('f') => Action::CycleFilter,
            KeyCode::Char('w') => Action::CreateWorktree,
            KeyCode::Char('D') => Action::RemoveWorktree,
            KeyCode::Char('o') => Action::OpenEditor,
            KeyCode::Char('O') => Action::OpenInBrowser,
            _ => Action::None,
        }
    }

    /// The PR keyboard commands act on: the open one, else the one under the cursor
    pub fn target(&self) -> Option<&PullRequest> {
        match self.screen {
            Screen::Detail => self.engine.selected_pr(),
            Screen::List => self.engine.visible_at(self.list_index),
        }
    }

    /// Worktree the user asked to open, if any. The main loop suspends the
    /// terminal and runs the editor.
    pub fn take_editor_request(&mut self) -> Option<PathBuf> {
        self.editor_request.take()
    }

    pub fn update(&mut self, action: Action) {
        if self.error.is_some()
            && !matches!(
                action,
                Action::Sync(_) | Action::Error(_) | Action::None | Action::Quit
            )
        {
            self.error = None;
        }

        match action {
            Action::Quit => {
                self.should_quit = true;
            }
            Action::Back => {
                if self.screen == Screen::Detail {
                    self.close_detail();
                }
            }
            Action::ScrollUp => match self.screen {
                Screen::List => {
                    self.list_index = self.list_index.saturating_sub(1);
                }
                Screen::Detail => {
                    self.scroll_offset = self
                        .scroll_offset
                        .min(self.max_scroll.get())
                        .saturating_sub(1);
                }
            },
            Action::ScrollDown => match self.screen {
                Screen::List => {
                    if self.list_index + 1 < self.engine.visible_len() {
                        self.list_index += 1;
                    }
                }
                Screen::Detail => {
                    if self.scroll_offset < self.max_scroll.get() {
                        self.scroll_offset += 1;
                    }
                }
            },
            Action::GoToTop => match self.screen {
                Screen::List => self.list_index = 0,
                Screen::Detail => self.scroll_offset = 0,
            },
            Action::GoToBottom => match self.screen {
                Screen::List => {
                    self.list_index = self.engine.visible_len().saturating_sub(1);
                }
                Screen::Detail => self.scroll_offset = self.max_scroll.get(),
            },
            Action::Select => {
                if let Some(number) = self.engine.visible_at(self.list_index).map(|pr| pr.number) {
                    self.screen = Screen::Detail;
                    self.detail_tab = DetailTab::Overview;
                    self.scroll_offset = 0;
                    self.dispatch(SyncMsg::Select(number));
                }
            }
            Action::NextTab => {
                self.detail_tab = self.detail_tab.toggle();
                self.scroll_offset = 0;
            }

            Action::Refresh => self.dispatch(SyncMsg::Refresh),
            Action::CycleFilter => self.dispatch(SyncMsg::CycleFilter),
            Action::Sync(msg) => self.dispatch(msg),

            Action::CreateWorktree => {
                if let Some(number) = self.target().map(|pr| pr.number) {
                    self.dispatch(SyncMsg::Worktree {
                        number,
                        op: WorktreeOp::Create,
                    });
                }
            }
            Action::RemoveWorktree => {
                if let Some(number) = self.target().map(|pr| pr.number) {
                    self.dispatch(SyncMsg::Worktree {
                        number,
                        op: WorktreeOp::Remove,
                    });
                }
            }
            Action::OpenEditor => self.request_editor(),
            Action::OpenInBrowser => {
                if let Some(url) = self.target().map(|pr| pr.html_url.clone()) {
                    self.spawn_open_browser(url);
                }
            }

            Action::Error(msg) => {
                self.error = Some(msg);
            }
            Action::None => {}
        }
    }

    fn close_detail(&mut self) {
        self.screen = Screen::List;
        self.detail_tab = DetailTab::default();
        self.scroll_offset = 0;
        self.dispatch(SyncMsg::Deselect);
    }

    fn request_editor(&mut self) {
        let Some((number, has_worktree, path)) = self
            .target()
            .map(|pr| (pr.number, pr.has_worktree, pr.worktree_path.clone()))
        else {
            return;
        };
        if self.engine.worktree_busy(number) {
            self.error = Some(format!("worktree for #{} is busy", number));
        } else if !has_worktree {
            self.error = Some(format!("no worktree for #{}; press w to create one", number));
        } else {
            self.editor_request = Some(path);
        }
    }

    /// Feed one message to the engine, start the work it asks for, and keep
    /// the cursor on the same PR.
    fn dispatch(&mut self, msg: SyncMsg) {
        let under_cursor = self.engine.visible_at(self.list_index).map(|pr| pr.number);

        let effects = self.engine.handle(msg);

        match under_cursor.and_then(|n| self.engine.visible().position(|pr| pr.number == n)) {
            Some(index) => self.list_index = index,
            None => {
                self.list_index = self
                    .list_index
                    .min(self.engine.visible_len().saturating_sub(1));
            }
        }

        if self.screen == Screen::Detail && self.engine.selected().is_none() {
            self.screen = Screen::List;
            self.scroll_offset = 0;
        }

        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&self, effect: Effect) {
        match effect {
            Effect::FetchList {
                generation,
                worktree_epoch,
            } => self.spawn_fetch_list(generation, worktree_epoch),
            Effect::FetchDetail { number, head_sha } => self.spawn_fetch_detail(number, head_sha),
            Effect::RunWorktree { number, op } => self.spawn_worktree(number, op),
        }
    }

    fn spawn_fetch_list(&self, generation: u64, worktree_epoch: u64) {
        let tx = self.action_tx.clone();
        let service = Arc::clone(&self.service);
        let worktrees = Arc::clone(&self.worktrees);
        let repo = self.repo.clone();
        let user = self.engine.current_user().to_string();
        tokio::spawn(async move {
            // The worktree registry is read alongside the list so the
            // markers refresh with it
            let (listed, registry) = tokio::join!(
                service.list_candidate_prs(&repo.owner, &repo.name, &user),
                tokio::task::spawn_blocking(move || worktrees.registered_prs()),
            );

            let worktrees = match registry {
                Ok(Ok(numbers)) => Some(numbers),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "cannot list worktrees");
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "worktree listing task failed");
                    None
                }
            };

            let result = listed.map(|prs| ListSnapshot {
                prs,
                worktrees,
                worktree_epoch,
                fetched_at: Utc::now(),
            });
            tx.send(SyncMsg::ListFetched { generation, result }.into()).ok();
        });
    }

    fn spawn_fetch_detail(&self, number: u64, head_sha: String) {
        let tx = self.action_tx.clone();
        let service = Arc::clone(&self.service);
        let repo = self.repo.clone();
        tokio::spawn(async move {
            let result = fetch_detail(service.as_ref(), &repo.owner, &repo.name, number, &head_sha).await;
            tx.send(SyncMsg::DetailFetched { number, result }.into()).ok();
        });
    }

    fn spawn_worktree(&self, number: u64, op: WorktreeOp) {
        let tx = self.action_tx.clone();
        let worktrees = Arc::clone(&self.worktrees);
        tokio::spawn(async move {
            let joined = tokio::task::spawn_blocking(move || {
                let result = op.run(&worktrees, number);
                let exists = worktrees.exists(number);
                (result, exists)
            })
            .await;

            let (result, exists) = match joined {
                Ok(outcome) => outcome,
                Err(e) => (
                    Err(WatchError::GitCommand(format!("{} task failed: {}", op, e))),
                    Err(WatchError::GitCommand(format!("{} task failed: {}", op, e))),
                ),
            };
            tx.send(
                SyncMsg::WorktreeFinished {
                    number,
                    op,
                    result,
                    exists,
                }
                .into(),
            )
            .ok();
        });
    }

    fn spawn_open_browser(&self, url: String) {
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let opened = tokio::task::spawn_blocking(move || open::that(&url)).await;
            match opened {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tx.send(Action::Error(format!("cannot open browser: {}", e))).ok();
                }
                Err(e) => {
                    tx.send(Action::Error(format!("cannot open browser: {}", e))).ok();
                }
            }
        });
    }
}
