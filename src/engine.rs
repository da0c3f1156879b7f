//! The sync engine: canonical PR state plus a reducer.
//!
//! Every state change goes through [`SyncEngine::handle`], which applies one
//! message and returns the background work to start. The caller runs the
//! effects and feeds their results back in as new messages, so all mutation
//! stays on the single consumer of the message channel.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::mem;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::WatchError;
use crate::filter::filter;
use crate::review::classify;
use crate::types::{Filter, PrDetail, PrSummary, PullRequest};
use crate::worktree::{worktree_path, WorktreeOp};

/// Result of one full-list fetch
#[derive(Debug)]
pub struct ListSnapshot {
    pub prs: Vec<PrSummary>,
    /// Registered worktrees at fetch time; `None` when the probe failed
    pub worktrees: Option<BTreeSet<u64>>,
    /// Worktree epoch the fetch was issued at
    pub worktree_epoch: u64,
    pub fetched_at: DateTime<Utc>,
}

/// What the last error was about. Success of the same kind clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    List,
    Detail(u64),
    Worktree(u64),
    Editor,
}

impl ErrorScope {
    fn same_kind(self, other: ErrorScope) -> bool {
        mem::discriminant(&self) == mem::discriminant(&other)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncError {
    pub scope: ErrorScope,
    pub message: String,
}

#[derive(Debug)]
pub enum SyncMsg {
    /// Timer fire or manual refresh
    Refresh,
    ListFetched {
        generation: u64,
        result: Result<ListSnapshot, WatchError>,
    },
    Select(u64),
    Deselect,
    DetailFetched {
        number: u64,
        result: Result<PrDetail, WatchError>,
    },
    CycleFilter,
    Worktree {
        number: u64,
        op: WorktreeOp,
    },
    WorktreeFinished {
        number: u64,
        op: WorktreeOp,
        result: Result<(), WatchError>,
        /// Existence re-check taken right after the operation
        exists: Result<bool, WatchError>,
    },
    EditorClosed(Result<(), WatchError>),
}

/// Background work requested by the reducer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchList { generation: u64, worktree_epoch: u64 },
    FetchDetail { number: u64, head_sha: String },
    RunWorktree { number: u64, op: WorktreeOp },
}

#[derive(Debug)]
pub struct SyncEngine {
    current_user: String,
    repo_root: PathBuf,
    prs: Vec<PullRequest>,
    filter: Filter,
    /// Indices into `prs` that the active filter shows
    view: Vec<usize>,
    selected: Option<u64>,
    /// Last list generation handed out
    issued_generation: u64,
    /// Newest generation that has completed, successfully or not
    settled_generation: u64,
    /// Newest generation whose result was applied
    applied_generation: u64,
    detail_in_flight: BTreeSet<u64>,
    worktree_busy: BTreeSet<u64>,
    worktree_queue: BTreeMap<u64, VecDeque<WorktreeOp>>,
    /// Bumped by every finished worktree op
    worktree_epoch: u64,
    /// Epoch at which each PR's worktree existence was last re-checked
    worktree_seen: HashMap<u64, u64>,
    last_error: Option<SyncError>,
    last_sync: Option<DateTime<Utc>>,
}

impl SyncEngine {
    pub fn new(current_user: impl Into<String>, repo_root: impl Into<PathBuf>, filter: Filter) -> Self {
        Self {
            current_user: current_user.into(),
            repo_root: repo_root.into(),
            prs: Vec::new(),
            filter,
            view: Vec::new(),
            selected: None,
            issued_generation: 0,
            settled_generation: 0,
            applied_generation: 0,
            detail_in_flight: BTreeSet::new(),
            worktree_busy: BTreeSet::new(),
            worktree_queue: BTreeMap::new(),
            worktree_epoch: 0,
            worktree_seen: HashMap::new(),
            last_error: None,
            last_sync: None,
        }
    }

    pub fn handle(&mut self, msg: SyncMsg) -> Vec<Effect> {
        match msg {
            SyncMsg::Refresh => self.begin_refresh(),
            SyncMsg::ListFetched { generation, result } => self.apply_list(generation, result),
            SyncMsg::Select(number) => self.select(number),
            SyncMsg::Deselect => {
                self.selected = None;
                vec![]
            }
            SyncMsg::DetailFetched { number, result } => self.apply_detail(number, result),
            SyncMsg::CycleFilter => {
                self.filter = self.filter.next();
                self.refilter();
                vec![]
            }
            SyncMsg::Worktree { number, op } => self.request_worktree(number, op),
            SyncMsg::WorktreeFinished {
                number,
                op,
                result,
                exists,
            } => self.finish_worktree(number, op, result, exists),
            SyncMsg::EditorClosed(result) => {
                match result {
                    Ok(()) => self.clear_error(ErrorScope::Editor),
                    Err(e) => self.set_error(ErrorScope::Editor, e.to_string()),
                }
                vec![]
            }
        }
    }

    // Accessors

    pub fn current_user(&self) -> &str {
        &self.current_user
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn prs(&self) -> &[PullRequest] {
        &self.prs
    }

    pub fn pr(&self, number: u64) -> Option<&PullRequest> {
        self.prs.iter().find(|pr| pr.number == number)
    }

    /// PRs the active filter shows, in canonical order
    pub fn visible(&self) -> impl Iterator<Item = &PullRequest> + '_ {
        self.view.iter().map(|&i| &self.prs[i])
    }

    pub fn visible_len(&self) -> usize {
        self.view.len()
    }

    pub fn visible_at(&self, index: usize) -> Option<&PullRequest> {
        self.view.get(index).map(|&i| &self.prs[i])
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    pub fn selected_pr(&self) -> Option<&PullRequest> {
        self.selected.and_then(|n| self.pr(n))
    }

    pub fn list_loading(&self) -> bool {
        self.settled_generation < self.issued_generation
    }

    pub fn detail_loading(&self, number: u64) -> bool {
        self.detail_in_flight.contains(&number)
    }

    pub fn worktree_busy(&self, number: u64) -> bool {
        self.worktree_busy.contains(&number)
    }

    pub fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_ref()
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    // Errors

    fn set_error(&mut self, scope: ErrorScope, message: String) {
        tracing::warn!(?scope, %message, "sync error");
        self.last_error = Some(SyncError { scope, message });
    }

    fn clear_error(&mut self, kind: ErrorScope) {
        if self
            .last_error
            .as_ref()
            .is_some_and(|e| e.scope.same_kind(kind))
        {
            self.last_error = None;
        }
    }

    // List refresh

    fn begin_refresh(&mut self) -> Vec<Effect> {
        self.issued_generation += 1;
        tracing::debug!(generation = self.issued_generation, "list refresh");
        vec![Effect::FetchList {
            generation: self.issued_generation,
            worktree_epoch: self.worktree_epoch,
        }]
    }

    fn apply_list(&mut self, generation: u64, result: Result<ListSnapshot, WatchError>) -> Vec<Effect> {
        self.settled_generation = self.settled_generation.max(generation);

        // Anything older than the data already applied is superseded
        if generation <= self.applied_generation {
            tracing::debug!(generation, applied = self.applied_generation, "dropping stale list result");
            return vec![];
        }

        match result {
            Ok(snapshot) => {
                self.applied_generation = generation;
                self.last_sync = Some(snapshot.fetched_at);
                self.reconcile(snapshot);
                self.reclassify_all();
                self.refilter();
                self.clear_error(ErrorScope::List);
                self.after_reconcile()
            }
            Err(e) => {
                self.set_error(ErrorScope::List, e.to_string());
                vec![]
            }
        }
    }

    /// Merge by number: persisting PRs keep their detail, new ones start
    /// bare, missing ones are dropped.
    fn reconcile(&mut self, snapshot: ListSnapshot) {
        let mut previous: HashMap<u64, PullRequest> =
            self.prs.drain(..).map(|pr| (pr.number, pr)).collect();
        let mut seen = HashSet::new();

        let repo_root = &self.repo_root;
        let busy = &self.worktree_busy;
        let seen_epochs = &self.worktree_seen;
        let worktrees = snapshot.worktrees.as_ref();
        let sampled_at = snapshot.worktree_epoch;

        let merged: Vec<PullRequest> = snapshot
            .prs
            .into_iter()
            .filter(|s| seen.insert(s.number))
            .map(|summary| {
                let number = summary.number;
                let mut pr = match previous.remove(&number) {
                    Some(mut pr) => {
                        pr.merge_summary(summary);
                        pr
                    }
                    None => PullRequest::from_summary(summary, worktree_path(repo_root, number)),
                };
                // Running or since-finished worktree ops report their own
                // existence check, newer than this sample
                let newer = seen_epochs.get(&number).is_some_and(|&e| e > sampled_at);
                if let Some(worktrees) = worktrees {
                    if !busy.contains(&number) && !newer {
                        pr.has_worktree = worktrees.contains(&number);
                    }
                }
                pr
            })
            .collect();

        if !previous.is_empty() {
            tracing::debug!(dropped = ?previous.keys().collect::<Vec<_>>(), "PRs no longer listed");
            self.worktree_seen.retain(|number, _| !previous.contains_key(number));
        }
        self.prs = merged;
    }

    fn after_reconcile(&mut self) -> Vec<Effect> {
        let Some(number) = self.selected else {
            return vec![];
        };
        match self.pr(number) {
            None => {
                tracing::debug!(number, "selected PR is gone");
                self.selected = None;
                vec![]
            }
            Some(pr) if !pr.detail_loaded || pr.detail_is_stale() => {
                self.request_detail(number).into_iter().collect()
            }
            Some(_) => vec![],
        }
    }

    fn reclassify_all(&mut self) {
        for pr in &mut self.prs {
            pr.review_state = classify(&self.current_user, &pr.reviews, pr.updated_at);
        }
    }

    fn refilter(&mut self) {
        let shown: HashSet<u64> = filter(&self.prs, self.filter, &self.current_user)
            .into_iter()
            .map(|pr| pr.number)
            .collect();
        self.view = self
            .prs
            .iter()
            .enumerate()
            .filter(|(_, pr)| shown.contains(&pr.number))
            .map(|(i, _)| i)
            .collect();
    }

    // Detail

    fn select(&mut self, number: u64) -> Vec<Effect> {
        let Some(pr) = self.pr(number) else {
            return vec![];
        };
        let needs_detail = !pr.detail_loaded || pr.detail_is_stale();
        self.selected = Some(number);

        if needs_detail {
            self.request_detail(number).into_iter().collect()
        } else {
            vec![]
        }
    }

    fn request_detail(&mut self, number: u64) -> Option<Effect> {
        if self.detail_in_flight.contains(&number) {
            return None;
        }
        let head_sha = self.pr(number)?.head_sha.clone();
        self.detail_in_flight.insert(number);
        Some(Effect::FetchDetail { number, head_sha })
    }

    fn apply_detail(&mut self, number: u64, result: Result<PrDetail, WatchError>) -> Vec<Effect> {
        self.detail_in_flight.remove(&number);

        let Some(pr) = self.prs.iter_mut().find(|pr| pr.number == number) else {
            tracing::debug!(number, "dropping detail for a PR no longer listed");
            return vec![];
        };

        match result {
            Ok(detail) => {
                pr.apply_detail(detail);
                pr.review_state = classify(&self.current_user, &pr.reviews, pr.updated_at);
                let stale = pr.detail_is_stale();
                self.clear_error(ErrorScope::Detail(number));
                self.refilter();

                if stale && self.selected == Some(number) {
                    self.request_detail(number).into_iter().collect()
                } else {
                    vec![]
                }
            }
            Err(e) => {
                self.set_error(ErrorScope::Detail(number), e.to_string());
                vec![]
            }
        }
    }

    // Worktrees

    fn request_worktree(&mut self, number: u64, op: WorktreeOp) -> Vec<Effect> {
        let Some(pr) = self.pr(number) else {
            return vec![];
        };
        let busy = self.worktree_busy.contains(&number);

        if op == WorktreeOp::Remove && !pr.has_worktree && !busy {
            tracing::debug!(number, "no worktree to remove");
            return vec![];
        }

        if busy {
            tracing::debug!(number, %op, "worktree busy, queueing");
            self.worktree_queue.entry(number).or_default().push_back(op);
            return vec![];
        }

        self.worktree_busy.insert(number);
        vec![Effect::RunWorktree { number, op }]
    }

    fn finish_worktree(
        &mut self,
        number: u64,
        op: WorktreeOp,
        result: Result<(), WatchError>,
        exists: Result<bool, WatchError>,
    ) -> Vec<Effect> {
        self.worktree_busy.remove(&number);

        let op_ok = match result {
            Ok(()) => {
                self.clear_error(ErrorScope::Worktree(number));
                true
            }
            Err(e) => {
                self.set_error(ErrorScope::Worktree(number), format!("{} #{}: {}", op, number, e));
                false
            }
        };

        match exists {
            Ok(exists) => {
                if let Some(pr) = self.prs.iter_mut().find(|pr| pr.number == number) {
                    self.worktree_epoch += 1;
                    self.worktree_seen.insert(number, self.worktree_epoch);
                    pr.has_worktree = exists;
                }
            }
            Err(e) if op_ok => self.set_error(ErrorScope::Worktree(number), e.to_string()),
            Err(e) => tracing::warn!(number, error = %e, "worktree re-check failed"),
        }

        let next = self.worktree_queue.get_mut(&number).and_then(VecDeque::pop_front);
        if self.worktree_queue.get(&number).is_some_and(VecDeque::is_empty) {
            self.worktree_queue.remove(&number);
        }

        match next {
            Some(op) => {
                self.worktree_busy.insert(number);
                vec![Effect::RunWorktree { number, op }]
            }
            None => vec![],
        }
    }
}
