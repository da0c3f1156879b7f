use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Which slice of the open PRs the list shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Filter {
    #[default]
    ReviewRequested,
    Authored,
    All,
}

impl Filter {
    pub fn next(self) -> Self {
        match self {
            Filter::ReviewRequested => Filter::Authored,
            Filter::Authored => Filter::All,
            Filter::All => Filter::ReviewRequested,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Filter::ReviewRequested => "Review Requested",
            Filter::Authored => "Authored",
            Filter::All => "All Open",
        }
    }
}

/// Where the current user stands on a PR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewState {
    /// Never reviewed
    #[default]
    New,
    /// New commits since your last review
    Upd,
    /// You approved
    Done,
    /// You requested changes
    Chg,
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewState::New => write!(f, "NEW"),
            ReviewState::Upd => write!(f, "UPD"),
            ReviewState::Done => write!(f, "DONE"),
            ReviewState::Chg => write!(f, "CHG"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested,
    Commented,
    Other(String),
}

impl From<&str> for ReviewVerdict {
    fn from(raw: &str) -> Self {
        match raw {
            "APPROVED" => ReviewVerdict::Approved,
            "CHANGES_REQUESTED" => ReviewVerdict::ChangesRequested,
            "COMMENTED" => ReviewVerdict::Commented,
            other => ReviewVerdict::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewVerdict::Approved => write!(f, "approved"),
            ReviewVerdict::ChangesRequested => write!(f, "changes requested"),
            ReviewVerdict::Commented => write!(f, "commented"),
            ReviewVerdict::Other(raw) => write!(f, "{}", raw.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub author: String,
    pub state: ReviewVerdict,
    pub created_at: DateTime<Utc>,
}

/// CI outcome, for a single check run or a whole commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CiStatus {
    Pass,
    Fail,
    Pending,
    #[default]
    Unknown,
}

impl fmt::Display for CiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CiStatus::Pass => write!(f, "✓"),
            CiStatus::Fail => write!(f, "✗"),
            CiStatus::Pending => write!(f, "⏳"),
            CiStatus::Unknown => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRun {
    pub name: String,
    pub status: CiStatus,
}

/// Check runs for one commit plus the rolled-up status
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckReport {
    pub runs: Vec<CheckRun>,
    pub overall: CiStatus,
}

impl CheckReport {
    /// Any failure wins, then any pending run; no runs at all is Unknown.
    pub fn from_runs(runs: Vec<CheckRun>) -> Self {
        let overall = if runs.is_empty() {
            CiStatus::Unknown
        } else if runs.iter().any(|r| r.status == CiStatus::Fail) {
            CiStatus::Fail
        } else if runs.iter().any(|r| r.status == CiStatus::Pending) {
            CiStatus::Pending
        } else {
            CiStatus::Pass
        };
        Self { runs, overall }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub path: String,
    pub line: Option<u64>,
    pub is_unread: bool,
    pub replies: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFile {
    pub filename: String,
    pub patch: String,
}

/// Summary fields as returned by a list fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrSummary {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub base_ref: String,
    pub head_ref: String,
    pub head_sha: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
    pub is_review_requested: bool,
}

/// Everything the four detail sub-fetches produce, applied as one unit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrDetail {
    pub head_sha: String,
    pub reviews: Vec<Review>,
    pub checks: CheckReport,
    pub comments: Vec<Comment>,
    pub diff_files: Vec<DiffFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub base_ref: String,
    pub head_ref: String,
    pub head_sha: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
    pub is_review_requested: bool,
    pub ci_status: CiStatus,
    pub check_runs: Vec<CheckRun>,
    pub reviews: Vec<Review>,
    pub comments: Vec<Comment>,
    pub diff_files: Vec<DiffFile>,
    pub review_state: ReviewState,
    pub has_worktree: bool,
    pub worktree_path: PathBuf,
    pub detail_loaded: bool,
    /// Head SHA the loaded detail belongs to
    pub detail_sha: Option<String>,
}

impl PullRequest {
    pub fn from_summary(summary: PrSummary, worktree_path: PathBuf) -> Self {
        Self {
            number: summary.number,
            title: summary.title,
            author: summary.author,
            base_ref: summary.base_ref,
            head_ref: summary.head_ref,
            head_sha: summary.head_sha,
            body: summary.body,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            html_url: summary.html_url,
            is_review_requested: summary.is_review_requested,
            ci_status: CiStatus::Unknown,
            check_runs: Vec::new(),
            reviews: Vec::new(),
            comments: Vec::new(),
            diff_files: Vec::new(),
            review_state: ReviewState::New,
            has_worktree: false,
            worktree_path,
            detail_loaded: false,
            detail_sha: None,
        }
    }

    /// Overwrite the summary fields only; detail and worktree state survive.
    pub fn merge_summary(&mut self, summary: PrSummary) {
        self.title = summary.title;
        self.author = summary.author;
        self.base_ref = summary.base_ref;
        self.head_ref = summary.head_ref;
        self.head_sha = summary.head_sha;
        self.body = summary.body;
        self.created_at = summary.created_at;
        self.updated_at = summary.updated_at;
        self.html_url = summary.html_url;
        self.is_review_requested = summary.is_review_requested;
    }

    pub fn apply_detail(&mut self, detail: PrDetail) {
        self.reviews = detail.reviews;
        self.check_runs = detail.checks.runs;
        self.ci_status = detail.checks.overall;
        self.comments = detail.comments;
        self.diff_files = detail.diff_files;
        self.detail_sha = Some(detail.head_sha);
        self.detail_loaded = true;
    }

    /// True when the head moved after the loaded detail was fetched
    pub fn detail_is_stale(&self) -> bool {
        self.detail_sha
            .as_deref()
            .is_some_and(|sha| sha != self.head_sha)
    }

    pub fn approvals(&self) -> usize {
        self.reviews
            .iter()
            .filter(|r| r.state == ReviewVerdict::Approved)
            .count()
    }

    pub fn unread_comments(&self) -> usize {
        fn count(comments: &[Comment]) -> usize {
            comments
                .iter()
                .map(|c| usize::from(c.is_unread) + count(&c.replies))
                .sum()
        }
        count(&self.comments)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    pub fn summary(number: u64, author: &str, requested: bool) -> PrSummary {
        PrSummary {
            number,
            title: format!("PR {}", number),
            author: author.to_string(),
            base_ref: "main".to_string(),
            head_ref: format!("feature-{}", number),
            head_sha: format!("sha{}", number),
            body: String::new(),
            created_at: at(0),
            updated_at: at(10),
            html_url: format!("https://github.com/o/r/pull/{}", number),
            is_review_requested: requested,
        }
    }

    pub fn review(author: &str, state: &str, created_at: DateTime<Utc>) -> Review {
        Review {
            author: author.to_string(),
            state: ReviewVerdict::from(state),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn filter_cycles_through_all_modes() {
        let f = Filter::ReviewRequested;
        assert_eq!(f.next(), Filter::Authored);
        assert_eq!(f.next().next(), Filter::All);
        assert_eq!(f.next().next().next(), Filter::ReviewRequested);
    }

    #[test]
    fn verdict_parses_known_and_unknown_states() {
        assert_eq!(ReviewVerdict::from("APPROVED"), ReviewVerdict::Approved);
        assert_eq!(
            ReviewVerdict::from("DISMISSED"),
            ReviewVerdict::Other("DISMISSED".to_string())
        );
    }

    #[test]
    fn check_report_rolls_up_status() {
        let run = |status| CheckRun {
            name: "ci".to_string(),
            status,
        };
        assert_eq!(CheckReport::from_runs(vec![]).overall, CiStatus::Unknown);
        assert_eq!(
            CheckReport::from_runs(vec![run(CiStatus::Pass), run(CiStatus::Pending)]).overall,
            CiStatus::Pending
        );
        assert_eq!(
            CheckReport::from_runs(vec![run(CiStatus::Pending), run(CiStatus::Fail)]).overall,
            CiStatus::Fail
        );
        assert_eq!(
            CheckReport::from_runs(vec![run(CiStatus::Pass), run(CiStatus::Unknown)]).overall,
            CiStatus::Pass
        );
    }

    #[test]
    fn merge_summary_keeps_detail() {
        let mut pr = PullRequest::from_summary(summary(7, "bob", true), PathBuf::from("/r/pr-7"));
        pr.apply_detail(PrDetail {
            head_sha: "sha7".to_string(),
            reviews: vec![review("me", "APPROVED", at(20))],
            ..PrDetail::default()
        });
        pr.has_worktree = true;

        let mut fresh = summary(7, "bob", false);
        fresh.title = "Renamed".to_string();
        pr.merge_summary(fresh);

        assert_eq!(pr.title, "Renamed");
        assert!(!pr.is_review_requested);
        assert!(pr.detail_loaded);
        assert_eq!(pr.reviews.len(), 1);
        assert!(pr.has_worktree);
        assert!(!pr.detail_is_stale());
    }

    #[test]
    fn unread_comments_counts_replies() {
        let comment = |unread, replies| Comment {
            author: "a".to_string(),
            body: "b".to_string(),
            path: String::new(),
            line: None,
            is_unread: unread,
            replies,
        };
        let mut pr = PullRequest::from_summary(summary(1, "a", false), PathBuf::new());
        pr.comments = vec![
            comment(true, vec![comment(true, vec![]), comment(false, vec![])]),
            comment(false, vec![]),
        ];
        assert_eq!(pr.unread_comments(), 2);
    }
}
