use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::params::{pulls::Sort, Direction, State};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::auth::{is_tenancy, normalize_host};
use crate::error::{Result, WatchError};
use crate::service::ReviewService;
use crate::types::{CheckReport, CheckRun, CiStatus, Comment, DiffFile, PrSummary, Review};

const PER_PAGE: u8 = 100;
const MAX_PAGES: u32 = 10;

pub struct GitHub {
    client: Octocrab,
    host: String,
}

impl std::fmt::Debug for GitHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHub")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl From<octocrab::Error> for WatchError {
    fn from(err: octocrab::Error) -> Self {
        WatchError::Network(err.to_string())
    }
}

/// REST root for a host: api.github.com, api.<tenant>.ghe.com, or the
/// Enterprise Server `/api/v3` prefix.
fn api_base(host: &str) -> Option<String> {
    let host = normalize_host(host);
    if host == "github.com" {
        None
    } else if is_tenancy(&host) {
        Some(format!("https://api.{}", host))
    } else {
        Some(format!("https://{}/api/v3", host))
    }
}

impl GitHub {
    pub fn new(host: &str, token: String) -> Result<Self> {
        let host = normalize_host(host);
        let mut builder = Octocrab::builder().personal_token(token);
        if let Some(base) = api_base(&host) {
            builder = builder
                .base_uri(base)
                .map_err(|e| WatchError::Auth(format!("bad API host {:?}: {}", host, e)))?;
        }
        let client = builder.build().map_err(|e| WatchError::Auth(e.to_string()))?;

        Ok(Self { client, host })
    }

    /// Follow `page=` until a short page comes back.
    async fn get_all<T: DeserializeOwned>(&self, route: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let url = format!("{}?per_page={}&page={}", route, PER_PAGE, page);
            let batch: Vec<T> = self.client.get(&url, None::<&()>).await?;
            let last = batch.len() < usize::from(PER_PAGE);
            items.extend(batch);
            if last {
                break;
            }
        }
        Ok(items)
    }

    async fn list_open_prs(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<octocrab::models::pulls::PullRequest>> {
        let mut all = Vec::new();
        for page in 1..=MAX_PAGES {
            let prs = self
                .client
                .pulls(owner, name)
                .list()
                .state(State::Open)
                .sort(Sort::Updated)
                .direction(Direction::Descending)
                .per_page(PER_PAGE)
                .page(page)
                .send()
                .await?;

            let done = prs.next.is_none();
            all.extend(prs.items);
            if done {
                break;
            }
        }
        Ok(all)
    }

    /// Search catches team review requests, which `requested_reviewers`
    /// does not list by user.
    async fn review_requested_numbers(
        &self,
        owner: &str,
        name: &str,
        user: &str,
    ) -> Result<HashSet<u64>> {
        let query = format!(
            "is:open is:pr review-requested:{} repo:{}/{}",
            user, owner, name
        );

        let mut numbers = HashSet::new();
        for page in 1..=MAX_PAGES {
            let results = self
                .client
                .search()
                .issues_and_pull_requests(&query)
                .per_page(PER_PAGE)
                .page(page)
                .send()
                .await?;

            let done = results.next.is_none();
            numbers.extend(results.items.into_iter().map(|issue| issue.number));
            if done {
                break;
            }
        }
        Ok(numbers)
    }
}

fn is_review_requested(
    number: u64,
    requested_logins: &[&str],
    user: &str,
    search_hits: &HashSet<u64>,
) -> bool {
    search_hits.contains(&number) || requested_logins.iter().any(|login| *login == user)
}

fn summary_from(
    pr: octocrab::models::pulls::PullRequest,
    user: &str,
    search_hits: &HashSet<u64>,
) -> PrSummary {
    let requested: Vec<&str> = pr
        .requested_reviewers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|a| a.login.as_str())
        .collect();
    let is_review_requested = is_review_requested(pr.number, &requested, user, search_hits);

    PrSummary {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        author: pr
            .user
            .map(|u| u.login)
            .unwrap_or_else(|| "unknown".to_string()),
        base_ref: pr.base.ref_field,
        head_ref: pr.head.ref_field,
        head_sha: pr.head.sha,
        body: pr.body.unwrap_or_default(),
        created_at: pr.created_at.unwrap_or_else(Utc::now),
        updated_at: pr.updated_at.unwrap_or_else(Utc::now),
        html_url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
        is_review_requested,
    }
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

fn login(user: Option<RawUser>) -> String {
    user.map(|u| u.login).unwrap_or_else(|| "ghost".to_string())
}

#[derive(Debug, Deserialize)]
struct RawReview {
    user: Option<RawUser>,
    state: String,
    submitted_at: Option<DateTime<Utc>>,
}

/// Pending (unsubmitted) reviews carry no timestamp and are skipped.
fn reviews_from(raw: Vec<RawReview>) -> Vec<Review> {
    raw.into_iter()
        .filter_map(|r| {
            Some(Review {
                created_at: r.submitted_at?,
                state: r.state.as_str().into(),
                author: login(r.user),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawCheckRun {
    name: String,
    status: String,
    conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCheckRuns {
    check_runs: Vec<RawCheckRun>,
}

fn check_status(run: &RawCheckRun) -> CiStatus {
    match run.conclusion.as_deref() {
        Some("success") => CiStatus::Pass,
        Some("failure") | Some("cancelled") | Some("timed_out") => CiStatus::Fail,
        _ => match run.status.as_str() {
            "queued" | "in_progress" => CiStatus::Pending,
            _ => CiStatus::Unknown,
        },
    }
}

fn checks_from(raw: RawCheckRuns) -> CheckReport {
    CheckReport::from_runs(
        raw.check_runs
            .into_iter()
            .map(|run| CheckRun {
                status: check_status(&run),
                name: run.name,
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    in_reply_to_id: Option<u64>,
    user: Option<RawUser>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    path: String,
    line: Option<u64>,
}

/// Nest replies under the comment that started the thread. Replies to an
/// unknown comment are kept as top-level entries.
fn thread_comments(raw: Vec<RawComment>) -> Vec<Comment> {
    let roots: HashSet<u64> = raw
        .iter()
        .filter(|c| c.in_reply_to_id.is_none())
        .map(|c| c.id)
        .collect();

    let mut top = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();
    let mut replies: Vec<(u64, Comment)> = Vec::new();

    for c in raw {
        let parent = c.in_reply_to_id.filter(|p| roots.contains(p));
        let id = c.id;
        let comment = Comment {
            author: login(c.user),
            body: c.body,
            path: c.path,
            line: c.line,
            is_unread: true,
            replies: Vec::new(),
        };
        match parent {
            Some(parent) => replies.push((parent, comment)),
            None => {
                index.insert(id, top.len());
                top.push(comment);
            }
        }
    }

    for (parent, reply) in replies {
        if let Some(&i) = index.get(&parent) {
            top[i].replies.push(reply);
        }
    }
    top
}

#[derive(Debug, Deserialize)]
struct RawFile {
    filename: String,
    patch: Option<String>,
}

fn files_from(raw: Vec<RawFile>) -> Vec<DiffFile> {
    raw.into_iter()
        .map(|f| DiffFile {
            filename: f.filename,
            patch: f.patch.unwrap_or_default(),
        })
        .collect()
}

#[async_trait]
impl ReviewService for GitHub {
    fn name(&self) -> &str {
        &self.host
    }

    async fn current_user(&self) -> Result<String> {
        let user = self.client.current().user().await?;
        Ok(user.login)
    }

    async fn list_candidate_prs(
        &self,
        owner: &str,
        name: &str,
        user: &str,
    ) -> Result<Vec<PrSummary>> {
        let (open, search_hits) = tokio::try_join!(
            self.list_open_prs(owner, name),
            self.review_requested_numbers(owner, name, user)
        )?;

        Ok(open
            .into_iter()
            .map(|pr| summary_from(pr, user, &search_hits))
            .collect())
    }

    async fn fetch_reviews(&self, owner: &str, name: &str, number: u64) -> Result<Vec<Review>> {
        let route = format!("/repos/{}/{}/pulls/{}/reviews", owner, name, number);
        Ok(reviews_from(self.get_all(&route).await?))
    }

    async fn fetch_check_runs(&self, owner: &str, name: &str, sha: &str) -> Result<CheckReport> {
        let route = format!(
            "/repos/{}/{}/commits/{}/check-runs?per_page={}",
            owner, name, sha, PER_PAGE
        );
        let raw: RawCheckRuns = self.client.get(&route, None::<&()>).await?;
        Ok(checks_from(raw))
    }

    async fn fetch_comments(&self, owner: &str, name: &str, number: u64) -> Result<Vec<Comment>> {
        let route = format!("/repos/{}/{}/pulls/{}/comments", owner, name, number);
        Ok(thread_comments(self.get_all(&route).await?))
    }

    async fn fetch_diff(&self, owner: &str, name: &str, number: u64) -> Result<Vec<DiffFile>> {
        let route = format!("/repos/{}/{}/pulls/{}/files", owner, name, number);
        Ok(files_from(self.get_all(&route).await?))
    }
}
