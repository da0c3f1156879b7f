use async_trait::async_trait;

use crate::error::{Result, WatchError};
use crate::types::{CheckReport, Comment, DiffFile, PrDetail, PrSummary, Review};

/// The hosted code-review service, as seen by the sync engine.
#[async_trait]
pub trait ReviewService: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    async fn current_user(&self) -> Result<String>;

    /// Open PRs in `owner/name` that may concern `user`, newest first.
    async fn list_candidate_prs(&self, owner: &str, name: &str, user: &str)
        -> Result<Vec<PrSummary>>;

    async fn fetch_reviews(&self, owner: &str, name: &str, number: u64) -> Result<Vec<Review>>;
    async fn fetch_check_runs(&self, owner: &str, name: &str, sha: &str) -> Result<CheckReport>;
    async fn fetch_comments(&self, owner: &str, name: &str, number: u64) -> Result<Vec<Comment>>;
    async fn fetch_diff(&self, owner: &str, name: &str, number: u64) -> Result<Vec<DiffFile>>;
}

/// Run the four detail sub-fetches concurrently and join them.
///
/// The first failure fails the whole group; the other in-flight requests are
/// dropped and nothing is returned for them.
pub async fn fetch_detail(
    service: &dyn ReviewService,
    owner: &str,
    name: &str,
    number: u64,
    head_sha: &str,
) -> Result<PrDetail> {
    let joined = tokio::try_join!(
        service.fetch_reviews(owner, name, number),
        service.fetch_check_runs(owner, name, head_sha),
        service.fetch_comments(owner, name, number),
        service.fetch_diff(owner, name, number),
    );

    let (reviews, checks, comments, diff_files) =
        joined.map_err(|e| WatchError::partial_detail(number, e))?;

    Ok(PrDetail {
        head_sha: head_sha.to_string(),
        reviews,
        checks,
        comments,
        diff_files,
    })
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use crate::types::{CheckRun, CiStatus};

    /// In-memory service; any sub-fetch named in `failing` errors out.
    #[derive(Debug, Default)]
    pub struct FakeService {
        pub prs: Vec<PrSummary>,
        pub reviews: Vec<Review>,
        pub failing: HashSet<&'static str>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeService {
        fn call(&self, what: &'static str) -> Result<()> {
            self.calls.lock().unwrap().push(what.to_string());
            if self.failing.contains(what) {
                Err(WatchError::Network(format!("{} unavailable", what)))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ReviewService for FakeService {
        fn name(&self) -> &str {
            "fake"
        }

        async fn current_user(&self) -> Result<String> {
            Ok("me".to_string())
        }

        async fn list_candidate_prs(&self, _: &str, _: &str, _: &str) -> Result<Vec<PrSummary>> {
            self.call("list")?;
            Ok(self.prs.clone())
        }

        async fn fetch_reviews(&self, _: &str, _: &str, _: u64) -> Result<Vec<Review>> {
            self.call("reviews")?;
            Ok(self.reviews.clone())
        }

        async fn fetch_check_runs(&self, _: &str, _: &str, _: &str) -> Result<CheckReport> {
            self.call("checks")?;
            Ok(CheckReport::from_runs(vec![CheckRun {
                name: "build".to_string(),
                status: CiStatus::Pass,
            }]))
        }

        async fn fetch_comments(&self, _: &str, _: &str, _: u64) -> Result<Vec<Comment>> {
            self.call("comments")?;
            Ok(vec![])
        }

        async fn fetch_diff(&self, _: &str, _: &str, _: u64) -> Result<Vec<DiffFile>> {
            self.call("diff")?;
            Ok(vec![DiffFile {
                filename: "src/lib.rs".to_string(),
                patch: "@@ -1 +1 @@\n-a\n+b".to_string(),
            }])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeService;
    use super::*;
    use crate::types::fixtures::{at, review};
    use crate::types::CiStatus;

    #[tokio::test]
    async fn all_four_succeed() {
        let service = FakeService {
            reviews: vec![review("me", "APPROVED", at(5))],
            ..FakeService::default()
        };

        let detail = fetch_detail(&service, "o", "r", 3, "abc").await.unwrap();
        assert_eq!(detail.head_sha, "abc");
        assert_eq!(detail.reviews.len(), 1);
        assert_eq!(detail.checks.overall, CiStatus::Pass);
        assert_eq!(detail.diff_files.len(), 1);
    }

    #[tokio::test]
    async fn one_failure_fails_the_group() {
        for failing in ["reviews", "checks", "comments", "diff"] {
            let service = FakeService {
                failing: [failing].into_iter().collect(),
                ..FakeService::default()
            };

            let err = fetch_detail(&service, "o", "r", 3, "abc").await.unwrap_err();
            match err {
                WatchError::PartialDetail { number, source } => {
                    assert_eq!(number, 3);
                    assert!(source.to_string().contains(failing));
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }
}
