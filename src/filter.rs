use crate::types::{Filter, PullRequest};

/// Narrow the canonical set to what `mode` shows, keeping input order.
pub fn filter<'a>(all: &'a [PullRequest], mode: Filter, current_user: &str) -> Vec<&'a PullRequest> {
    all.iter()
        .filter(|pr| match mode {
            Filter::ReviewRequested => pr.is_review_requested,
            Filter::Authored => pr.author == current_user,
            Filter::All => true,
        })
        .collect()
}
