use chrono::{DateTime, Utc};

use crate::types::{Review, ReviewState, ReviewVerdict};

/// Classify where `current_user` stands on a PR.
///
/// Only the user's own non-comment reviews count. The freshness check runs
/// before the verdict check, so a PR updated after an approval is `Upd`.
pub fn classify(current_user: &str, reviews: &[Review], pr_updated_at: DateTime<Utc>) -> ReviewState {
    let last = reviews
        .iter()
        .filter(|r| r.author == current_user && r.state != ReviewVerdict::Commented)
        .fold(None::<&Review>, |latest, r| match latest {
            Some(l) if l.created_at > r.created_at => Some(l),
            _ => Some(r),
        });

    let Some(last) = last else {
        return ReviewState::New;
    };

    if pr_updated_at > last.created_at {
        ReviewState::Upd
    } else if last.state == ReviewVerdict::Approved {
        ReviewState::Done
    } else {
        ReviewState::Chg
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::types::fixtures::{at, review};

    #[test]
    fn no_reviews_is_new() {
        assert_eq!(classify("alice", &[], at(0)), ReviewState::New);
    }

    #[test]
    fn only_other_users_or_comments_is_new() {
        let reviews = vec![
            review("bob", "APPROVED", at(5)),
            review("alice", "COMMENTED", at(6)),
            review("carol", "CHANGES_REQUESTED", at(7)),
        ];
        assert_eq!(classify("alice", &reviews, at(0)), ReviewState::New);
    }

    #[test]
    fn approved_and_untouched_is_done() {
        let t0 = at(30);
        let reviews = vec![review("alice", "APPROVED", t0)];
        assert_eq!(
            classify("alice", &reviews, t0 - Duration::minutes(1)),
            ReviewState::Done
        );
    }

    #[test]
    fn approved_then_updated_is_upd() {
        let t0 = at(30);
        let reviews = vec![review("alice", "APPROVED", t0)];
        assert_eq!(
            classify("alice", &reviews, t0 + Duration::minutes(1)),
            ReviewState::Upd
        );
    }

    #[test]
    fn changes_requested_is_chg() {
        let t0 = at(30);
        let reviews = vec![review("alice", "CHANGES_REQUESTED", t0)];
        assert_eq!(
            classify("alice", &reviews, t0 - Duration::minutes(1)),
            ReviewState::Chg
        );
    }

    #[test]
    fn updated_at_equal_to_review_is_not_upd() {
        let t0 = at(30);
        let reviews = vec![review("alice", "APPROVED", t0)];
        assert_eq!(classify("alice", &reviews, t0), ReviewState::Done);
    }

    #[test]
    fn latest_qualifying_review_wins_regardless_of_order() {
        let reviews = vec![
            review("alice", "APPROVED", at(40)),
            review("alice", "CHANGES_REQUESTED", at(20)),
            review("alice", "COMMENTED", at(50)),
        ];
        assert_eq!(classify("alice", &reviews, at(10)), ReviewState::Done);
    }

    #[test]
    fn dismissed_review_counts_as_changes() {
        let reviews = vec![review("alice", "DISMISSED", at(20))];
        assert_eq!(classify("alice", &reviews, at(10)), ReviewState::Chg);
    }
}
