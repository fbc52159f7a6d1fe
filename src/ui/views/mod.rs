pub mod explore;
pub mod feed;
pub mod login;
pub mod profile;
pub mod register;
pub mod trends;

use crate::api::{ApiError, Tweet};
use crate::reconcile::{PendingToggle, Settlement};

/// Apply an optimistic like toggle to the tweet at `index` in a view's own
/// list. Returns the tweet id and the snapshot to settle with.
pub(crate) fn toggle_like_at(tweets: &mut [Tweet], index: usize) -> Option<(String, PendingToggle)> {
    let tweet = tweets.get_mut(index)?;
    let pending = PendingToggle::apply(&mut tweet.is_liked_by_me, &mut tweet.likes_count);
    Some((tweet.id.clone(), pending))
}

/// Settle a like toggle in a view's own list. Returns true when the view
/// must refetch from the server (the rollback case). A tweet that is no
/// longer present means the completion is stale; it is dropped silently.
pub(crate) fn settle_like_in(
    tweets: &mut [Tweet],
    tweet_id: &str,
    pending: PendingToggle,
    error: Option<&ApiError>,
) -> bool {
    let Some(tweet) = tweets.iter_mut().find(|t| t.id == tweet_id) else {
        return false;
    };

    let outcome = match error {
        None => Ok(()),
        Some(e) => Err(e),
    };
    match pending.settle(outcome) {
        Settlement::Confirmed => false,
        Settlement::RolledBack => {
            pending.roll_back(&mut tweet.is_liked_by_me, &mut tweet.likes_count);
            true
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::api::{Tweet, UserSummary};
    use chrono::{TimeZone, Utc};

    pub fn tweet(id: &str, author: &str, likes: u32) -> Tweet {
        Tweet {
            id: id.to_string(),
            content: format!("tweet {}", id),
            user_id: format!("uid-{}", author),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            is_liked_by_me: false,
            likes_count: likes,
            replies_count: 0,
            user: UserSummary {
                username: author.to_string(),
                name: author.to_string(),
                image_url: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_like_applies_optimistically() {
        let mut tweets = vec![test_support::tweet("t1", "ada", 3)];

        let (id, pending) = toggle_like_at(&mut tweets, 0).unwrap();

        assert_eq!(id, "t1");
        assert!(pending.desired());
        assert!(tweets[0].is_liked_by_me);
        assert_eq!(tweets[0].likes_count, 4);
    }

    #[test]
    fn test_toggle_like_out_of_bounds() {
        let mut tweets = vec![test_support::tweet("t1", "ada", 3)];
        assert!(toggle_like_at(&mut tweets, 5).is_none());
    }

    #[test]
    fn test_settle_success_keeps_optimistic_state() {
        let mut tweets = vec![test_support::tweet("t1", "ada", 3)];
        let (id, pending) = toggle_like_at(&mut tweets, 0).unwrap();

        let refresh = settle_like_in(&mut tweets, &id, pending, None);

        assert!(!refresh);
        assert!(tweets[0].is_liked_by_me);
        assert_eq!(tweets[0].likes_count, 4);
    }

    #[test]
    fn test_settle_failure_rolls_back_and_requests_refresh() {
        let mut tweets = vec![test_support::tweet("t1", "ada", 3)];
        let (id, pending) = toggle_like_at(&mut tweets, 0).unwrap();

        let error = ApiError::Network {
            message: "timeout".to_string(),
        };
        let refresh = settle_like_in(&mut tweets, &id, pending, Some(&error));

        assert!(refresh);
        assert!(!tweets[0].is_liked_by_me);
        assert_eq!(tweets[0].likes_count, 3);
    }

    #[test]
    fn test_settle_for_missing_tweet_is_dropped() {
        let mut tweets = vec![test_support::tweet("t1", "ada", 3)];
        let (_, pending) = toggle_like_at(&mut tweets, 0).unwrap();

        // The list was refetched meanwhile and the tweet is gone.
        tweets.clear();
        let error = ApiError::Network {
            message: "timeout".to_string(),
        };
        assert!(!settle_like_in(&mut tweets, "t1", pending, Some(&error)));
    }
}
