use crate::api::ApiError;

/// Snapshot taken when a like/follow toggle is applied optimistically.
/// Carries everything needed to either confirm or undo the local mutation
/// once the network call settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingToggle {
    desired: bool,
    prev_flag: bool,
    prev_count: u32,
}

/// Outcome of settling a pending toggle against the server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The optimistic state stands; nothing left to do.
    Confirmed,
    /// The optimistic state was undone. The owning view must also refetch
    /// the entity from the server: the remote state may have moved for
    /// unrelated reasons since the snapshot was taken.
    RolledBack,
}

impl PendingToggle {
    /// Flip `flag` and adjust `count` in place, before any network call.
    /// Returns the snapshot to settle with later.
    pub fn apply(flag: &mut bool, count: &mut u32) -> PendingToggle {
        let prev_flag = *flag;
        let prev_count = *count;
        let desired = !prev_flag;

        *flag = desired;
        *count = if desired {
            prev_count.saturating_add(1)
        } else {
            prev_count.saturating_sub(1)
        };

        PendingToggle {
            desired,
            prev_flag,
            prev_count,
        }
    }

    /// The state the toggle was driving toward: true means the relation was
    /// being created (POST), false that it was being removed (DELETE).
    pub fn desired(&self) -> bool {
        self.desired
    }

    /// Decide what to do with the optimistic state now that the request has
    /// settled. A 409 while creating and a 404 while removing mean the
    /// server was already in the desired state, so the local mutation
    /// stands; every other failure rolls back.
    pub fn settle(&self, outcome: Result<(), &ApiError>) -> Settlement {
        match outcome {
            Ok(()) => Settlement::Confirmed,
            Err(ApiError::Conflict { .. }) if self.desired => Settlement::Confirmed,
            Err(ApiError::NotFound { .. }) if !self.desired => Settlement::Confirmed,
            Err(_) => Settlement::RolledBack,
        }
    }

    /// Restore `flag` and `count` to their pre-toggle values.
    pub fn roll_back(&self, flag: &mut bool, count: &mut u32) {
        *flag = self.prev_flag;
        *count = self.prev_count;
    }
}

/// Confirmed reply creation: the counter moves only after the server write
/// succeeded, never optimistically.
pub fn confirm_reply(replies_count: &mut u32) {
    *replies_count = replies_count.saturating_add(1);
}

/// Confirmed deletion of an owned tweet: the profile's tweet counter never
/// goes negative.
pub fn confirm_delete(tweets_count: &mut u32) {
    *tweets_count = tweets_count.saturating_sub(1);
}
