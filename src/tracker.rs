//! Per-user bookkeeping of which items may still be recommended.
use std::collections::HashSet;

use store::RatingStore;
use {ItemId, UserId};

#[derive(Clone, Debug)]
struct UserCandidates {
    // All items minus the user's training items.
    unrated: Vec<ItemId>,
    // `unrated` minus everything already recommended.
    available: Vec<ItemId>,
    recommended: HashSet<ItemId>,
}

/// Tracks which items have been shown to every user.
///
/// Items a user rated in the training subset are never eligible. With
/// repetition disabled, each recommended item also leaves the user's
/// eligible set for good.
#[derive(Clone, Debug)]
pub struct CandidateTracker {
    num_items: usize,
    users: Vec<UserCandidates>,
}

impl CandidateTracker {
    /// Start with nothing recommended.
    pub fn new(store: &RatingStore) -> Self {
        let num_items = store.num_items();

        let users = store
            .users()
            .map(|user_id| {
                let rated = store.train_items(user_id);
                let unrated: Vec<ItemId> = (0..num_items)
                    .filter(|item_id| rated.binary_search(item_id).is_err())
                    .collect();

                UserCandidates {
                    available: unrated.clone(),
                    unrated,
                    recommended: HashSet::new(),
                }
            })
            .collect();

        CandidateTracker { num_items, users }
    }

    /// Number of users tracked.
    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    /// Number of items in the catalogue.
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Whether `user_id` is tracked.
    pub fn contains_user(&self, user_id: UserId) -> bool {
        user_id < self.users.len()
    }

    /// Sorted items the user may be recommended. Empty for unknown users.
    pub fn eligible_items(&self, user_id: UserId, allow_repetition: bool) -> &[ItemId] {
        match self.users.get(user_id) {
            Some(user) if allow_repetition => user.unrated.as_slice(),
            Some(user) => user.available.as_slice(),
            None => &[],
        }
    }

    /// Record that `item_id` was shown to the user. Idempotent.
    pub fn mark_recommended(&mut self, user_id: UserId, item_id: ItemId) {
        if let Some(user) = self.users.get_mut(user_id) {
            if user.recommended.insert(item_id) {
                if let Ok(idx) = user.available.binary_search(&item_id) {
                    user.available.remove(idx);
                }
            }
        }
    }

    /// Whether `item_id` was ever recommended to the user.
    pub fn was_recommended(&self, user_id: UserId, item_id: ItemId) -> bool {
        self.users
            .get(user_id)
            .map_or(false, |user| user.recommended.contains(&item_id))
    }

    /// Number of distinct items recommended to the user.
    pub fn num_recommended(&self, user_id: UserId) -> usize {
        self.users
            .get(user_id)
            .map_or(0, |user| user.recommended.len())
    }

    /// Whether the user has nothing left to be recommended.
    pub fn is_full(&self, user_id: UserId, allow_repetition: bool) -> bool {
        self.eligible_items(user_id, allow_repetition).is_empty()
    }

    /// Users that are not full, in id order.
    pub fn eligible_users(&self, allow_repetition: bool) -> Vec<UserId> {
        (0..self.users.len())
            .filter(|&user_id| !self.is_full(user_id, allow_repetition))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data::{Rating, Ratings};

    fn tracker() -> CandidateTracker {
        let train = Ratings::from(vec![
            Rating::new(0, 0, 1.0, 0),
            Rating::new(0, 1, 1.0, 0),
            Rating::new(1, 3, -1.0, 0),
        ]);
        let test = Ratings::from(vec![Rating::new(2, 2, 1.0, 0)]);

        CandidateTracker::new(&RatingStore::new(&train, &test))
    }

    #[test]
    fn training_items_are_never_eligible() {
        let tracker = tracker();

        assert_eq!(tracker.eligible_items(0, false), &[2, 3]);
        assert_eq!(tracker.eligible_items(0, true), &[2, 3]);
        assert_eq!(tracker.eligible_items(1, false), &[0, 1, 2]);
        assert_eq!(tracker.eligible_items(2, false), &[0, 1, 2, 3]);
        assert!(tracker.eligible_items(3, false).is_empty());
    }

    #[test]
    fn marking_is_idempotent_and_only_shrinks() {
        let mut tracker = tracker();

        tracker.mark_recommended(2, 1);
        tracker.mark_recommended(2, 1);

        assert_eq!(tracker.eligible_items(2, false), &[0, 2, 3]);
        assert_eq!(tracker.eligible_items(2, true), &[0, 1, 2, 3]);
        assert_eq!(tracker.num_recommended(2), 1);
        assert!(tracker.was_recommended(2, 1));
        assert!(!tracker.was_recommended(1, 1));
    }

    #[test]
    fn users_become_full() {
        let mut tracker = tracker();

        tracker.mark_recommended(0, 2);
        assert!(!tracker.is_full(0, false));
        tracker.mark_recommended(0, 3);
        assert!(tracker.is_full(0, false));
        assert!(!tracker.is_full(0, true));

        assert_eq!(tracker.eligible_users(false), vec![1, 2]);
        assert_eq!(tracker.eligible_users(true), vec![0, 1, 2]);
        assert!(tracker.is_full(9, true));
    }
}
