//! Immutable train/test partitions of a ratings dataset.
use std::cmp;
use std::collections::{HashMap, HashSet};

use data::{CompressedRatings, Rating, Ratings};
use {ItemId, UserId};

/// Holds the training subset, visible to recommenders, and the test subset,
/// used only to resolve simulated reactions.
#[derive(Clone, Debug)]
pub struct RatingStore {
    num_users: usize,
    num_items: usize,
    train: CompressedRatings,
    train_items: Vec<Vec<ItemId>>,
    test: Vec<HashMap<ItemId, f32>>,
    test_len: usize,
}

impl RatingStore {
    /// Build the store. Training rows for a `(user, item)` pair that also
    /// appears in the test subset are dropped.
    pub fn new(train: &Ratings, test: &Ratings) -> Self {
        let num_users = cmp::max(train.num_users(), test.num_users());
        let num_items = cmp::max(train.num_items(), test.num_items());

        // Later duplicates overwrite earlier ones.
        let mut test_map: Vec<HashMap<ItemId, f32>> = vec![HashMap::new(); num_users];
        for rating in test.data() {
            test_map[rating.user_id()].insert(rating.item_id(), rating.rating());
        }
        let test_len: usize = test_map.iter().map(|x| x.len()).sum();

        let mut filtered = Ratings::new(num_users, num_items);
        let mut leaked: usize = 0;
        for rating in train.data() {
            if test_map[rating.user_id()].contains_key(&rating.item_id()) {
                leaked += 1;
            } else {
                filtered.push(rating.clone());
            }
        }
        if leaked > 0 {
            warn!(leaked, "dropped training ratings also present in the test subset");
        }

        let train = filtered.to_compressed();
        let train_items = train
            .iter_users()
            .map(|user| {
                let mut items = user.item_ids.to_vec();
                items.dedup();
                items
            })
            .collect();

        debug!(
            num_users,
            num_items,
            train = train.len(),
            test = test_len,
            "built rating store"
        );

        RatingStore {
            num_users,
            num_items,
            train,
            train_items,
            test: test_map,
            test_len,
        }
    }

    /// Number of users in either subset.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// Number of items in either subset.
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Whether `user_id` is within the store.
    pub fn contains_user(&self, user_id: UserId) -> bool {
        user_id < self.num_users
    }

    /// Number of training triplets kept.
    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    /// Number of distinct `(user, item)` test pairs.
    pub fn test_len(&self) -> usize {
        self.test_len
    }

    /// Ground-truth rating for the pair, if the test subset has one.
    pub fn test_rating(&self, user_id: UserId, item_id: ItemId) -> Option<f32> {
        self.test
            .get(user_id)
            .and_then(|ratings| ratings.get(&item_id))
            .cloned()
    }

    /// Iterate over a user's `(item, rating)` test pairs in arbitrary order.
    pub fn test_ratings<'a>(&'a self, user_id: UserId) -> impl Iterator<Item = (ItemId, f32)> + 'a {
        self.test
            .get(user_id)
            .into_iter()
            .flat_map(|ratings| ratings.iter().map(|(&item_id, &rating)| (item_id, rating)))
    }

    /// Distinct items the user rated in the training subset, sorted.
    pub fn train_items(&self, user_id: UserId) -> &[ItemId] {
        self.train_items
            .get(user_id)
            .map_or(&[][..], |items| items.as_slice())
    }

    /// Iterate over all training triplets in user order.
    pub fn iter_train<'a>(&'a self) -> impl Iterator<Item = Rating> + 'a {
        self.train.iter_users().flat_map(|user| {
            let user_id = user.user_id;
            user.item_ids
                .iter()
                .zip(user.ratings.iter())
                .map(move |(&item_id, &rating)| Rating::new(user_id, item_id, rating, 0))
        })
    }

    /// Iterate over all users in id order.
    pub fn users(&self) -> ::std::ops::Range<UserId> {
        0..self.num_users
    }

    /// Number of distinct items in the test subset.
    pub fn distinct_test_items(&self) -> usize {
        self.test
            .iter()
            .flat_map(|ratings| ratings.keys())
            .collect::<HashSet<_>>()
            .len()
    }
}
