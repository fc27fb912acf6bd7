//! Rating triplets, splits and the compressed per-user representation.
use std;
use std::cmp::Ordering;
use std::hash::Hasher;

use ndarray::Array2;
use rand::Rng;

use siphasher::sip::SipHasher;

use super::{ItemId, Timestamp, UserId};

/// A single `<user, item, outcome>` triplet.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Rating {
    user_id: UserId,
    item_id: ItemId,
    rating: f32,
    timestamp: Timestamp,
}

impl Rating {
    /// Build a new triplet.
    pub fn new(user_id: UserId, item_id: ItemId, rating: f32, timestamp: Timestamp) -> Self {
        Rating {
            user_id,
            item_id,
            rating,
            timestamp,
        }
    }

    /// Return the user id.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
    /// Return the item id.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }
    /// Return the raw rating value.
    pub fn rating(&self) -> f32 {
        self.rating
    }
    /// Return the timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Uniformly random split. Returns `(train, test)`.
pub fn train_test_split<R: Rng>(
    ratings: &mut Ratings,
    rng: &mut R,
    test_fraction: f32,
) -> (Ratings, Ratings) {
    ratings.shuffle(rng);

    let (test, train) = ratings.split_at((test_fraction * ratings.len() as f32) as usize);

    (train, test)
}

/// Split placing all of a user's ratings on the same side. Returns `(train, test)`.
pub fn user_based_split<R: Rng>(
    ratings: &mut Ratings,
    rng: &mut R,
    test_fraction: f32,
) -> (Ratings, Ratings) {
    let denominator = 100_000;
    let train_cutoff = (test_fraction * denominator as f32) as u64;

    let (key_0, key_1) = (rng.gen::<u64>(), rng.gen::<u64>());

    let is_train = |x: &Rating| {
        let mut hasher = SipHasher::new_with_keys(key_0, key_1);
        hasher.write_usize(x.user_id());
        hasher.finish() % denominator > train_cutoff
    };

    ratings.split_by(is_train)
}

/// A collection of rating triplets together with the dataset shape.
#[derive(Clone, Debug, Default)]
pub struct Ratings {
    num_users: usize,
    num_items: usize,
    ratings: Vec<Rating>,
}

impl Ratings {
    /// Empty collection of the given shape.
    pub fn new(num_users: usize, num_items: usize) -> Self {
        Ratings {
            num_users,
            num_items,
            ratings: Vec::new(),
        }
    }

    /// Build triplets from a dense user x item grid. `NaN` cells are
    /// treated as missing ratings.
    pub fn from_matrix(matrix: &Array2<f32>) -> Self {
        let (num_users, num_items) = matrix.dim();

        let ratings = iproduct!(0..num_users, 0..num_items)
            .filter_map(|(user_id, item_id)| {
                let value = matrix[(user_id, item_id)];

                if value.is_nan() {
                    None
                } else {
                    Some(Rating::new(user_id, item_id, value, 0))
                }
            })
            .collect();

        Ratings {
            num_users,
            num_items,
            ratings,
        }
    }

    /// Add a triplet, growing the shape to fit it.
    pub fn push(&mut self, rating: Rating) {
        self.num_users = std::cmp::max(self.num_users, rating.user_id() + 1);
        self.num_items = std::cmp::max(self.num_items, rating.item_id() + 1);
        self.ratings.push(rating);
    }

    /// Return the underlying triplets.
    pub fn data(&self) -> &[Rating] {
        &self.ratings
    }

    /// Number of triplets.
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    /// Whether there are no triplets.
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Shuffle the triplets in place.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        rng.shuffle(&mut self.ratings);
    }

    /// Apply `func` to every rating value, e.g. to binarise a 1-5 scale.
    pub fn map_ratings<F: Fn(f32) -> f32>(mut self, func: F) -> Self {
        for rating in &mut self.ratings {
            rating.rating = func(rating.rating);
        }

        self
    }

    /// Split into triplets before and after `idx`.
    pub fn split_at(&self, idx: usize) -> (Self, Self) {
        let head = Ratings {
            num_users: self.num_users,
            num_items: self.num_items,
            ratings: self.ratings[..idx].to_owned(),
        };
        let tail = Ratings {
            num_users: self.num_users,
            num_items: self.num_items,
            ratings: self.ratings[idx..].to_owned(),
        };

        (head, tail)
    }

    /// Split into triplets for which `func` holds and the rest.
    pub fn split_by<F: Fn(&Rating) -> bool>(&self, func: F) -> (Self, Self) {
        let (head, tail): (Vec<Rating>, Vec<Rating>) =
            self.ratings.iter().cloned().partition(|x| func(x));

        (
            Ratings {
                num_users: self.num_users,
                num_items: self.num_items,
                ratings: head,
            },
            Ratings {
                num_users: self.num_users,
                num_items: self.num_items,
                ratings: tail,
            },
        )
    }

    /// Convert into the per-user compressed representation.
    pub fn to_compressed(&self) -> CompressedRatings {
        CompressedRatings::from(self)
    }

    /// Number of users.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// Number of items.
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Return `(num_users, num_items)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_users, self.num_items)
    }
}

impl From<Vec<Rating>> for Ratings {
    fn from(data: Vec<Rating>) -> Ratings {
        let num_users = data.iter().map(|x| x.user_id() + 1).max().unwrap_or(0);
        let num_items = data.iter().map(|x| x.item_id() + 1).max().unwrap_or(0);

        Ratings {
            num_users,
            num_items,
            ratings: data,
        }
    }
}

fn cmp_user_item(x: &Rating, y: &Rating) -> Ordering {
    x.user_id()
        .cmp(&y.user_id())
        .then(x.item_id().cmp(&y.item_id()))
        .then(x.timestamp().cmp(&y.timestamp()))
}

/// Ratings grouped by user, items sorted by id within each user.
#[derive(Clone, Debug)]
pub struct CompressedRatings {
    num_users: usize,
    num_items: usize,
    user_pointers: Vec<usize>,
    item_ids: Vec<ItemId>,
    ratings: Vec<f32>,
}

impl<'a> From<&'a Ratings> for CompressedRatings {
    fn from(ratings: &Ratings) -> CompressedRatings {
        let mut data = ratings.data().to_owned();

        data.sort_by(cmp_user_item);

        let mut user_pointers = vec![0; ratings.num_users + 1];
        let mut item_ids = Vec::with_capacity(data.len());
        let mut values = Vec::with_capacity(data.len());

        for datum in &data {
            item_ids.push(datum.item_id());
            values.push(datum.rating());

            user_pointers[datum.user_id() + 1] += 1;
        }

        for idx in 1..user_pointers.len() {
            user_pointers[idx] += user_pointers[idx - 1];
        }

        CompressedRatings {
            num_users: ratings.num_users,
            num_items: ratings.num_items,
            user_pointers,
            item_ids,
            ratings: values,
        }
    }
}

impl CompressedRatings {
    /// Iterate over all users, including those without ratings.
    pub fn iter_users(&self) -> CompressedRatingsUserIterator {
        CompressedRatingsUserIterator {
            ratings: &self,
            idx: 0,
        }
    }

    /// Ratings of a single user, `None` if out of range.
    pub fn get_user(&self, user_id: UserId) -> Option<CompressedRatingsUser> {
        if user_id >= self.num_users {
            return None;
        }

        let start = self.user_pointers[user_id];
        let stop = self.user_pointers[user_id + 1];

        Some(CompressedRatingsUser {
            user_id,
            item_ids: &self.item_ids[start..stop],
            ratings: &self.ratings[start..stop],
        })
    }

    /// Number of triplets.
    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    /// Number of users.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// Number of items.
    pub fn num_items(&self) -> usize {
        self.num_items
    }
}

/// Iterator over the users of [`CompressedRatings`](struct.CompressedRatings.html).
pub struct CompressedRatingsUserIterator<'a> {
    ratings: &'a CompressedRatings,
    idx: usize,
}

/// Ratings of a single user, sorted by item.
#[derive(Debug)]
pub struct CompressedRatingsUser<'a> {
    /// Id of the user.
    pub user_id: UserId,
    /// Rated items, sorted.
    pub item_ids: &'a [ItemId],
    /// Rating values, aligned with `item_ids`.
    pub ratings: &'a [f32],
}

impl<'a> Iterator for CompressedRatingsUserIterator<'a> {
    type Item = CompressedRatingsUser<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        let value = self.ratings.get_user(self.idx);

        self.idx += 1;

        value
    }
}
