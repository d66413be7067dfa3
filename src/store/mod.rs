mod loader;

use crate::error::{RecommenderError, Result};
use crate::models::{ItemId, Rating, StoreSummary, UserId};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

pub use loader::parse_record;

/// Sparse user x item rating matrix, indexed both by user and by item.
///
/// Immutable once built: every query takes `&self`, so a store behind an `Arc`
/// can be read from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    by_user: BTreeMap<UserId, BTreeMap<ItemId, f64>>,
    by_item: BTreeMap<ItemId, BTreeSet<UserId>>,
    num_ratings: usize,
    value_range: (f64, f64),
}

static NO_RATINGS: BTreeMap<ItemId, f64> = BTreeMap::new();
static NO_RATERS: BTreeSet<UserId> = BTreeSet::new();

impl PreferenceStore {
    /// Parses `user,item,value[,timestamp]` records. The whole load fails on the
    /// first bad record, so a half-built store is never returned.
    pub fn load<R: BufRead>(source: R) -> Result<Self> {
        let mut ratings = Vec::new();

        for (index, line) in source.lines().enumerate() {
            let line = line?;
            if let Some(rating) = parse_record(&line, index + 1)? {
                ratings.push(rating);
            }
        }

        Self::from_ratings(ratings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let store = Self::load(BufReader::new(file))?;

        info!(
            path = %path.display(),
            users = store.num_users(),
            items = store.num_items(),
            ratings = store.num_ratings(),
            "Loaded preference store"
        );

        Ok(store)
    }

    /// Builds a store from in-memory ratings. Later ratings for the same
    /// (user, item) pair overwrite earlier ones.
    pub fn from_ratings<I>(ratings: I) -> Result<Self>
    where
        I: IntoIterator<Item = Rating>,
    {
        let mut store = Self::default();

        for (index, rating) in ratings.into_iter().enumerate() {
            if !rating.value.is_finite() {
                return Err(RecommenderError::malformed(
                    index + 1,
                    format!("rating value {} is not finite", rating.value),
                ));
            }
            store.insert(rating);
        }

        if store.num_ratings == 0 {
            return Err(RecommenderError::EmptyDataset);
        }

        store.value_range = store
            .by_user
            .values()
            .flat_map(|items| items.values().copied())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        Ok(store)
    }

    fn insert(&mut self, rating: Rating) {
        let previous = self
            .by_user
            .entry(rating.user_id)
            .or_default()
            .insert(rating.item_id, rating.value);

        if previous.is_none() {
            self.num_ratings += 1;
            self.by_item
                .entry(rating.item_id)
                .or_default()
                .insert(rating.user_id);
        }
    }

    /// All items rated by `user`; empty for unknown users.
    pub fn ratings_of(&self, user: UserId) -> &BTreeMap<ItemId, f64> {
        self.by_user.get(&user).unwrap_or(&NO_RATINGS)
    }

    /// All users who rated `item`; empty for unknown items.
    pub fn raters_of(&self, item: ItemId) -> &BTreeSet<UserId> {
        self.by_item.get(&item).unwrap_or(&NO_RATERS)
    }

    pub fn rating(&self, user: UserId, item: ItemId) -> Option<f64> {
        self.by_user.get(&user)?.get(&item).copied()
    }

    pub fn contains_user(&self, user: UserId) -> bool {
        self.by_user.contains_key(&user)
    }

    /// Mean of `user`'s ratings; `None` for unknown users.
    pub fn mean_rating(&self, user: UserId) -> Option<f64> {
        let items = self.by_user.get(&user)?;
        Some(items.values().sum::<f64>() / items.len() as f64)
    }

    /// Smallest and largest rating value in the store.
    pub fn value_range(&self) -> (f64, f64) {
        self.value_range
    }

    pub fn all_user_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.by_user.keys().copied()
    }

    pub fn all_item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.by_item.keys().copied()
    }

    pub fn num_users(&self) -> usize {
        self.by_user.len()
    }

    pub fn num_items(&self) -> usize {
        self.by_item.len()
    }

    pub fn num_ratings(&self) -> usize {
        self.num_ratings
    }

    /// Every rating in (user, item) order.
    pub fn iter(&self) -> impl Iterator<Item = Rating> + '_ {
        self.by_user.iter().flat_map(|(&user_id, items)| {
            items
                .iter()
                .map(move |(&item_id, &value)| Rating::new(user_id, item_id, value))
        })
    }

    pub fn summary(&self) -> StoreSummary {
        let (min_value, max_value) = self.value_range;

        StoreSummary {
            num_users: self.num_users(),
            num_items: self.num_items(),
            num_ratings: self.num_ratings,
            min_value,
            max_value,
        }
    }
}
