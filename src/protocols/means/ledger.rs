//! Per-connection price history.
//!
//! Records are kept ordered by timestamp so a range query walks only the
//! matching records. A timestamp holds at most one price: the first insert
//! for a timestamp wins and later inserts at that timestamp are ignored.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Ordered (timestamp, price) records owned by a single session.
#[derive(Debug, Default)]
pub struct Ledger {
    prices: BTreeMap<i32, i32>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `price` at `timestamp`.
    ///
    /// Returns false when the timestamp already had a price, in which case
    /// the ledger is unchanged.
    pub fn insert(&mut self, timestamp: i32, price: i32) -> bool {
        match self.prices.entry(timestamp) {
            Entry::Vacant(slot) => {
                slot.insert(price);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Mean price over timestamps in `[min_time, max_time]`, truncated
    /// toward zero. An inverted or empty range yields 0.
    pub fn query_average(&self, min_time: i32, max_time: i32) -> i32 {
        if min_time > max_time || self.is_empty() {
            return 0;
        }

        let (sum, count) = self
            .prices
            .range(min_time..=max_time)
            .fold((0i64, 0i64), |(sum, count), (_, &price)| {
                (sum + i64::from(price), count + 1)
            });

        if count == 0 {
            return 0;
        }

        // The mean of i32 values always lies within i32 range.
        (sum / count) as i32
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
