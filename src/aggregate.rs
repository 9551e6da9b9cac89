use std::collections::BTreeMap;

use crate::models::{Answer, RatingDistribution};
use crate::rating::Rating;

/// Running totals for one group of answers. Averages are derived on demand
/// and never rounded here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStats {
    pub sum: u64,
    pub count: usize,
    pub distribution: RatingDistribution,
}

impl GroupStats {
    pub fn record(&mut self, rating: Rating) {
        self.sum += u64::from(rating.value());
        self.count += 1;
        self.distribution.record(rating);
    }

    pub fn merge(&mut self, other: &GroupStats) {
        self.sum += other.sum;
        self.count += other.count;
        self.distribution.merge(&other.distribution);
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

pub fn aggregate_by<K, F>(answers: &[Answer], mut key_fn: F) -> BTreeMap<K, GroupStats>
where
    K: Ord,
    F: FnMut(&Answer) -> K,
{
    aggregate_where(answers, |answer| Some(key_fn(answer)))
}

/// Groups answers by key, leaving out any answer whose key is `None`.
pub fn aggregate_where<K, F>(answers: &[Answer], mut key_fn: F) -> BTreeMap<K, GroupStats>
where
    K: Ord,
    F: FnMut(&Answer) -> Option<K>,
{
    let mut groups: BTreeMap<K, GroupStats> = BTreeMap::new();

    for answer in answers {
        let Some(key) = key_fn(answer) else {
            continue;
        };
        groups.entry(key).or_default().record(answer.rating);
    }

    groups
}

pub fn overall(answers: &[Answer]) -> GroupStats {
    let mut stats = GroupStats::default();
    for answer in answers {
        stats.record(answer.rating);
    }
    stats
}
