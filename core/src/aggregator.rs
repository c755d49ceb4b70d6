//! Metric aggregator — scoped sums over the record snapshot.

use crate::{
    category::MatchSet,
    normalize::scope_key,
    snapshot::RecordSnapshot,
    types::Period,
};
use serde::{Deserialize, Serialize};

/// Entity-level record filter. `None` fields are wildcards.
///
/// Segment and subchannel are stored as folded name keys, so
/// "Móvel" and "movel" select the same records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub segment:    Option<String>,
    pub subchannel: Option<String>,
    pub period:     Option<Period>,
}

impl Scope {
    /// Everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn segment(segment: &str) -> Self {
        Self { segment: Some(scope_key(segment)), ..Self::default() }
    }

    pub fn with_subchannel(mut self, subchannel: &str) -> Self {
        self.subchannel = Some(scope_key(subchannel));
        self
    }

    pub fn with_period(mut self, period: Option<Period>) -> Self {
        self.period = period;
        self
    }

    /// Same scope one level wider: subchannel dropped.
    pub fn without_subchannel(&self) -> Self {
        Self { subchannel: None, ..self.clone() }
    }

    fn admits(&self, segment_key: &str, subchannel_key: &str, period: Option<Period>) -> bool {
        key_admits(&self.segment, segment_key)
            && key_admits(&self.subchannel, subchannel_key)
            && self.period.map_or(true, |p| period == Some(p))
    }
}

// An empty filter key matches nothing, an absent one matches everything.
fn key_admits(filter: &Option<String>, key: &str) -> bool {
    match filter {
        None => true,
        Some(f) => !f.is_empty() && f == key,
    }
}

/// Sum of `value` over records inside `scope` whose label belongs to
/// `category`. Zero when nothing matches.
pub fn aggregate(records: &RecordSnapshot, scope: &Scope, category: &MatchSet) -> f64 {
    records
        .iter_keyed()
        .filter(|(r, k)| scope.admits(&k.segment, &k.subchannel, r.period))
        .filter(|(_, k)| category.matches_key(&k.label))
        .map(|(r, _)| r.value)
        .sum()
}

/// The three category sums a projection needs, for one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySums {
    pub transactions: f64,
    pub accesses:     f64,
    pub unique_users: f64,
}

impl CategorySums {
    /// One pass over the snapshot for all three categories.
    pub fn collect(
        records: &RecordSnapshot,
        scope: &Scope,
        transactions: &MatchSet,
        accesses: &MatchSet,
        unique_users: &MatchSet,
    ) -> Self {
        let mut sums = Self::default();
        for (r, k) in records.iter_keyed() {
            if !scope.admits(&k.segment, &k.subchannel, r.period) {
                continue;
            }
            if transactions.matches_key(&k.label) {
                sums.transactions += r.value;
            }
            if accesses.matches_key(&k.label) {
                sums.accesses += r.value;
            }
            if unique_users.matches_key(&k.label) {
                sums.unique_users += r.value;
            }
        }
        sums
    }
}
