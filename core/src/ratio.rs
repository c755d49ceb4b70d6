//! Ratio deriver — throughput and users-per-unit ratios.
//!
//! Each ratio walks an ordered fallback chain of scope levels. A level
//! either yields a usable ratio or hands over to the next one; the last
//! level is always a declared constant.
//!
//!   throughput:      Subchannel → Default            (then floored)
//!   users-per-unit:  Subchannel → Segment → Default

use crate::{
    aggregator::{aggregate, Scope},
    category::{CategoryKey, CategoryRegistry},
    config::{lookup, ThroughputConfig, UsersPerUnitConfig},
    snapshot::RecordSnapshot,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLevel {
    Subchannel,
    Segment,
    Default,
}

impl FallbackLevel {
    /// The record scope this level reads, or `None` for the constant level.
    pub fn narrow(&self, entity_scope: &Scope) -> Option<Scope> {
        match self {
            Self::Subchannel => Some(entity_scope.clone()),
            Self::Segment    => Some(entity_scope.without_subchannel()),
            Self::Default    => None,
        }
    }
}

pub const THROUGHPUT_CHAIN: &[FallbackLevel] = &[FallbackLevel::Subchannel, FallbackLevel::Default];

pub const USERS_PER_UNIT_CHAIN: &[FallbackLevel] = &[
    FallbackLevel::Subchannel,
    FallbackLevel::Segment,
    FallbackLevel::Default,
];

/// A ratio together with the level that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Derived {
    pub value: f64,
    pub level: FallbackLevel,
}

/// A level is usable for throughput as soon as it saw any access.
pub fn throughput_usable(_transactions: f64, accesses: f64) -> bool {
    accesses > 0.0
}

/// A level is usable for users-per-unit only when both sums are positive.
pub fn users_per_unit_usable(transactions: f64, unique_users: f64) -> bool {
    transactions > 0.0 && unique_users > 0.0
}

/// `numerator / denominator` read at one data level, when `usable` accepts it.
pub fn evaluate_level(
    records: &RecordSnapshot,
    registry: &CategoryRegistry,
    level: FallbackLevel,
    entity_scope: &Scope,
    numerator: CategoryKey,
    denominator: CategoryKey,
    usable: fn(f64, f64) -> bool,
) -> Option<f64> {
    let scope = level.narrow(entity_scope)?;
    let num = aggregate(records, &scope, registry.get(numerator));
    let den = aggregate(records, &scope, registry.get(denominator));
    if !usable(num, den) {
        return None;
    }
    Some(num / den).filter(|r| r.is_finite())
}

#[allow(clippy::too_many_arguments)]
fn walk_chain(
    chain: &[FallbackLevel],
    records: &RecordSnapshot,
    registry: &CategoryRegistry,
    entity_scope: &Scope,
    numerator: CategoryKey,
    denominator: CategoryKey,
    usable: fn(f64, f64) -> bool,
    default: f64,
) -> Derived {
    for &level in chain {
        if level == FallbackLevel::Default {
            break;
        }
        if let Some(value) =
            evaluate_level(records, registry, level, entity_scope, numerator, denominator, usable)
        {
            return Derived { value, level };
        }
    }
    Derived { value: default, level: FallbackLevel::Default }
}

/// Transactions per access at subchannel scope, never below the floor.
pub fn throughput_ratio(
    records: &RecordSnapshot,
    registry: &CategoryRegistry,
    entity_scope: &Scope,
    cfg: &ThroughputConfig,
) -> Derived {
    let raw = walk_chain(
        THROUGHPUT_CHAIN,
        records,
        registry,
        entity_scope,
        CategoryKey::Transactions,
        CategoryKey::Accesses,
        throughput_usable,
        cfg.default_ratio,
    );
    Derived { value: raw.value.max(cfg.floor), level: raw.level }
}

/// Transactions per unique user, falling back from subchannel to segment
/// to the segment's declared constant (or the global one).
pub fn users_per_unit_ratio(
    records: &RecordSnapshot,
    registry: &CategoryRegistry,
    entity_scope: &Scope,
    segment: &str,
    cfg: &UsersPerUnitConfig,
) -> Derived {
    let default = lookup(&cfg.segment_defaults, segment).unwrap_or(cfg.default_ratio);
    let derived = walk_chain(
        USERS_PER_UNIT_CHAIN,
        records,
        registry,
        entity_scope,
        CategoryKey::Transactions,
        CategoryKey::UniqueUsers,
        users_per_unit_usable,
        default,
    );
    if derived.level != FallbackLevel::Subchannel {
        log::debug!(
            "users_per_unit: {:?} fell back to {:?} ({:.4})",
            entity_scope.subchannel,
            derived.level,
            derived.value,
        );
    }
    derived
}
