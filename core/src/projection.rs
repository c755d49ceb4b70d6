//! Projection calculator — derived volumes for a single entity.
//!
//! For an entity (segment, subchannel, period) and an expected
//! transaction volume:
//!
//!   access_volume  = expected_volume / throughput_ratio
//!   user_count     = expected_volume / users_per_unit_ratio
//!   avoided_volume = floor(access_volume × conversion × retention + ε)
//!
//! A projection is all-or-nothing: it returns a complete row or an error.

use crate::{
    aggregator::{CategorySums, Scope},
    category::{CategoryKey, CategoryRegistry},
    config::CalcConfig,
    error::{CalcError, CalcResult},
    normalize::scope_key,
    ratio::{throughput_ratio, users_per_unit_ratio, FallbackLevel},
    retention::{ConversionTable, RetentionTable},
    snapshot::RecordSnapshot,
    types::{Period, Segment, Subchannel, Tribe, UNDEFINED_TRIBE},
};
use serde::{Deserialize, Serialize};

/// The unit of computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub segment:    Segment,
    pub subchannel: Subchannel,
    pub period:     Option<Period>,
    pub tribe:      Tribe,
}

impl Entity {
    /// Resolve the entity's tribe: the first non-empty tribe among its
    /// records, in snapshot order, or `UNDEFINED_TRIBE`.
    pub fn resolve(
        records: &RecordSnapshot,
        segment: &str,
        subchannel: &str,
        period: Option<Period>,
    ) -> Self {
        let seg_key = scope_key(segment);
        let sub_key = scope_key(subchannel);
        let tribe = records
            .iter_keyed()
            .filter(|(r, k)| {
                !seg_key.is_empty()
                    && k.segment == seg_key
                    && k.subchannel == sub_key
                    && period.map_or(true, |p| r.period == Some(p))
            })
            .find_map(|(r, _)| r.tribe.clone())
            .unwrap_or_else(|| UNDEFINED_TRIBE.to_string());

        Self {
            segment: segment.to_string(),
            subchannel: subchannel.to_string(),
            period,
            tribe,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::segment(&self.segment)
            .with_subchannel(&self.subchannel)
            .with_period(self.period)
    }
}

/// Derived figures for one entity. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub segment:              Segment,
    pub subchannel:           Subchannel,
    pub tribe:                Tribe,
    pub period:               Option<Period>,
    pub expected_volume:      f64,
    pub sums:                 CategorySums,
    pub throughput_ratio:     f64,
    pub throughput_level:     FallbackLevel,
    pub users_per_unit_ratio: f64,
    pub users_per_unit_level: FallbackLevel,
    pub conversion_rate:      f64,
    pub retention_rate:       f64,
    pub access_volume:        f64,
    pub user_count:           f64,
    pub avoided_volume:       u64,
}

/// Fail fast on a caller contract violation.
pub fn check_expected_volume(expected_volume: f64) -> CalcResult<()> {
    if expected_volume.is_finite() && expected_volume >= 0.0 {
        Ok(())
    } else {
        Err(CalcError::InvalidExpectedVolume { value: expected_volume })
    }
}

/// Everything a projection reads. Shared read-only across batch workers.
pub struct Projector<'a> {
    pub records:    &'a RecordSnapshot,
    pub registry:   &'a CategoryRegistry,
    pub retention:  &'a RetentionTable,
    pub conversion: &'a ConversionTable,
    pub config:     &'a CalcConfig,
}

impl Projector<'_> {
    pub fn project(&self, entity: &Entity, expected_volume: f64) -> CalcResult<ResultRow> {
        check_expected_volume(expected_volume)?;

        // 1. Category sums at entity scope
        let scope = entity.scope();
        let sums = CategorySums::collect(
            self.records,
            &scope,
            self.registry.get(CategoryKey::Transactions),
            self.registry.get(CategoryKey::Accesses),
            self.registry.get(CategoryKey::UniqueUsers),
        );

        // 2. Ratios
        let throughput =
            throughput_ratio(self.records, self.registry, &scope, &self.config.throughput);
        let users_per_unit = users_per_unit_ratio(
            self.records,
            self.registry,
            &scope,
            &entity.segment,
            &self.config.users_per_unit,
        );

        // 3-4. Rates
        let conversion_rate = self.conversion.resolve(&entity.segment);
        let retention_rate = self.retention.resolve(&entity.tribe);

        // 5. Derived volumes
        let access_volume = expected_volume / throughput.value;
        let user_count = expected_volume / users_per_unit.value;
        let raw_avoided = access_volume * conversion_rate * retention_rate;
        let avoided = (raw_avoided + self.config.numeric.epsilon).floor();

        // Anything past u64 range is as unusable as infinity.
        let avoided_in_range = if avoided < u64::MAX as f64 { avoided } else { f64::INFINITY };
        for (field, v) in [
            ("access_volume", access_volume),
            ("user_count", user_count),
            ("avoided_volume", avoided_in_range),
        ] {
            if !v.is_finite() {
                return Err(CalcError::NonFiniteOutput {
                    subchannel: entity.subchannel.clone(),
                    field,
                });
            }
        }

        Ok(ResultRow {
            segment: entity.segment.clone(),
            subchannel: entity.subchannel.clone(),
            tribe: entity.tribe.clone(),
            period: entity.period,
            expected_volume,
            sums,
            throughput_ratio: throughput.value,
            throughput_level: throughput.level,
            users_per_unit_ratio: users_per_unit.value,
            users_per_unit_level: users_per_unit.level,
            conversion_rate,
            retention_rate,
            access_volume,
            user_count,
            avoided_volume: avoided.max(0.0) as u64,
        })
    }
}
