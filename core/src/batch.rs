//! Batch evaluator — one projection per subchannel of a segment.
//!
//! Projections read only the shared snapshot and write only their own
//! row, so they run in parallel. Output order is subchannel lexical
//! order regardless of scheduling.

use crate::{
    error::CalcResult,
    projection::{check_expected_volume, Entity, Projector, ResultRow},
    types::{Period, Segment, Subchannel},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A subchannel whose projection failed. The rest of the batch still ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFailure {
    pub subchannel: Subchannel,
    pub reason:     String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub segment:  Segment,
    pub period:   Option<Period>,
    pub rows:     Vec<ResultRow>,
    pub failures: Vec<EntityFailure>,
}

impl ResultTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_avoided(&self) -> u64 {
        self.rows.iter().fold(0u64, |acc, r| acc.saturating_add(r.avoided_volume))
    }

    pub fn row(&self, subchannel: &str) -> Option<&ResultRow> {
        self.rows.iter().find(|r| crate::normalize::same_key(&r.subchannel, subchannel))
    }
}

/// Project every subchannel observed under `(segment, period)`.
///
/// A negative or non-finite `expected_volume` is rejected up front; any
/// other per-entity failure is recorded in `failures`.
pub fn evaluate_all(
    projector: &Projector<'_>,
    segment: &str,
    period: Option<Period>,
    expected_volume: f64,
) -> CalcResult<ResultTable> {
    check_expected_volume(expected_volume)?;

    let subchannels = projector.records.subchannels(segment, period);

    let outcomes: Vec<(Subchannel, CalcResult<ResultRow>)> = subchannels
        .par_iter()
        .map(|sub| {
            let entity = Entity::resolve(projector.records, segment, sub, period);
            (sub.clone(), projector.project(&entity, expected_volume))
        })
        .collect();

    let mut table = ResultTable {
        segment: segment.to_string(),
        period,
        ..ResultTable::default()
    };
    for (subchannel, outcome) in outcomes {
        match outcome {
            Ok(row) => table.rows.push(row),
            Err(e) => {
                log::warn!("batch: {segment}/{subchannel} skipped: {e}");
                table.failures.push(EntityFailure { subchannel, reason: e.to_string() });
            }
        }
    }

    log::info!(
        "batch: {segment} period={} → {} rows, {} failures, total avoided {}",
        period.map(|p| p.to_string()).unwrap_or_else(|| "all".into()),
        table.rows.len(),
        table.failures.len(),
        table.total_avoided(),
    );
    Ok(table)
}
