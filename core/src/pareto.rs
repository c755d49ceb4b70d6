//! Pareto classifier — rank by avoided volume and cut the priority set.
//!
//! Rows are sorted by avoided volume (descending), ties by subchannel
//! name (ascending). The priority set is the longest prefix whose
//! cumulative share stays at or below the threshold. No row is forced
//! in: when the top row alone exceeds the threshold, the set is empty.

use crate::{
    batch::ResultTable,
    projection::ResultRow,
    types::Subchannel,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRow {
    pub rank:           usize,
    pub row:            ResultRow,
    pub cumulative:     u64,
    pub cumulative_pct: f64,
    pub priority:       bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoOutcome {
    pub ranked:        Vec<RankedRow>,
    pub priority_set:  Vec<Subchannel>,
    pub total:         u64,
    pub threshold_pct: f64,
}

/// Headline figures for the ranked table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoSummary {
    pub total_avoided:         u64,
    pub subchannel_count:      usize,
    pub priority_count:        usize,
    pub priority_subchannels:  Vec<Subchannel>,
    pub priority_avoided:      u64,
    pub priority_share_pct:    f64,
    pub threshold_pct:         f64,
}

pub fn classify(table: &ResultTable, threshold_pct: f64) -> ParetoOutcome {
    let mut rows: Vec<ResultRow> = table.rows.clone();
    rows.sort_by(|a, b| {
        b.avoided_volume
            .cmp(&a.avoided_volume)
            .then_with(|| a.subchannel.cmp(&b.subchannel))
    });

    let total = rows.iter().fold(0u64, |acc, r| acc.saturating_add(r.avoided_volume));

    let mut running: u64 = 0;
    let mut in_prefix = total > 0;
    let mut ranked = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        running = running.saturating_add(row.avoided_volume);
        let cumulative_pct = if total > 0 {
            100.0 * running as f64 / total as f64
        } else {
            0.0
        };
        in_prefix = in_prefix && cumulative_pct <= threshold_pct;
        ranked.push(RankedRow {
            rank: i + 1,
            row,
            cumulative: running,
            cumulative_pct,
            priority: in_prefix,
        });
    }

    let priority_set = ranked
        .iter()
        .filter(|r| r.priority)
        .map(|r| r.row.subchannel.clone())
        .collect();

    ParetoOutcome { ranked, priority_set, total, threshold_pct }
}

impl ParetoOutcome {
    pub fn priority_rows(&self) -> impl Iterator<Item = &RankedRow> {
        self.ranked.iter().filter(|r| r.priority)
    }

    pub fn summary(&self) -> ParetoSummary {
        let priority_avoided = self
            .priority_rows()
            .fold(0u64, |acc, r| acc.saturating_add(r.row.avoided_volume));
        let priority_share_pct = if self.total > 0 {
            100.0 * priority_avoided as f64 / self.total as f64
        } else {
            0.0
        };
        ParetoSummary {
            total_avoided: self.total,
            subchannel_count: self.ranked.len(),
            priority_count: self.priority_set.len(),
            priority_subchannels: self.priority_set.clone(),
            priority_avoided,
            priority_share_pct,
            threshold_pct: self.threshold_pct,
        }
    }
}
