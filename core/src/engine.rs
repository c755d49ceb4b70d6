//! The calculation engine — entry point for every calculation.
//!
//! PIPELINE (fixed order):
//!   1. Metric aggregation     (aggregator)
//!   2. Ratio derivation       (ratio)
//!   3. Rate resolution        (retention)
//!   4. Projection             (projection, one entity)
//!   5. Batch evaluation       (batch, all subchannels of a segment)
//!   6. Pareto classification  (pareto)
//!
//! RULES:
//!   - The engine owns validated config and derived lookup tables.
//!   - Records arrive as an immutable snapshot; the engine never mutates it.
//!   - Results are rebuilt from scratch on every call. Nothing is cached.

use crate::{
    aggregator::{aggregate, Scope},
    batch::{evaluate_all, ResultTable},
    category::{CategoryKey, CategoryRegistry},
    config::{Assumption, CalcConfig},
    error::CalcResult,
    pareto::{classify, ParetoOutcome, ParetoSummary},
    projection::{Entity, Projector, ResultRow},
    ratio::{self, Derived},
    retention::{ConversionTable, RetentionTable},
    snapshot::{RawRecord, Record, RecordSnapshot},
    types::{Period, Segment, Subchannel},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One "calculate" action: a segment, optionally a highlighted subchannel,
/// optionally a single period, and the expected transaction volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub segment:         Segment,
    #[serde(default)]
    pub subchannel:      Option<Subchannel>,
    #[serde(default)]
    pub period:          Option<Period>,
    pub expected_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub request:  ScenarioRequest,
    pub selected: Option<ResultRow>,
    pub table:    ResultTable,
    pub pareto:   ParetoOutcome,
    pub summary:  ParetoSummary,
}

pub struct CalcEngine {
    config:     CalcConfig,
    registry:   CategoryRegistry,
    retention:  RetentionTable,
    conversion: ConversionTable,
    records:    Arc<RecordSnapshot>,
}

impl CalcEngine {
    pub fn new(config: CalcConfig, records: Arc<RecordSnapshot>) -> CalcResult<Self> {
        config.validate()?;
        let registry = CategoryRegistry::build(&config.categories)?;
        let retention = RetentionTable::new(&config.retention)?;
        let conversion = ConversionTable::new(&config.conversion);
        log::debug!("engine ready over {} records", records.len());
        Ok(Self { config, registry, retention, conversion, records })
    }

    /// Engine over raw loader rows, applying intake with the config's
    /// eligible kind.
    pub fn from_raw(config: CalcConfig, rows: Vec<RawRecord>) -> CalcResult<Self> {
        let (snapshot, _) = RecordSnapshot::from_raw(rows, &config.eligible_kind);
        Self::new(config, Arc::new(snapshot))
    }

    /// Standard premises over in-memory records. Used by tests and tooling.
    pub fn build_test(records: Vec<Record>) -> CalcResult<Self> {
        Self::new(CalcConfig::standard(), Arc::new(RecordSnapshot::new(records)))
    }

    /// Same premises over a refreshed snapshot.
    pub fn with_records(&self, records: Arc<RecordSnapshot>) -> Self {
        Self {
            config: self.config.clone(),
            registry: self.registry.clone(),
            retention: self.retention.clone(),
            conversion: self.conversion.clone(),
            records,
        }
    }

    pub fn config(&self) -> &CalcConfig {
        &self.config
    }

    pub fn records(&self) -> &RecordSnapshot {
        &self.records
    }

    pub fn assumptions(&self) -> Vec<Assumption> {
        self.config.assumptions()
    }

    // ── Scope discovery ────────────────────────────────────────

    pub fn segments(&self) -> Vec<Segment> {
        self.records.segments()
    }

    pub fn subchannels(&self, segment: &str, period: Option<Period>) -> Vec<Subchannel> {
        self.records.subchannels(segment, period)
    }

    pub fn periods(&self) -> Vec<Period> {
        self.records.periods()
    }

    pub fn entity(&self, segment: &str, subchannel: &str, period: Option<Period>) -> Entity {
        Entity::resolve(&self.records, segment, subchannel, period)
    }

    // ── Components ─────────────────────────────────────────────

    pub fn aggregate(&self, scope: &Scope, category: CategoryKey) -> f64 {
        aggregate(&self.records, scope, self.registry.get(category))
    }

    pub fn throughput_ratio(&self, entity: &Entity) -> Derived {
        ratio::throughput_ratio(&self.records, &self.registry, &entity.scope(), &self.config.throughput)
    }

    pub fn users_per_unit_ratio(&self, entity: &Entity) -> Derived {
        ratio::users_per_unit_ratio(
            &self.records,
            &self.registry,
            &entity.scope(),
            &entity.segment,
            &self.config.users_per_unit,
        )
    }

    pub fn resolve_retention(&self, tribe: &str) -> f64 {
        self.retention.resolve(tribe)
    }

    pub fn resolve_conversion(&self, segment: &str) -> f64 {
        self.conversion.resolve(segment)
    }

    fn projector(&self) -> Projector<'_> {
        Projector {
            records: &self.records,
            registry: &self.registry,
            retention: &self.retention,
            conversion: &self.conversion,
            config: &self.config,
        }
    }

    pub fn project(&self, entity: &Entity, expected_volume: f64) -> CalcResult<ResultRow> {
        self.projector().project(entity, expected_volume)
    }

    pub fn evaluate_all(
        &self,
        segment: &str,
        period: Option<Period>,
        expected_volume: f64,
    ) -> CalcResult<ResultTable> {
        evaluate_all(&self.projector(), segment, period, expected_volume)
    }

    pub fn classify(&self, table: &ResultTable) -> ParetoOutcome {
        classify(table, self.config.pareto.threshold_pct)
    }

    // ── Scenario ───────────────────────────────────────────────

    /// Highlighted projection, full batch, Pareto ranking and summary.
    pub fn run_scenario(&self, request: &ScenarioRequest) -> CalcResult<ScenarioReport> {
        let selected = match &request.subchannel {
            Some(sub) => {
                let entity = self.entity(&request.segment, sub, request.period);
                Some(self.project(&entity, request.expected_volume)?)
            }
            None => None,
        };

        let table = self.evaluate_all(&request.segment, request.period, request.expected_volume)?;
        let pareto = self.classify(&table);
        let summary = pareto.summary();

        log::info!(
            "scenario: {} → {} subchannels, {} in priority set ({:.1}% of {})",
            request.segment,
            summary.subchannel_count,
            summary.priority_count,
            summary.priority_share_pct,
            summary.total_avoided,
        );

        Ok(ScenarioReport { request: request.clone(), selected, table, pareto, summary })
    }
}
