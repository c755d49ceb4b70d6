//! Rate resolution and single-entity projection.

use gain_core::{
    config::CalcConfig,
    engine::CalcEngine,
    error::CalcError,
    snapshot::{Record, RecordSnapshot},
    types::{Period, UNDEFINED_TRIBE},
};
use std::sync::Arc;

// ── Helpers ───────────────────────────────────────────────────────

const APP: f64 = 0.916893598;
const BOT: f64 = 0.883475537;
const WEB: f64 = 0.902710768;

fn rec(subchannel: &str, tribe: Option<&str>, label: &str, value: f64) -> Record {
    Record {
        period: Some(Period::new(2024, 5).unwrap()),
        segment: "Móvel".into(),
        subchannel: subchannel.into(),
        tribe: tribe.map(str::to_string),
        category_label: label.into(),
        value,
    }
}

fn engine(records: Vec<Record>) -> CalcEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    CalcEngine::build_test(records).expect("engine")
}

fn meu_app() -> Vec<Record> {
    vec![
        rec("Meu App", Some("App"), "6 - Acessos", 100_000.0),
        rec("Meu App", Some("App"), "7.1 - Transações", 250_000.0),
        rec("Meu App", Some("App"), "8 - Usuários Únicos", 50_000.0),
    ]
}

// ── Retention and conversion ─────────────────────────────────────

/// Dma in any spelling resolves to the Bot rate.
#[test]
fn dma_resolves_to_bot_rate() {
    let e = engine(vec![]);
    for tribe in ["Dma", "DMA", " dma ", "dMa\t"] {
        assert_eq!(e.resolve_retention(tribe), BOT, "tribe {tribe:?}");
    }
    assert_eq!(e.resolve_retention("Dma"), e.resolve_retention("Bot"));
}

/// The Dma redirect wins even when the table carries its own Dma rate.
#[test]
fn dma_override_beats_direct_entry() {
    let mut cfg = CalcConfig::standard();
    cfg.retention.rates.insert("Dma".into(), 0.5);
    let e = CalcEngine::new(cfg, Arc::new(RecordSnapshot::default())).unwrap();
    assert_eq!(e.resolve_retention("Dma"), BOT);
}

/// Known tribes get their own rate; anything else gets the Web rate.
#[test]
fn retention_lookup_and_fallback() {
    let e = engine(vec![]);
    assert_eq!(e.resolve_retention("App"), APP);
    assert_eq!(e.resolve_retention("app "), APP);
    assert_eq!(e.resolve_retention("Bot"), BOT);
    assert_eq!(e.resolve_retention("Web"), WEB);
    assert_eq!(e.resolve_retention("Loja"), WEB);
    assert_eq!(e.resolve_retention(""), WEB);
    assert_eq!(e.resolve_retention(UNDEFINED_TRIBE), WEB);
}

/// Conversion rates follow the segment, with 0.50 for anything unknown.
#[test]
fn conversion_by_segment() {
    let e = engine(vec![]);
    assert_eq!(e.resolve_conversion("Móvel"), 0.4947);
    assert_eq!(e.resolve_conversion("MOVEL"), 0.4947);
    assert_eq!(e.resolve_conversion("Residencial"), 0.4989);
    assert_eq!(e.resolve_conversion("Empresarial"), 0.50);
}

// ── Tribe resolution ─────────────────────────────────────────────

/// The first non-empty tribe among the entity's records wins.
#[test]
fn tribe_is_first_non_null() {
    let e = engine(vec![
        rec("Portal", None, "Acessos", 1.0),
        rec("Portal", Some("Web"), "Transações", 1.0),
        rec("Portal", Some("App"), "Transações", 1.0),
    ]);
    assert_eq!(e.entity("Móvel", "Portal", None).tribe, "Web");
}

/// No tribe anywhere gives the undefined tribe and the fallback rate.
#[test]
fn missing_tribe_is_undefined() {
    let e = engine(vec![rec("Portal", None, "Acessos", 1.0)]);
    let entity = e.entity("Móvel", "Portal", None);
    assert_eq!(entity.tribe, UNDEFINED_TRIBE);
    let row = e.project(&entity, 100.0).unwrap();
    assert_eq!(row.retention_rate, WEB);
}

// ── Projection ───────────────────────────────────────────────────

/// The full chain for one well-populated subchannel.
#[test]
fn projection_for_populated_subchannel() {
    let e = engine(meu_app());
    let row = e.project(&e.entity("Móvel", "Meu App", None), 10_000.0).unwrap();

    assert_eq!(row.throughput_ratio, 2.5);
    assert_eq!(row.users_per_unit_ratio, 5.0);
    assert_eq!(row.access_volume, 4_000.0);
    assert_eq!(row.user_count, 2_000.0);
    assert_eq!(row.conversion_rate, 0.4947);
    assert_eq!(row.retention_rate, APP);
    // 4000 × 0.4947 × 0.916893598 = 1814.349…
    assert_eq!(row.avoided_volume, 1_814);
    assert_eq!(row.sums.accesses, 100_000.0);
    assert_eq!(row.sums.transactions, 250_000.0);
    assert_eq!(row.sums.unique_users, 50_000.0);
}

/// Zero expected volume projects to zero everywhere.
#[test]
fn zero_volume_projects_to_zero() {
    let e = engine(meu_app());
    let row = e.project(&e.entity("Móvel", "Meu App", None), 0.0).unwrap();
    assert_eq!(row.access_volume, 0.0);
    assert_eq!(row.user_count, 0.0);
    assert_eq!(row.avoided_volume, 0);
}

/// Negative or non-finite volume is a caller error.
#[test]
fn invalid_volume_is_rejected() {
    let e = engine(meu_app());
    let entity = e.entity("Móvel", "Meu App", None);
    for v in [-1.0, f64::NAN, f64::INFINITY] {
        assert!(
            matches!(e.project(&entity, v), Err(CalcError::InvalidExpectedVolume { .. })),
            "volume {v} accepted"
        );
    }
}

/// A subchannel with no records still projects, on defaults alone.
#[test]
fn empty_scope_projects_on_defaults() {
    let e = engine(meu_app());
    let row = e.project(&e.entity("Móvel", "Inexistente", None), 1_000.0).unwrap();
    assert_eq!(row.sums.accesses, 0.0);
    assert_eq!(row.throughput_ratio, 1.0);
    assert_eq!(row.access_volume, 1_000.0);
    // Segment level is usable here: 250000 / 50000.
    assert_eq!(row.users_per_unit_ratio, 5.0);
    assert_eq!(row.tribe, UNDEFINED_TRIBE);
}

/// 100 × 0.29 is 28.999999999999996 in floating point; the tolerance
/// keeps the floor at 29.
#[test]
fn floor_tolerates_representation_error() {
    let mut cfg = CalcConfig::standard();
    cfg.conversion.rates.insert("Móvel".into(), 0.29);
    cfg.retention.rates.insert("App".into(), 1.0);
    let records = RecordSnapshot::new(vec![rec("X", Some("App"), "Acessos", 0.0)]);
    let e = CalcEngine::new(cfg, Arc::new(records)).unwrap();

    let row = e.project(&e.entity("Móvel", "X", None), 100.0).unwrap();
    assert_eq!(row.avoided_volume, 29);
}

/// A Dma subchannel is projected with the Bot retention rate.
#[test]
fn dma_subchannel_projects_with_bot_rate() {
    let e = engine(vec![rec("URA Digital", Some("Dma"), "Acessos", 10.0)]);
    let row = e.project(&e.entity("Móvel", "URA Digital", None), 100.0).unwrap();
    assert_eq!(row.retention_rate, BOT);
}

/// A user count past f64 range fails the projection instead of leaking inf.
#[test]
fn non_finite_user_count_is_an_error() {
    let e = engine(vec![
        rec("Broken", Some("App"), "Transações", 1e-300),
        rec("Broken", Some("App"), "Usuários Únicos", 1e10),
    ]);
    let err = e.project(&e.entity("Móvel", "Broken", None), 1e12).unwrap_err();
    assert!(matches!(err, CalcError::NonFiniteOutput { field: "user_count", .. }), "{err}");
}

/// Period scoping: a period with no data falls back to defaults.
#[test]
fn period_scope_limits_the_data() {
    let e = engine(meu_app());
    let other = Some(Period::new(2024, 6).unwrap());
    let row = e.project(&e.entity("Móvel", "Meu App", other), 10_000.0).unwrap();
    assert_eq!(row.throughput_ratio, 1.0);
    assert_eq!(row.users_per_unit_ratio, 7.02);
    assert_eq!(row.tribe, UNDEFINED_TRIBE);
}
