use serde::{Deserialize, Serialize};
use crate::{engine::ScenarioRequest, types::Period};

/// Requests a front-end can send to the calculator, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum CalcCommand {
    // ── Scope discovery ───────────────────────────
    Segments,
    Periods,
    Subchannels {
        segment: String,
        #[serde(default)]
        period:  Option<Period>,
    },

    // ── Premises ──────────────────────────────────
    Assumptions,

    // ── Calculation ───────────────────────────────
    Scenario(ScenarioRequest),

    Quit,
}
