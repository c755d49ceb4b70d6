use crate::{
    category::{standard_categories, CategoryDef, CategoryRegistry},
    error::{CalcError, CalcResult},
    normalize::scope_key,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// 72h retention rate per tribe, keyed by display name.
    pub rates: BTreeMap<String, f64>,
    /// Tribe whose lookup is redirected ("Dma").
    pub override_from: String,
    /// Tribe whose rate the redirected tribe receives ("Bot").
    pub override_to: String,
    /// Tribe used for any unknown tribe ("Web").
    pub fallback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Contact-reduction conversion rate per segment.
    pub rates: BTreeMap<String, f64>,
    pub default_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersPerUnitConfig {
    /// Transactions per unique user when no data level is usable.
    pub segment_defaults: BTreeMap<String, f64>,
    pub default_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThroughputConfig {
    /// Minimum transactions per access. Values below are clamped up.
    pub floor: f64,
    /// Ratio used when the access sum is not positive.
    pub default_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericConfig {
    /// Tolerance added before flooring avoided volume.
    pub epsilon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParetoConfig {
    /// Cumulative share (percent) that bounds the priority set.
    pub threshold_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct AssumptionsFile {
    eligible_kind: String,
    retention: RetentionConfig,
    conversion: ConversionConfig,
    users_per_unit: UsersPerUnitConfig,
    throughput: ThroughputConfig,
    numeric: NumericConfig,
    pareto: ParetoConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct CategoriesFile {
    categories: Vec<CategoryDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalcConfig {
    /// Record kind accepted at intake ("Real"). Everything else is dropped.
    pub eligible_kind: String,
    pub retention: RetentionConfig,
    pub conversion: ConversionConfig,
    pub users_per_unit: UsersPerUnitConfig,
    pub throughput: ThroughputConfig,
    pub numeric: NumericConfig,
    pub pareto: ParetoConfig,
    pub categories: Vec<CategoryDef>,
}

/// One fixed premise, as shown next to the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumption {
    pub group: String,
    pub name: String,
    pub value: f64,
}

impl CalcConfig {
    /// Load from a data directory holding `assumptions.json` and
    /// `categories.json`. In tests, use `CalcConfig::standard()`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/assumptions.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: AssumptionsFile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;

        let cat_path = format!("{data_dir}/categories.json");
        let cat_content = std::fs::read_to_string(&cat_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {cat_path}: {e}"))?;
        let cat_file: CategoriesFile = serde_json::from_str(&cat_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {cat_path}: {e}"))?;

        let config = Self {
            eligible_kind: file.eligible_kind,
            retention: file.retention,
            conversion: file.conversion,
            users_per_unit: file.users_per_unit,
            throughput: file.throughput,
            numeric: file.numeric,
            pareto: file.pareto,
            categories: cat_file.categories,
        };
        config.validate()?;
        log::info!("Loaded calculator config from {data_dir}");
        Ok(config)
    }

    /// The premises the calculator ships with.
    pub fn standard() -> Self {
        Self {
            eligible_kind: "Real".into(),
            retention: RetentionConfig {
                rates: [
                    ("App".into(), 0.916893598),
                    ("Bot".into(), 0.883475537),
                    ("Web".into(), 0.902710768),
                ]
                .into(),
                override_from: "Dma".into(),
                override_to: "Bot".into(),
                fallback: "Web".into(),
            },
            conversion: ConversionConfig {
                rates: [
                    ("Móvel".into(), 0.4947),
                    ("Residencial".into(), 0.4989),
                ]
                .into(),
                default_rate: 0.50,
            },
            users_per_unit: UsersPerUnitConfig {
                segment_defaults: [
                    ("Móvel".into(), 7.02),
                    ("Residencial".into(), 12.28),
                ]
                .into(),
                default_ratio: 12.28,
            },
            throughput: ThroughputConfig {
                floor: 1.0,
                default_ratio: 1.0,
            },
            numeric: NumericConfig { epsilon: 1e-9 },
            pareto: ParetoConfig { threshold_pct: 80.0 },
            categories: standard_categories(),
        }
    }

    /// Reject any premise the engine could not honour.
    pub fn validate(&self) -> CalcResult<()> {
        if scope_key(&self.eligible_kind).is_empty() {
            return Err(invalid("eligible_kind is empty".into()));
        }

        for (tribe, rate) in &self.retention.rates {
            check_rate("retention", tribe, *rate)?;
        }
        for name in [&self.retention.fallback, &self.retention.override_to] {
            if lookup(&self.retention.rates, name).is_none() {
                return Err(invalid(format!("retention has no rate for tribe '{name}'")));
            }
        }
        if scope_key(&self.retention.override_from).is_empty() {
            return Err(invalid("retention override_from is empty".into()));
        }

        for (segment, rate) in &self.conversion.rates {
            check_rate("conversion", segment, *rate)?;
        }
        check_rate("conversion", "default", self.conversion.default_rate)?;

        for (segment, ratio) in &self.users_per_unit.segment_defaults {
            check_positive("users_per_unit", segment, *ratio)?;
        }
        check_positive("users_per_unit", "default", self.users_per_unit.default_ratio)?;

        check_positive("throughput", "floor", self.throughput.floor)?;
        check_positive("throughput", "default", self.throughput.default_ratio)?;
        check_positive("numeric", "epsilon", self.numeric.epsilon)?;

        let t = self.pareto.threshold_pct;
        if !(t.is_finite() && t > 0.0 && t <= 100.0) {
            return Err(invalid(format!("pareto threshold {t} is outside (0, 100]")));
        }

        CategoryRegistry::build(&self.categories)?;
        Ok(())
    }

    /// The fixed premises in display order.
    pub fn assumptions(&self) -> Vec<Assumption> {
        let mut out = Vec::new();
        for (segment, rate) in &self.conversion.rates {
            out.push(item("conversion_rate", segment, *rate));
        }
        out.push(item("conversion_rate", "default", self.conversion.default_rate));
        for (tribe, rate) in &self.retention.rates {
            out.push(item("retention_rate", tribe, *rate));
        }
        if let Some(rate) = lookup(&self.retention.rates, &self.retention.override_to) {
            out.push(item("retention_rate", &self.retention.override_from, rate));
        }
        for (segment, ratio) in &self.users_per_unit.segment_defaults {
            out.push(item("users_per_unit", segment, *ratio));
        }
        out.push(item("users_per_unit", "default", self.users_per_unit.default_ratio));
        out.push(item("throughput", "floor", self.throughput.floor));
        out.push(item("pareto", "threshold_pct", self.pareto.threshold_pct));
        out
    }
}

/// Look up `name` in a display-keyed table by folded name.
pub(crate) fn lookup(table: &BTreeMap<String, f64>, name: &str) -> Option<f64> {
    let key = scope_key(name);
    if key.is_empty() {
        return None;
    }
    table
        .iter()
        .find(|(k, _)| scope_key(k) == key)
        .map(|(_, v)| *v)
}

fn item(group: &str, name: &str, value: f64) -> Assumption {
    Assumption { group: group.into(), name: name.into(), value }
}

fn check_rate(table: &str, name: &str, rate: f64) -> CalcResult<()> {
    if rate.is_finite() && rate > 0.0 && rate <= 1.0 {
        Ok(())
    } else {
        Err(invalid(format!("{table} rate for '{name}' is {rate}, outside (0, 1]")))
    }
}

fn check_positive(table: &str, name: &str, value: f64) -> CalcResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{table} value for '{name}' is {value}, must be > 0")))
    }
}

fn invalid(reason: String) -> CalcError {
    CalcError::InvalidConfig { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_is_valid() {
        CalcConfig::standard().validate().unwrap();
    }

    #[test]
    fn lookup_is_accent_and_case_insensitive() {
        let cfg = CalcConfig::standard();
        assert_eq!(lookup(&cfg.conversion.rates, "MOVEL"), Some(0.4947));
        assert_eq!(lookup(&cfg.conversion.rates, ""), None);
    }

    #[test]
    fn rate_above_one_is_rejected() {
        let mut cfg = CalcConfig::standard();
        cfg.retention.rates.insert("App".into(), 1.5);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_fallback_tribe_is_rejected() {
        let mut cfg = CalcConfig::standard();
        cfg.retention.fallback = "Phone".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut cfg = CalcConfig::standard();
        cfg.pareto.threshold_pct = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn assumptions_list_the_dma_rule() {
        let cfg = CalcConfig::standard();
        let dma = cfg
            .assumptions()
            .into_iter()
            .find(|a| a.name == "Dma")
            .unwrap();
        assert_eq!(dma.value, 0.883475537);
    }
}
