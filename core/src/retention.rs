//! Retention and conversion rate resolution.
//!
//! RULE: the Dma override is checked before the direct lookup.
//! A Dma tribe always gets the Bot rate, even if a Dma rate is
//! ever added to the table.

use crate::{
    config::{lookup, ConversionConfig, RetentionConfig},
    error::{CalcError, CalcResult},
    normalize::{same_key, scope_key},
};

/// Tribe → 72h retention rate. Total: every tribe resolves to a rate.
#[derive(Debug, Clone)]
pub struct RetentionTable {
    rates:         Vec<(String, f64)>,
    override_from: String,
    override_rate: f64,
    fallback_rate: f64,
}

impl RetentionTable {
    pub fn new(cfg: &RetentionConfig) -> CalcResult<Self> {
        let override_rate = lookup(&cfg.rates, &cfg.override_to).ok_or_else(|| {
            CalcError::InvalidConfig {
                reason: format!("retention has no rate for override target '{}'", cfg.override_to),
            }
        })?;
        let fallback_rate = lookup(&cfg.rates, &cfg.fallback).ok_or_else(|| {
            CalcError::InvalidConfig {
                reason: format!("retention has no rate for fallback '{}'", cfg.fallback),
            }
        })?;
        Ok(Self {
            rates: cfg.rates.iter().map(|(k, v)| (scope_key(k), *v)).collect(),
            override_from: cfg.override_from.clone(),
            override_rate,
            fallback_rate,
        })
    }

    pub fn resolve(&self, tribe: &str) -> f64 {
        if same_key(tribe, &self.override_from) {
            return self.override_rate;
        }
        let key = scope_key(tribe);
        self.rates
            .iter()
            .find(|(k, _)| !key.is_empty() && *k == key)
            .map(|(_, rate)| *rate)
            .unwrap_or(self.fallback_rate)
    }
}

/// Segment → conversion rate, with the declared default for unknown segments.
#[derive(Debug, Clone)]
pub struct ConversionTable {
    rates:        Vec<(String, f64)>,
    default_rate: f64,
}

impl ConversionTable {
    pub fn new(cfg: &ConversionConfig) -> Self {
        Self {
            rates: cfg.rates.iter().map(|(k, v)| (scope_key(k), *v)).collect(),
            default_rate: cfg.default_rate,
        }
    }

    pub fn resolve(&self, segment: &str) -> f64 {
        let key = scope_key(segment);
        self.rates
            .iter()
            .find(|(k, _)| !key.is_empty() && *k == key)
            .map(|(_, rate)| *rate)
            .unwrap_or(self.default_rate)
    }
}
