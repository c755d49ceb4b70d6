//! Declarative KPI category registry.
//!
//! A category is a named logical KPI ("transactions", "accesses",
//! "unique users") defined by an ordered list of normalized label
//! patterns plus an optional exclusion list. A record belongs to a
//! category when its normalized label contains any pattern as a
//! contiguous token run and contains none of the exclusions.
//!
//! The registry is built once from config and validated up front;
//! call sites never re-derive matching rules.

use crate::{
    error::{CalcError, CalcResult},
    normalize::{contains_tokens, normalize},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The logical categories the ratio deriver needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKey {
    Transactions,
    Accesses,
    UniqueUsers,
}

impl CategoryKey {
    pub const ALL: [CategoryKey; 3] = [
        CategoryKey::Transactions,
        CategoryKey::Accesses,
        CategoryKey::UniqueUsers,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::Accesses     => "accesses",
            Self::UniqueUsers  => "unique_users",
        }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One category as written in `categories.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDef {
    pub key:      CategoryKey,
    pub patterns: Vec<String>,
    #[serde(default)]
    pub exclude:  Vec<String>,
}

/// A category with its patterns already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSet {
    pub key: CategoryKey,
    patterns: Vec<String>,
    exclude:  Vec<String>,
}

impl MatchSet {
    /// `label_key` must be a normalized label.
    pub fn matches_key(&self, label_key: &str) -> bool {
        self.patterns.iter().any(|p| contains_tokens(label_key, p))
            && !self.exclude.iter().any(|x| contains_tokens(label_key, x))
    }

    /// Convenience for raw labels.
    pub fn matches(&self, label: &str) -> bool {
        self.matches_key(&normalize(label))
    }
}

#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    sets: Vec<MatchSet>,
}

impl CategoryRegistry {
    /// Normalize and validate a set of definitions.
    ///
    /// Fails when a category is defined twice or missing, when a pattern
    /// normalizes to the empty string, or when the same normalized pattern
    /// appears in two categories.
    pub fn build(defs: &[CategoryDef]) -> CalcResult<Self> {
        let mut sets: Vec<MatchSet> = Vec::with_capacity(defs.len());
        let mut owners: HashSet<String> = HashSet::new();

        for def in defs {
            if sets.iter().any(|s| s.key == def.key) {
                return Err(invalid(format!("category '{}' defined twice", def.key)));
            }
            if def.patterns.is_empty() {
                return Err(invalid(format!("category '{}' has no patterns", def.key)));
            }

            let patterns = normalize_all(def.key, &def.patterns)?;
            let exclude = normalize_all(def.key, &def.exclude)?;

            for p in &patterns {
                if !owners.insert(p.clone()) {
                    return Err(invalid(format!(
                        "pattern '{p}' of '{}' is claimed by another category",
                        def.key
                    )));
                }
            }

            sets.push(MatchSet { key: def.key, patterns, exclude });
        }

        for key in CategoryKey::ALL {
            if !sets.iter().any(|s| s.key == key) {
                return Err(invalid(format!("category '{key}' is not defined")));
            }
        }

        sets.sort_by_key(|s| s.key);
        Ok(Self { sets })
    }

    pub fn get(&self, key: CategoryKey) -> &MatchSet {
        // build() guarantees every key is present, sorted by key.
        &self.sets[key as usize]
    }

    /// First category whose match-set accepts `label_key`, in key order.
    pub fn classify_key(&self, label_key: &str) -> Option<CategoryKey> {
        self.sets.iter().find(|s| s.matches_key(label_key)).map(|s| s.key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchSet> {
        self.sets.iter()
    }
}

fn normalize_all(key: CategoryKey, raw: &[String]) -> CalcResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for r in raw {
        let n = normalize(r);
        if n.is_empty() {
            return Err(invalid(format!("pattern '{r}' of '{key}' normalizes to nothing")));
        }
        if !out.contains(&n) {
            out.push(n);
        }
    }
    Ok(out)
}

fn invalid(reason: String) -> CalcError {
    CalcError::InvalidConfig { reason }
}

/// The registry shipped with the calculator, matching the labels of the
/// upstream performance sheet ("6 - Acessos", "7.1 - Transações", ...).
pub fn standard_categories() -> Vec<CategoryDef> {
    vec![
        CategoryDef {
            key:      CategoryKey::Transactions,
            patterns: vec![
                "Transações".into(),
                "Transação".into(),
                "Transactions".into(),
                "Transaction".into(),
            ],
            exclude:  vec![],
        },
        CategoryDef {
            key:      CategoryKey::Accesses,
            patterns: vec![
                "Acessos".into(),
                "Acesso".into(),
                "Accesses".into(),
            ],
            exclude:  vec![
                "Únicos".into(),
                "Unique".into(),
                "Usuários".into(),
                "Transações".into(),
                "Transação".into(),
            ],
        },
        CategoryDef {
            key:      CategoryKey::UniqueUsers,
            patterns: vec![
                "Usuários Únicos".into(),
                "Acessos Únicos".into(),
                "Unique Users".into(),
                "UU CPF".into(),
                "MAU".into(),
            ],
            exclude:  vec![],
        },
    ]
}
