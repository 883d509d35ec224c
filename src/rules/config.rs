//! Serde shape of a format file
//!
//! A format file is YAML. It is deserialized into these structs as written,
//! then validated and compiled into [`super::Format`].

use serde::Deserialize;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatConfig {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub notes: Vec<String>,
    pub sheets: Vec<String>,
    #[serde(default = "default_identifier_columns")]
    pub identifier_columns: Vec<String>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub buckets: Vec<BucketConfig>,
    #[serde(default)]
    pub ledger: Vec<ColumnPair>,
    #[serde(default)]
    pub dump: DumpConfig,
    #[serde(default)]
    pub pivot: Vec<String>,
    #[serde(default)]
    pub listings: Vec<ListingConfig>,
}

fn default_identifier_columns() -> Vec<String> {
    vec!["review id".to_string(), "cost centre".to_string()]
}

/// A column mapping entry: either one name used on both sides, or
/// `{ to, from }` when the names differ.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColumnPair {
    Same(String),
    Renamed { to: String, from: String },
}

impl ColumnPair {
    /// `(to, from)`
    pub fn sides(&self) -> (&str, &str) {
        match self {
            ColumnPair::Same(name) => (name, name),
            ColumnPair::Renamed { to, from } => (to, from),
        }
    }
}

// ---------------------------------------------------------------------------
// Derivation rules
// ---------------------------------------------------------------------------

/// One derived column check. Exactly one of `formula` or `tiered` is set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub target: String,
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub tiered: Option<TieredConfig>,
    /// Optional condition; the rule is skipped for rows where it is false
    #[serde(default)]
    pub when: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TieredConfig {
    pub driver: String,
    pub category: String,
    pub tiers: BTreeMap<String, Vec<TierConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    /// Inclusive upper bound; omitted on the open-ended last tier
    #[serde(default)]
    pub upto: Option<f64>,
    pub price: f64,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
    pub name: String,
    #[serde(default)]
    pub filter: Vec<MembershipConfig>,
    pub reductions: Vec<ReductionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MembershipConfig {
    pub column: String,
    pub any_of: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReductionConfig {
    pub metric: String,
    pub column: String,
    #[serde(default)]
    pub op: ReductionOp,
    /// Only rows where one of these columns is > 0 take part
    #[serde(default)]
    pub positive_any: Vec<String>,
    /// Display label; the metric name is used when absent
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionOp {
    #[default]
    Sum,
    CountDistinct,
}

impl std::fmt::Display for ReductionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::CountDistinct => write!(f, "count_distinct"),
        }
    }
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DumpConfig {
    /// Log column ← source column, in log order
    #[serde(default)]
    pub columns: Vec<ColumnPair>,
    #[serde(default = "default_management_fee_column")]
    pub management_fee_column: String,
}

fn default_management_fee_column() -> String {
    "selling management".to_string()
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            management_fee_column: default_management_fee_column(),
        }
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// A named row listing. Rows are selected either by `any_present` (any of
/// the columns holds a non-blank, non-zero value) or by a `when` condition.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListingConfig {
    pub name: String,
    #[serde(default)]
    pub any_present: Vec<String>,
    #[serde(default)]
    pub when: Option<String>,
    pub columns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_format_uses_defaults() {
        let cfg: FormatConfig = serde_yaml::from_str("name: x\nsheets: [Sheet1]\n").unwrap();
        assert_eq!(cfg.identifier_columns, vec!["review id", "cost centre"]);
        assert_eq!(cfg.dump.management_fee_column, "selling management");
        assert!(cfg.rules.is_empty());
    }

    #[test]
    fn test_column_pair_forms() {
        let pairs: Vec<ColumnPair> =
            serde_yaml::from_str("- days\n- { to: regular buying, from: regular buying amount }\n")
                .unwrap();
        assert_eq!(pairs[0].sides(), ("days", "days"));
        assert_eq!(pairs[1].sides(), ("regular buying", "regular buying amount"));
    }

    #[test]
    fn test_reduction_op_snake_case() {
        let r: ReductionConfig =
            serde_yaml::from_str("{ metric: days, column: date, op: count_distinct }").unwrap();
        assert_eq!(r.op, ReductionOp::CountDistinct);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let res: Result<RuleConfig, _> = serde_yaml::from_str("{ target: a, formual: '1' }");
        assert!(res.is_err());
    }
}
