//! Compiled format rule tables
//!
//! [`Format::compile`] turns a [`FormatConfig`] into the runtime form used by
//! the engine: formulas are parsed and checked once, column names are
//! normalized, and structural mistakes (both `formula` and `tiered` on one
//! rule, unbounded middle tiers, empty buckets) are rejected up front.

use super::config::{
    BucketConfig, ColumnPair, FormatConfig, ListingConfig, ReductionOp, RuleConfig, TieredConfig,
};
use crate::error::{ReviewError, ReviewResult};
use crate::excel::{sheet_name, REPORT_SHEETS};
use crate::formula::{self, Expr};
use crate::types::{normalize_column_name, Row};
use std::collections::{BTreeMap, HashSet};

/// A client billing format: everything the engine needs to review one sheet
#[derive(Debug, Clone)]
pub struct Format {
    pub name: String,
    pub title: String,
    pub notes: Vec<String>,
    /// Literal sheet names this format applies to
    pub sheets: Vec<String>,
    pub identifier_columns: Vec<String>,
    pub rules: Vec<DerivationRule>,
    pub buckets: Vec<AggregationBucket>,
    pub ledger: LedgerMapping,
    pub dump: AuditMapping,
    pub pivot: Vec<String>,
    pub listings: Vec<Listing>,
}

#[derive(Debug, Clone)]
pub struct DerivationRule {
    /// Column holding the recorded value
    pub target: String,
    pub formula: Formula,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum Formula {
    Expression(Expr),
    Tiered(TieredPrice),
}

/// Unit price looked up from a category and a driver quantity
#[derive(Debug, Clone, PartialEq)]
pub struct TieredPrice {
    pub driver: String,
    pub category: String,
    /// Category (normalized) → tiers in ascending bound order
    pub tiers: BTreeMap<String, Vec<Tier>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    pub upto: Option<f64>,
    pub price: f64,
}

impl TieredPrice {
    /// Price for this row, or `None` when the category is missing or unknown.
    ///
    /// The first tier whose bound the driver does not exceed wins.
    pub fn price(&self, row: &Row) -> Option<f64> {
        let category = row.category(&self.category)?;
        let tiers = self.tiers.get(&category)?;
        let driver = row.number(&self.driver);
        tiers
            .iter()
            .find(|tier| tier.upto.map_or(true, |bound| driver <= bound))
            .map(|tier| tier.price)
    }
}

/// Named group of reductions over the rows passing `filter`
#[derive(Debug, Clone)]
pub struct AggregationBucket {
    pub name: String,
    pub filter: Vec<Membership>,
    pub reductions: Vec<Reduction>,
}

/// `column ∈ any_of`, compared on normalized text
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    pub column: String,
    pub any_of: Vec<String>,
}

impl Membership {
    pub fn matches(&self, row: &Row) -> bool {
        row.category(&self.column)
            .is_some_and(|value| self.any_of.contains(&value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub metric: String,
    pub label: String,
    pub column: String,
    pub op: ReductionOp,
    pub positive_any: Vec<String>,
}

impl Reduction {
    /// Whether the row takes part in this reduction
    pub fn admits(&self, row: &Row) -> bool {
        self.positive_any.is_empty() || self.positive_any.iter().any(|c| row.number(c) > 0.0)
    }
}

impl AggregationBucket {
    pub fn admits(&self, row: &Row) -> bool {
        self.filter.iter().all(|m| m.matches(row))
    }
}

/// Metric → ledger column pairs, in ledger display order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerMapping {
    pub entries: Vec<(String, String)>,
}

impl LedgerMapping {
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, column)| column.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Log column ← source column pairs plus the management fee source column
#[derive(Debug, Clone, PartialEq)]
pub struct AuditMapping {
    pub columns: Vec<(String, String)>,
    pub management_fee_column: String,
}

#[derive(Debug, Clone)]
pub enum ListingSelector {
    AnyPresent(Vec<String>),
    Condition(Expr),
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub name: String,
    pub selector: ListingSelector,
    pub columns: Vec<String>,
}

impl Format {
    /// Validate and compile a deserialized format file
    pub fn compile(config: FormatConfig) -> ReviewResult<Self> {
        let name = config.name.trim().to_string();
        if name.is_empty() {
            return Err(ReviewError::Config("format name is empty".to_string()));
        }
        if config.sheets.is_empty() {
            return Err(ReviewError::Config(format!(
                "format '{}' lists no sheets",
                name
            )));
        }
        if config.identifier_columns.is_empty() {
            return Err(ReviewError::Config(format!(
                "format '{}' has no identifier columns",
                name
            )));
        }

        let rules = config
            .rules
            .iter()
            .map(|rule| compile_rule(&name, rule))
            .collect::<ReviewResult<Vec<_>>>()?;

        let buckets = config
            .buckets
            .iter()
            .map(|bucket| compile_bucket(&name, bucket))
            .collect::<ReviewResult<Vec<_>>>()?;

        let mut metrics: HashSet<&str> = HashSet::new();
        for reduction in buckets.iter().flat_map(|b| b.reductions.iter()) {
            if !metrics.insert(reduction.metric.as_str()) {
                return Err(ReviewError::Config(format!(
                    "metric '{}' is defined twice in format '{}'",
                    reduction.metric, name
                )));
            }
        }

        let ledger = compile_ledger(&name, &config.ledger, &metrics)?;

        let dump = AuditMapping {
            columns: normalize_pairs(&config.dump.columns),
            management_fee_column: normalize_column_name(&config.dump.management_fee_column),
        };

        let listings = config
            .listings
            .iter()
            .map(|listing| compile_listing(&name, listing))
            .collect::<ReviewResult<Vec<_>>>()?;
        check_listing_names(&name, &listings)?;

        Ok(Format {
            title: if config.title.trim().is_empty() {
                name.clone()
            } else {
                config.title
            },
            name,
            notes: config.notes,
            sheets: config.sheets,
            identifier_columns: normalize_all(&config.identifier_columns),
            rules,
            buckets,
            ledger,
            dump,
            pivot: normalize_all(&config.pivot),
            listings,
        })
    }

    /// Metric names in declaration order, with their display labels
    pub fn metrics(&self) -> Vec<(&str, &str)> {
        self.buckets
            .iter()
            .flat_map(|b| b.reductions.iter())
            .map(|r| (r.metric.as_str(), r.label.as_str()))
            .collect()
    }
}

fn normalize_all(columns: &[String]) -> Vec<String> {
    columns.iter().map(|c| normalize_column_name(c)).collect()
}

fn normalize_pairs(pairs: &[ColumnPair]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|pair| {
            let (to, from) = pair.sides();
            (normalize_column_name(to), normalize_column_name(from))
        })
        .collect()
}

fn compile_expr(location: &str, source: &str) -> ReviewResult<Expr> {
    formula::compile(source).map_err(|message| ReviewError::formula(location, message))
}

fn compile_rule(format: &str, rule: &RuleConfig) -> ReviewResult<DerivationRule> {
    let target = normalize_column_name(&rule.target);
    let location = format!("{}.{}", format, target);

    let formula = match (&rule.formula, &rule.tiered) {
        (Some(source), None) => Formula::Expression(compile_expr(&location, source)?),
        (None, Some(tiered)) => Formula::Tiered(compile_tiered(&location, tiered)?),
        (Some(_), Some(_)) => {
            return Err(ReviewError::formula(
                location,
                "a rule takes either 'formula' or 'tiered', not both",
            ))
        }
        (None, None) => {
            return Err(ReviewError::formula(
                location,
                "a rule needs 'formula' or 'tiered'",
            ))
        }
    };

    let condition = rule
        .when
        .as_deref()
        .map(|source| compile_expr(&format!("{} (when)", location), source))
        .transpose()?;

    Ok(DerivationRule {
        target,
        formula,
        condition,
    })
}

fn compile_tiered(location: &str, config: &TieredConfig) -> ReviewResult<TieredPrice> {
    let mut tiers = BTreeMap::new();
    for (category, list) in &config.tiers {
        if list.is_empty() {
            return Err(ReviewError::formula(
                location,
                format!("category '{}' has no tiers", category),
            ));
        }
        let mut previous: Option<f64> = None;
        for (i, tier) in list.iter().enumerate() {
            match tier.upto {
                None if i + 1 != list.len() => {
                    return Err(ReviewError::formula(
                        location,
                        format!("only the last tier of '{}' may omit 'upto'", category),
                    ))
                }
                Some(bound) if previous.is_some_and(|p| bound <= p) => {
                    return Err(ReviewError::formula(
                        location,
                        format!("tier bounds of '{}' must increase", category),
                    ))
                }
                _ => previous = tier.upto,
            }
        }
        tiers.insert(
            category.trim().to_lowercase(),
            list.iter()
                .map(|t| Tier {
                    upto: t.upto,
                    price: t.price,
                })
                .collect(),
        );
    }

    Ok(TieredPrice {
        driver: normalize_column_name(&config.driver),
        category: normalize_column_name(&config.category),
        tiers,
    })
}

fn compile_bucket(format: &str, config: &BucketConfig) -> ReviewResult<AggregationBucket> {
    if config.reductions.is_empty() {
        return Err(ReviewError::Config(format!(
            "bucket '{}' of format '{}' has no reductions",
            config.name, format
        )));
    }
    Ok(AggregationBucket {
        name: config.name.clone(),
        filter: config
            .filter
            .iter()
            .map(|m| Membership {
                column: normalize_column_name(&m.column),
                any_of: m.any_of.iter().map(|v| v.trim().to_lowercase()).collect(),
            })
            .collect(),
        reductions: config
            .reductions
            .iter()
            .map(|r| Reduction {
                metric: normalize_column_name(&r.metric),
                label: r.label.clone().unwrap_or_else(|| r.metric.clone()),
                column: normalize_column_name(&r.column),
                op: r.op,
                positive_any: normalize_all(&r.positive_any),
            })
            .collect(),
    })
}

fn compile_ledger(
    format: &str,
    pairs: &[ColumnPair],
    metrics: &HashSet<&str>,
) -> ReviewResult<LedgerMapping> {
    let entries: Vec<(String, String)> = normalize_pairs(pairs)
        .into_iter()
        .map(|(column, metric)| (metric, column))
        .collect();
    for (metric, _) in &entries {
        if !metrics.contains(metric.as_str()) {
            return Err(ReviewError::Config(format!(
                "ledger mapping of format '{}' names unknown metric '{}'",
                format, metric
            )));
        }
    }
    Ok(LedgerMapping { entries })
}

fn compile_listing(format: &str, config: &ListingConfig) -> ReviewResult<Listing> {
    let location = format!("{} listing '{}'", format, config.name);
    let selector = match (&config.when, config.any_present.is_empty()) {
        (Some(source), true) => ListingSelector::Condition(compile_expr(&location, source)?),
        (None, false) => ListingSelector::AnyPresent(normalize_all(&config.any_present)),
        _ => {
            return Err(ReviewError::Config(format!(
                "{} needs exactly one of 'any_present' or 'when'",
                location
            )))
        }
    };
    Ok(Listing {
        name: config.name.clone(),
        selector,
        columns: normalize_all(&config.columns),
    })
}

/// Listings become report sheets, so their names must stay distinct from
/// each other and from the fixed report sheets once Excel sees them.
fn check_listing_names(format: &str, listings: &[Listing]) -> ReviewResult<()> {
    let mut taken: HashSet<String> = REPORT_SHEETS
        .iter()
        .map(|name| sheet_name(name).to_lowercase())
        .collect();
    for listing in listings {
        let sheet = sheet_name(&listing.name);
        if !taken.insert(sheet.to_lowercase()) {
            return Err(ReviewError::Config(format!(
                "listing '{}' of format '{}' would share the report sheet name '{}'",
                listing.name, format, sheet
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    fn compile_yaml(yaml: &str) -> ReviewResult<Format> {
        Format::compile(serde_yaml::from_str(yaml)?)
    }

    const TIERED: &str = r#"
name: tiered
sheets: [Airtel Center]
rules:
  - target: Buying Price AI
    tiered:
      driver: buying mg/pax
      category: meal type (only lunch)
      tiers:
        veg: [{ upto: 500, price: 49 }, { upto: 900, price: 48 }, { price: 47 }]
        Non-Veg: [{ upto: 500, price: 55 }, { upto: 900, price: 52.5 }, { price: 50 }]
"#;

    fn tiered_price(format: &Format) -> &TieredPrice {
        match &format.rules[0].formula {
            Formula::Tiered(t) => t,
            other => panic!("expected tiered, got {:?}", other),
        }
    }

    #[test]
    fn test_tier_boundary_is_inclusive() {
        let format = compile_yaml(TIERED).unwrap();
        let price = tiered_price(&format);
        let row = |mg: f64, meal: &str| {
            Row::from_pairs(
                0,
                [
                    ("buying mg/pax", CellValue::Number(mg)),
                    ("meal type (only lunch)", CellValue::Text(meal.into())),
                ],
            )
        };
        assert_eq!(price.price(&row(500.0, "veg")), Some(49.0));
        assert_eq!(price.price(&row(501.0, "veg")), Some(48.0));
        assert_eq!(price.price(&row(901.0, "veg")), Some(47.0));
        assert_eq!(price.price(&row(900.0, "non-veg")), Some(52.5));
        assert_eq!(price.price(&row(100.0, "vegan")), None);
    }

    #[test]
    fn test_tiered_missing_category_is_absent() {
        let format = compile_yaml(TIERED).unwrap();
        let row = Row::from_pairs(0, [("buying mg/pax", 100.0)]);
        assert_eq!(tiered_price(&format).price(&row), None);
    }

    #[test]
    fn test_target_normalized() {
        let format = compile_yaml(TIERED).unwrap();
        assert_eq!(format.rules[0].target, "buying price ai");
        assert_eq!(format.title, "tiered");
    }

    #[test]
    fn test_unbounded_middle_tier_rejected() {
        let yaml = r#"
name: bad
sheets: [S]
rules:
  - target: p
    tiered: { driver: d, category: c, tiers: { veg: [{ price: 1 }, { upto: 5, price: 2 }] } }
"#;
        assert!(matches!(
            compile_yaml(yaml),
            Err(ReviewError::Formula { .. })
        ));
    }

    #[test]
    fn test_rule_needs_exactly_one_formula() {
        let yaml = "name: bad\nsheets: [S]\nrules:\n  - target: a\n";
        assert!(compile_yaml(yaml).is_err());
    }

    #[test]
    fn test_bad_formula_reports_location() {
        let yaml = "name: f\nsheets: [S]\nrules:\n  - { target: Commission, formula: 'FOO([a])' }\n";
        match compile_yaml(yaml) {
            Err(ReviewError::Formula { location, message }) => {
                assert_eq!(location, "f.commission");
                assert!(message.contains("FOO"));
            }
            other => panic!("expected formula error, got {:?}", other),
        }
    }

    #[test]
    fn test_ledger_mapping_must_name_known_metrics() {
        let yaml = r#"
name: f
sheets: [S]
buckets:
  - name: all
    reductions: [{ metric: sams, column: amount }]
ledger: [sams, { to: days, from: days }]
"#;
        assert!(matches!(compile_yaml(yaml), Err(ReviewError::Config(_))));
    }

    fn listing_yaml(names: &[&str]) -> String {
        let mut yaml = "name: f\nsheets: [S]\nlistings:\n".to_string();
        for name in names {
            yaml.push_str(&format!(
                "  - {{ name: '{}', any_present: [amount], columns: [amount] }}\n",
                name
            ));
        }
        yaml
    }

    #[test]
    fn test_listing_names_become_distinct_sheets() {
        let format = compile_yaml(&listing_yaml(&["Karbon Expenses", "Staff Meals"])).unwrap();
        assert_eq!(format.listings.len(), 2);

        for clash in [
            vec!["summary"],
            vec!["PIVOT"],
            vec!["Expenses", "expenses"],
            vec!["a/b", "a:b"],
        ] {
            assert!(
                matches!(compile_yaml(&listing_yaml(&clash)), Err(ReviewError::Config(_))),
                "{:?} should clash",
                clash
            );
        }
    }

    #[test]
    fn test_listing_names_clash_after_truncation() {
        let long = "Expenses paid by the site in cash";
        let other = "Expenses paid by the site in card";
        assert!(matches!(
            compile_yaml(&listing_yaml(&[long, other])),
            Err(ReviewError::Config(_))
        ));
    }

    #[test]
    fn test_membership_is_case_blind() {
        let m = Membership {
            column: "order type".into(),
            any_of: vec!["regular".into()],
        };
        assert!(m.matches(&Row::from_pairs(0, [("Order Type", " Regular ")])));
        assert!(!m.matches(&Row::from_pairs(0, [("order type", "event")])));
        assert!(!m.matches(&Row::new(0)));
    }

    #[test]
    fn test_listing_selector_exclusive() {
        let yaml = "name: f\nsheets: [S]\nlistings:\n  - { name: l, columns: [a] }\n";
        assert!(compile_yaml(yaml).is_err());
    }
}
