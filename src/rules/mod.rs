//! Format rule tables and the registry that maps sheets to them

pub mod config;
mod format;
mod registry;

pub use config::{ColumnPair, FormatConfig, ReductionOp};
pub use format::{
    AggregationBucket, AuditMapping, DerivationRule, Format, Formula, LedgerMapping, Listing,
    ListingSelector, Membership, Reduction, Tier, TieredPrice,
};
pub use registry::FormatRegistry;
