//! Rule data model and the on-disk rule archive.
//!
//! Rules arrive from the control-plane gateway as JSON, are grouped per
//! metrics source, and every accepted ruleset is snapshotted to disk in
//! Prometheus-compatible YAML via [`archive::RuleArchive`].

pub mod archive;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use archive::RuleArchive;
pub use error::{Result, RuleError};
pub use types::{Prom, PromRules, PromsResp, Rule, RuleVersion, Rules, RulesResp};
