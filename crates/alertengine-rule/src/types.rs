use crate::error::Result;
use alertengine_common::labels::Labels;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// A metrics source. Two sources address the same live evaluator target
/// iff both `id` and `url` match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prom {
    pub id: i64,
    #[serde(default)]
    pub url: String,
}

/// An alert rule as the gateway declares it. `expr`, `op` and `value`
/// are kept separate on the wire and joined only when evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub prom_id: i64,
    pub expr: String,
    pub op: String,
    pub value: String,
    #[serde(rename = "for", default)]
    pub for_: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
}

impl Rule {
    /// The full comparison expression forwarded to the metrics backend.
    pub fn full_expr(&self) -> String {
        format!("{} {} {}", self.expr, self.op, self.value)
            .trim()
            .to_string()
    }

    /// Fixed annotation set carried on every notification for this rule.
    pub fn annotations(&self) -> HashMap<String, String> {
        HashMap::from([
            ("rule_id".to_string(), self.id.to_string()),
            ("prom_id".to_string(), self.prom_id.to_string()),
            ("summary".to_string(), self.summary.clone()),
            ("description".to_string(), self.description.clone()),
        ])
    }
}

pub type Rules = Vec<Rule>;

/// Rules of one source, joined with that source's endpoint.
#[derive(Debug, Clone)]
pub struct PromRules {
    pub prom: Prom,
    pub rules: Rules,
}

/// Gateway envelope for `GET {rule_path}`. `code != 0` is a fetch failure.
#[derive(Debug, Deserialize)]
pub struct RulesResp {
    pub code: i32,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Rules,
}

/// Gateway envelope for `GET {prom_path}`.
#[derive(Debug, Deserialize)]
pub struct PromsResp {
    pub code: i32,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Vec<Prom>,
}

/// One archived snapshot of a source's ruleset. `version` is 1 for the
/// most recent snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RuleVersion {
    pub version: i64,
    pub prom_id: i64,
    pub created_at: DateTime<Utc>,
    pub file_path: PathBuf,
    pub hash: String,
}

// Prometheus-compatible rule file shape. Maps are rendered as BTreeMap so
// successive snapshots of the same ruleset are byte-identical.

#[derive(Serialize)]
struct RuleFile {
    groups: Vec<RuleGroup>,
}

#[derive(Serialize)]
struct RuleGroup {
    name: String,
    rules: Vec<ArchivedRule>,
}

#[derive(Serialize)]
struct ArchivedRule {
    alert: String,
    expr: String,
    #[serde(rename = "for")]
    for_: String,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
}

/// Render a ruleset as a Prometheus-compatible YAML document, all rules
/// under a single `ruleengine` group.
pub fn rules_content(rules: &Rules) -> Result<Vec<u8>> {
    let archived = rules
        .iter()
        .map(|r| ArchivedRule {
            alert: r.id.to_string(),
            expr: r.full_expr(),
            for_: r.for_.clone(),
            labels: r.labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            annotations: r
                .annotations()
                .into_iter()
                .collect(),
        })
        .collect();

    let file = RuleFile {
        groups: vec![RuleGroup {
            name: "ruleengine".to_string(),
            rules: archived,
        }],
    };

    Ok(serde_yaml::to_string(&file)?.into_bytes())
}

/// Group rules by `prom_id`. Endpoints are unknown at this point; the
/// reconciler fills them in from the source list.
pub fn group_by_prom(rules: &Rules) -> Vec<PromRules> {
    let mut grouped: HashMap<i64, Rules> = HashMap::new();
    for rule in rules {
        grouped.entry(rule.prom_id).or_default().push(rule.clone());
    }

    grouped
        .into_iter()
        .map(|(id, rules)| PromRules {
            prom: Prom {
                id,
                url: String::new(),
            },
            rules,
        })
        .collect()
}
