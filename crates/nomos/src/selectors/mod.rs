//! Kubernetes-style label selectors.

pub mod cluster;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use cluster::ClusterSelectors;

/// Labels attached to a candidate object.
pub type Labels = BTreeMap<String, String>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    #[error("unknown operator `{operator}` for key `{key}`")]
    UnknownOperator { key: String, operator: String },

    #[error("operator `{operator}` for key `{key}` requires at least one value")]
    MissingValues { key: String, operator: String },

    #[error("operator `{operator}` for key `{key}` does not accept values")]
    UnexpectedValues { key: String, operator: String },

    #[error("requirement key must not be empty")]
    EmptyKey,
}

/// Set-based requirement operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In" => Ok(Operator::In),
            "NotIn" => Ok(Operator::NotIn),
            "Exists" => Ok(Operator::Exists),
            "DoesNotExist" => Ok(Operator::DoesNotExist),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::In => "In",
            Operator::NotIn => "NotIn",
            Operator::Exists => "Exists",
            Operator::DoesNotExist => "DoesNotExist",
        };
        write!(f, "{}", name)
    }
}

/// Declared form of a label selector, as found under `spec.selector`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// The `spec` of ClusterSelector and NamespaceSelector objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSpec {
    #[serde(default)]
    pub selector: LabelSelector,
}

impl LabelSelector {
    /// Whether the selector has no terms. An empty selector matches every
    /// label set, including the empty one.
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    pub fn compile(&self) -> Result<CompiledSelector, SelectorError> {
        let mut requirements = Vec::with_capacity(self.match_expressions.len());
        for expr in &self.match_expressions {
            if expr.key.is_empty() {
                return Err(SelectorError::EmptyKey);
            }
            let op: Operator =
                expr.operator
                    .parse()
                    .map_err(|_| SelectorError::UnknownOperator {
                        key: expr.key.clone(),
                        operator: expr.operator.clone(),
                    })?;
            match op {
                Operator::In | Operator::NotIn if expr.values.is_empty() => {
                    return Err(SelectorError::MissingValues {
                        key: expr.key.clone(),
                        operator: expr.operator.clone(),
                    });
                }
                Operator::Exists | Operator::DoesNotExist if !expr.values.is_empty() => {
                    return Err(SelectorError::UnexpectedValues {
                        key: expr.key.clone(),
                        operator: expr.operator.clone(),
                    });
                }
                _ => {}
            }
            requirements.push(Requirement {
                key: expr.key.clone(),
                op,
                values: expr.values.iter().cloned().collect(),
            });
        }
        if self.match_labels.keys().any(String::is_empty) {
            return Err(SelectorError::EmptyKey);
        }

        Ok(CompiledSelector {
            equals: self.match_labels.clone(),
            requirements,
        })
    }

    pub fn matches(&self, labels: &Labels) -> Result<bool, SelectorError> {
        Ok(self.compile()?.matches(labels))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Requirement {
    key: String,
    op: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    fn matches(&self, labels: &Labels) -> bool {
        let value = labels.get(&self.key);
        match self.op {
            Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotIn => value.map_or(true, |v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

/// A validated selector, ready to be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSelector {
    equals: BTreeMap<String, String>,
    requirements: Vec<Requirement>,
}

impl CompiledSelector {
    pub fn matches(&self, labels: &Labels) -> bool {
        self.equals
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
            && self.requirements.iter().all(|r| r.matches(labels))
    }
}
