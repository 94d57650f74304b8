//! MongoDB-subset query evaluation.
//!
//! Criteria compile once into an AST; matching is a pure function over
//! the AST and a document. Supported field operators: `$eq`, `$ne`,
//! `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`, `$regex`,
//! `$size`, `$all`. Logical operators `$and`, `$or`, `$not` nest at any
//! level. Unknown `$`-operators fail compilation.

mod exec;

pub use exec::Query;

use crate::document::{self, Document};
use crate::error::QueryError;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

/// A compiled criteria node.
#[derive(Debug, Clone)]
pub enum Node {
    /// Every child must match. An empty conjunction matches everything.
    And(Vec<Node>),
    /// At least one child must match.
    Or(Vec<Node>),
    /// The child must not match.
    Not(Box<Node>),
    /// A single field condition.
    Leaf {
        /// Dot path into the document.
        path: String,
        /// Operator applied to the resolved value.
        op: Op,
    },
    /// A malformed logical operand; matches no document.
    Nothing,
}

/// A field operator with its operand.
#[derive(Debug, Clone)]
pub enum Op {
    /// Structural equality.
    Eq(Value),
    /// Structural inequality; absent fields match.
    Ne(Value),
    /// Strictly greater, native ordering on numbers and dates.
    Gt(Value),
    /// Greater or equal.
    Gte(Value),
    /// Strictly less.
    Lt(Value),
    /// Less or equal.
    Lte(Value),
    /// Membership; array values match any-element.
    In(Vec<Value>),
    /// Non-membership; absent fields match.
    Nin(Vec<Value>),
    /// Field presence.
    Exists(bool),
    /// Pattern match on string values.
    Regex(Regex),
    /// Array length equality.
    Size(usize),
    /// Array contains every listed value.
    All(Vec<Value>),
}

/// Compiles a criteria value into an AST.
///
/// The top level must be an object; an empty object matches everything.
pub fn compile(criteria: &Value) -> Result<Node, QueryError> {
    let map = criteria
        .as_object()
        .ok_or_else(|| QueryError::InvalidCriteria {
            message: format!("criteria must be an object, got {}", document::type_name(criteria)),
        })?;

    let mut children = Vec::with_capacity(map.len());
    for (key, value) in map {
        children.push(compile_entry(key, value)?);
    }
    Ok(Node::And(children))
}

fn compile_entry(key: &str, value: &Value) -> Result<Node, QueryError> {
    match key {
        "$and" => Ok(compile_logical_list(value, Node::And)?),
        "$or" => Ok(compile_logical_list(value, Node::Or)?),
        "$not" => Ok(Node::Not(Box::new(compile(value)?))),
        _ if key.starts_with('$') => Err(QueryError::InvalidOperator {
            operator: key.to_string(),
        }),
        _ => compile_field(key, value),
    }
}

/// A `$and`/`$or` operand must be an array of criteria; anything else
/// compiles to a node that matches no document.
fn compile_logical_list(
    value: &Value,
    build: fn(Vec<Node>) -> Node,
) -> Result<Node, QueryError> {
    match value.as_array() {
        Some(items) => {
            let nodes = items.iter().map(compile).collect::<Result<Vec<_>, _>>()?;
            Ok(build(nodes))
        }
        None => Ok(Node::Nothing),
    }
}

fn compile_field(path: &str, value: &Value) -> Result<Node, QueryError> {
    let is_operator_object = value
        .as_object()
        .is_some_and(|map| map.keys().any(|k| k.starts_with('$')));

    if !is_operator_object {
        return Ok(Node::Leaf {
            path: path.to_string(),
            op: Op::Eq(value.clone()),
        });
    }

    let map = value.as_object().expect("checked above");
    let mut ops = Vec::new();
    for (op_key, operand) in map {
        match op_key.as_str() {
            "$eq" => ops.push(Op::Eq(operand.clone())),
            "$ne" => ops.push(Op::Ne(operand.clone())),
            "$gt" => ops.push(Op::Gt(operand.clone())),
            "$gte" => ops.push(Op::Gte(operand.clone())),
            "$lt" => ops.push(Op::Lt(operand.clone())),
            "$lte" => ops.push(Op::Lte(operand.clone())),
            "$in" => ops.push(Op::In(operand_array(op_key, operand)?)),
            "$nin" => ops.push(Op::Nin(operand_array(op_key, operand)?)),
            "$exists" => {
                let flag = operand.as_bool().ok_or_else(|| QueryError::InvalidCriteria {
                    message: format!("$exists requires a boolean, got {operand}"),
                })?;
                ops.push(Op::Exists(flag));
            }
            "$regex" => ops.push(Op::Regex(compile_regex(operand, map.get("$options"))?)),
            // Consumed together with $regex.
            "$options" => {}
            "$size" => {
                let size = operand.as_u64().ok_or_else(|| QueryError::InvalidCriteria {
                    message: format!("$size requires a non-negative integer, got {operand}"),
                })?;
                ops.push(Op::Size(size as usize));
            }
            "$all" => ops.push(Op::All(operand_array(op_key, operand)?)),
            other if other.starts_with('$') => {
                return Err(QueryError::InvalidOperator {
                    operator: other.to_string(),
                })
            }
            other => {
                return Err(QueryError::InvalidCriteria {
                    message: format!("cannot mix operator and plain key {other}"),
                })
            }
        }
    }

    let mut nodes: Vec<Node> = ops
        .into_iter()
        .map(|op| Node::Leaf {
            path: path.to_string(),
            op,
        })
        .collect();
    if nodes.len() == 1 {
        Ok(nodes.remove(0))
    } else {
        Ok(Node::And(nodes))
    }
}

fn operand_array(op: &str, operand: &Value) -> Result<Vec<Value>, QueryError> {
    operand
        .as_array()
        .cloned()
        .ok_or_else(|| QueryError::InvalidCriteria {
            message: format!("{op} requires an array, got {}", document::type_name(operand)),
        })
}

fn compile_regex(operand: &Value, options: Option<&Value>) -> Result<Regex, QueryError> {
    let pattern = operand.as_str().ok_or_else(|| QueryError::InvalidCriteria {
        message: format!("$regex requires a string pattern, got {operand}"),
    })?;
    let case_insensitive = options
        .and_then(Value::as_str)
        .is_some_and(|opts| opts.contains('i'));
    let source = if case_insensitive {
        format!("(?i){pattern}")
    } else {
        pattern.to_string()
    };
    Regex::new(&source).map_err(|e| QueryError::InvalidCriteria {
        message: format!("invalid $regex pattern: {e}"),
    })
}

impl Node {
    /// Evaluates this node against a document.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::And(children) => children.iter().all(|c| c.matches(doc)),
            Self::Or(children) => children.iter().any(|c| c.matches(doc)),
            Self::Not(child) => !child.matches(doc),
            Self::Leaf { path, op } => op.matches(document::get_path(doc, path)),
            Self::Nothing => false,
        }
    }
}

impl Op {
    /// Evaluates this operator against a resolved field value.
    #[must_use]
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Eq(target) => value.is_some_and(|v| document::deep_equal(v, target)),
            Self::Ne(target) => !value.is_some_and(|v| document::deep_equal(v, target)),
            Self::Gt(target) => ordered(value, target, &[Ordering::Greater]),
            Self::Gte(target) => ordered(value, target, &[Ordering::Greater, Ordering::Equal]),
            Self::Lt(target) => ordered(value, target, &[Ordering::Less]),
            Self::Lte(target) => ordered(value, target, &[Ordering::Less, Ordering::Equal]),
            Self::In(list) => member_of(value, list),
            Self::Nin(list) => !member_of(value, list),
            Self::Exists(flag) => value.is_some() == *flag,
            Self::Regex(re) => value.and_then(Value::as_str).is_some_and(|s| re.is_match(s)),
            Self::Size(n) => value
                .and_then(Value::as_array)
                .is_some_and(|items| items.len() == *n),
            Self::All(list) => value.and_then(Value::as_array).is_some_and(|items| {
                list.iter()
                    .all(|t| items.iter().any(|item| document::deep_equal(item, t)))
            }),
        }
    }
}

fn ordered(value: Option<&Value>, target: &Value, accept: &[Ordering]) -> bool {
    value
        .and_then(|v| document::compare_order(v, target))
        .is_some_and(|ord| accept.contains(&ord))
}

/// `$in` membership: array values match any-element, scalars directly.
fn member_of(value: Option<&Value>, list: &[Value]) -> bool {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| list.iter().any(|t| document::deep_equal(item, t))),
        Some(v) => list.iter().any(|t| document::deep_equal(v, t)),
        None => false,
    }
}
